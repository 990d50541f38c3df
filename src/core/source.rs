use crate::domain::model::{IdRange, Record};
use crate::utils::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

/// What the source does with a line that is not a valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Yield a `MalformedRecordError` and stop.
    #[default]
    Fail,
    /// Log the line number and keep reading.
    Skip,
}

/// Lazy, in-order reader of JSONL records restricted to an id range.
///
/// Ids are expected to be non-decreasing, so reading stops at the first id
/// at or beyond the end of the range.
pub struct JsonlSource<R> {
    lines: Lines<BufReader<R>>,
    range: IdRange,
    policy: MalformedPolicy,
    line_no: usize,
    done: bool,
}

impl JsonlSource<File> {
    pub fn open<P: AsRef<Path>>(path: P, range: IdRange, policy: MalformedPolicy) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(file, range, policy))
    }
}

impl<R: Read> JsonlSource<R> {
    pub fn from_reader(reader: R, range: IdRange, policy: MalformedPolicy) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            range,
            policy,
            line_no: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for JsonlSource<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let record: Record = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => match self.policy {
                    MalformedPolicy::Fail => {
                        self.done = true;
                        return Some(Err(PrepError::MalformedRecordError {
                            line: self.line_no,
                            message: e.to_string(),
                        }));
                    }
                    MalformedPolicy::Skip => {
                        tracing::warn!(line = self.line_no, error = %e, "Skipping malformed input line");
                        continue;
                    }
                },
            };

            if self.range.is_past_end(record.id) {
                self.done = true;
                return None;
            }
            if record.id < self.range.inf {
                continue;
            }

            return Some(Ok(record));
        }

        None
    }
}
