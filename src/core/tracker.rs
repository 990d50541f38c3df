use crate::domain::model::Record;
use crate::utils::error::{PrepError, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// What an earlier run left in the output file.
///
/// `done` ids are skipped on resume. `partial` records were written with
/// some derived fields missing; they are resubmitted with the stored line
/// as the base. When an id appears on several lines the last line wins.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    done: HashSet<i64>,
    partial: HashMap<i64, Record>,
}

impl ProcessedSet {
    pub fn contains(&self, id: i64) -> bool {
        self.done.contains(&id)
    }

    /// Stored output of an id that still needs work.
    pub fn partial(&self, id: i64) -> Option<&Record> {
        self.partial.get(&id)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty() && self.partial.is_empty()
    }

    fn observe(&mut self, record: Record, complete: bool) {
        if complete {
            self.partial.remove(&record.id);
            self.done.insert(record.id);
        } else {
            self.done.remove(&record.id);
            self.partial.insert(record.id, record);
        }
    }
}

impl FromIterator<i64> for ProcessedSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self {
            done: iter.into_iter().collect(),
            partial: HashMap::new(),
        }
    }
}

/// Every parseable line counts as done.
pub fn load_processed<P: AsRef<Path>>(path: P) -> Result<ProcessedSet> {
    load_processed_with(path, |_| true)
}

/// Scans the output file once, classifying each line with `is_complete`.
///
/// A missing file yields an empty set and blank lines are skipped. A torn
/// final line left by a crash during flush is cut off; a complete final
/// line missing only its newline gets one. Any other unparseable line is an
/// error.
pub fn load_processed_with<P, F>(path: P, is_complete: F) -> Result<ProcessedSet>
where
    P: AsRef<Path>,
    F: Fn(&Record) -> bool,
{
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProcessedSet::default()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut set = ProcessedSet::default();
    let mut buf = Vec::new();
    let mut offset = 0u64;
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let terminated = buf.last() == Some(&b'\n');
        let line = if terminated { &buf[..buf.len() - 1] } else { &buf[..] };

        if terminated && line.trim_ascii().is_empty() {
            offset += read as u64;
            continue;
        }

        match serde_json::from_slice::<Record>(line) {
            Ok(record) => {
                let complete = is_complete(&record);
                set.observe(record, complete);
                if !terminated {
                    tracing::warn!(path = %path.display(), "Output file missing final newline, appending one");
                    let mut file = OpenOptions::new().append(true).open(path)?;
                    file.write_all(b"\n")?;
                    file.sync_data()?;
                }
            }
            Err(_) if !terminated => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no,
                    bytes = line.len(),
                    "Truncating torn line at end of output file"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(offset)?;
                file.sync_data()?;
            }
            Err(e) => {
                return Err(PrepError::MalformedRecordError {
                    line: line_no,
                    message: format!("{} in {}", e, path.display()),
                });
            }
        }

        offset += read as u64;
    }

    tracing::info!(
        "📂 {} records already processed, {} partial, in {}",
        set.len(),
        set.partial_len(),
        path.display()
    );
    Ok(set)
}
