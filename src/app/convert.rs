use crate::domain::model::Record;
use crate::utils::error::{PrepError, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const PROGRESS_EVERY: usize = 10_000;

/// Converts a headerless `caption<TAB>url` file into JSONL records with
/// consecutive ids starting at 0 (`image_id == id`).
pub fn convert_tsv_to_jsonl<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let reader = File::open(input.as_ref())?;
    let writer = BufWriter::new(File::create(output.as_ref())?);
    let count = convert(reader, writer)?;

    tracing::info!(
        "📝 Converted {} rows from {} to {}",
        count,
        input.as_ref().display(),
        output.as_ref().display()
    );
    Ok(count)
}

pub fn convert<R: Read, W: Write>(reader: R, mut writer: W) -> Result<usize> {
    let mut tsv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut count = 0usize;
    for (index, row) in tsv.records().enumerate() {
        let row = row?;
        let (caption, url) = match (row.get(0), row.get(1)) {
            (Some(caption), Some(url)) => (caption, url),
            _ => {
                return Err(PrepError::MalformedRecordError {
                    line: index + 1,
                    message: format!("expected 2 tab-separated columns, found {}", row.len()),
                })
            }
        };

        let record = Record::new(count as i64, caption, url);
        writer.write_all(record.to_json_line()?.as_bytes())?;
        writer.write_all(b"\n")?;
        count += 1;

        if count % PROGRESS_EVERY == 0 {
            tracing::info!("📝 {} rows converted", count);
        }
    }

    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_assigns_sequential_ids() {
        let tsv = "A dog on the beach.\thttp://img.example.com/1.jpg\n\
                   Actor attends the premiere\thttps://img.example.com/2.jpg\n";
        let mut out = Vec::new();

        let count = convert(tsv.as_bytes(), &mut out).unwrap();

        assert_eq!(count, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"image_id":0,"id":0,"caption":"A dog on the beach.","image_url":"http://img.example.com/1.jpg"}"#
        );
        let second: Record = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(second.image_id(), 1);
    }

    #[test]
    fn test_convert_keeps_unicode_unescaped() {
        let mut out = Vec::new();
        convert("café au lait\thttp://x/1.jpg\n".as_bytes(), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("café au lait"));
    }

    #[test]
    fn test_convert_rejects_single_column() {
        let mut out = Vec::new();
        let err = convert("ok\thttp://x/1\nmissing url\n".as_bytes(), &mut out).unwrap_err();
        assert!(matches!(err, PrepError::MalformedRecordError { line: 2, .. }));
    }

    #[test]
    fn test_convert_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("captions.tsv");
        let output = dir.path().join("cc3m_train.jsonl");
        std::fs::write(&input, "a\thttp://x/0\nb\thttp://x/1\nc\thttp://x/2\n").unwrap();

        assert_eq!(convert_tsv_to_jsonl(&input, &output).unwrap(), 3);
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 3);
    }
}
