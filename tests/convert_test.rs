use cc3m_prep::app::convert::convert_tsv_to_jsonl;
use cc3m_prep::app::runner::inspect_records;
use tempfile::TempDir;

#[test]
fn test_convert_then_inspect() {
    let temp_dir = TempDir::new().unwrap();
    let tsv = temp_dir.path().join("Validation_GCC-1.1.0-Validation.tsv");
    let jsonl = temp_dir.path().join("cc3m_valid.jsonl");

    std::fs::write(
        &tsv,
        "author : a life in photography\thttp://example.com/a.jpg\n\
         the player \"shoots\" the ball\thttp://example.com/b.jpg\n\
         trees at night\thttp://example.com/c.jpg\n",
    )
    .unwrap();

    let count = convert_tsv_to_jsonl(&tsv, &jsonl).unwrap();
    assert_eq!(count, 3);

    let first_line = std::fs::read_to_string(&jsonl)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    assert_eq!(
        first_line,
        r#"{"image_id":0,"id":0,"caption":"author : a life in photography","image_url":"http://example.com/a.jpg"}"#
    );

    let records = inspect_records(&jsonl, 10).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].id, 1);
    assert_eq!(records[1].caption.as_deref(), Some("the player \"shoots\" the ball"));
    assert_eq!(records[2].image_url.as_deref(), Some("http://example.com/c.jpg"));
}
