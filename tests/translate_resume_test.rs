use cc3m_prep::app::runner::translate_captions;
use cc3m_prep::config::{UploadBackend, UploadConfig};
use cc3m_prep::core::retry::RetryPolicy;
use cc3m_prep::{Record, TranslateConfig};
use httpmock::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const CAPTIONS: [&str; 4] = [
    "A photo of a dog.",
    "Close-up of a red car",
    "Trees at night...",
    "an image of people on a beach",
];

fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("cc3m_valid.jsonl");
    let lines: Vec<String> = CAPTIONS
        .iter()
        .enumerate()
        .map(|(id, caption)| {
            Record::new(id as i64, *caption, format!("http://example.com/{}.jpg", id))
                .to_json_line()
                .unwrap()
        })
        .collect();
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn config(input: PathBuf, output_dir: &Path, endpoint: String) -> TranslateConfig {
    let mut config = TranslateConfig {
        input,
        output_dir: output_dir.to_path_buf(),
        langs: vec!["fr".to_string()],
        batch_size: 2,
        flush_every: 1,
        workers: 2,
        pause_ms: 0,
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..Default::default()
    };
    config.translator.endpoint = endpoint;
    config
}

fn read_output(path: &Path) -> Vec<Record> {
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.ends_with('\n'));
    let mut records: Vec<Record> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    records.sort_by_key(|r| r.id);
    records
}

/// Last line per id, as a resumed run leaves superseded lines behind.
fn latest_by_id(path: &Path) -> BTreeMap<i64, Record> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<Record>(line).unwrap())
        .fold(BTreeMap::new(), |mut latest, record| {
            latest.insert(record.id, record);
            latest
        })
}

#[tokio::test]
async fn test_translate_end_to_end_and_resume() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let translate_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .body_contains("\"target\":\"fr\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({"translatedText": "Bonjour le monde."}));
    });

    let input = write_input(temp_dir.path());
    let config = config(input, temp_dir.path(), server.url("/translate"));
    let output = config.output_path();
    assert_eq!(
        output,
        temp_dir.path().join("cc3m_valid_translated_0_to_end.jsonl")
    );

    let first = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(first.read, 4);
    assert_eq!(first.completed, 4);
    assert_eq!(first.written, 4);
    translate_mock.assert_hits(4);

    let records = read_output(&output);
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(records[0].text_field("en"), Some("dog"));
    assert_eq!(records[1].text_field("en"), Some("red car"));
    assert_eq!(records[2].text_field("en"), Some("trees at night"));
    assert_eq!(records[3].text_field("en"), Some("people on a beach"));
    for record in &records {
        assert_eq!(record.text_field("fr"), Some("bonjour le monde"));
        assert!(record.caption.is_some());
    }

    // Backup mirrors the output after every flush
    let mut backup = output.clone().into_os_string();
    backup.push("-backup");
    assert_eq!(
        std::fs::read_to_string(&backup).unwrap(),
        std::fs::read_to_string(&output).unwrap()
    );

    let second = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(second.already_processed, 4);
    assert_eq!(second.completed, 0);
    translate_mock.assert_hits(4);
    assert_eq!(read_output(&output).len(), 4);
}

#[tokio::test]
async fn test_translate_recovers_torn_tail() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let translate_mock = server.mock(|when, then| {
        when.method(POST).path("/translate");
        then.status(200)
            .json_body(serde_json::json!({"translatedText": "chien"}));
    });

    let input = write_input(temp_dir.path());
    let config = config(input, temp_dir.path(), server.url("/translate"));
    let output = config.output_path();

    let mut done = Record::new(0, CAPTIONS[0], "http://example.com/0.jpg");
    done.set_text_field("en", "dog");
    done.set_text_field("fr", "chien");
    let mut second = Record::new(1, CAPTIONS[1], "http://example.com/1.jpg");
    second.set_text_field("en", "red car");
    second.set_text_field("fr", "voiture rouge");
    std::fs::write(
        &output,
        format!(
            "{}\n{}\n{{\"image_id\":2,\"id\":2,\"capt",
            done.to_json_line().unwrap(),
            second.to_json_line().unwrap()
        ),
    )
    .unwrap();

    let summary = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(summary.already_processed, 2);
    assert_eq!(summary.completed, 2);
    translate_mock.assert_hits(2);

    let records = read_output(&output);
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(records[1].text_field("fr"), Some("voiture rouge"));
    assert_eq!(records[2].text_field("fr"), Some("chien"));
}

#[tokio::test]
async fn test_translate_failure_leaves_language_absent() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let failing = server.mock(|when, then| {
        when.method(POST).path("/translate");
        then.status(503);
    });

    let input = write_input(temp_dir.path());
    let mut config = config(input, temp_dir.path(), server.url("/translate"));
    config.sup = Some(2);
    let output = config.output_path();
    assert!(output.ends_with("cc3m_valid_translated_0_to_2.jsonl"));

    let summary = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(summary.read, 2);
    assert_eq!(summary.completed, 2);
    // Two records, two attempts each
    failing.assert_hits(4);

    let records = read_output(&output);
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.text_field("en").is_some());
        assert_eq!(record.text_field("fr"), None);
    }
}

#[tokio::test]
async fn test_translate_uploads_to_local_mirror() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/translate");
        then.status(200)
            .json_body(serde_json::json!({"translatedText": "salut"}));
    });

    let input = write_input(temp_dir.path());
    let config = config(input, temp_dir.path(), server.url("/translate"));

    let mirror_root = temp_dir.path().join("mirror");
    let mut upload = UploadConfig::new(UploadBackend::Local, "cc3m-data");
    upload.prefix = "translated".to_string();
    upload.every_n_flushes = 100;
    upload.local_root = Some(mirror_root.clone());

    let summary = translate_captions(&config, Some(&upload), false)
        .await
        .unwrap();
    assert_eq!(summary.completed, 4);

    let uploaded = mirror_root
        .join("cc3m-data")
        .join("translated")
        .join("cc3m_valid_translated_0_to_end.jsonl");
    assert_eq!(
        std::fs::read_to_string(uploaded).unwrap(),
        std::fs::read_to_string(config.output_path()).unwrap()
    );
}

#[tokio::test]
async fn test_resume_fills_missing_languages() {
    let temp_dir = TempDir::new().unwrap();
    let flaky = MockServer::start();

    let es_ok = flaky.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .body_contains("\"target\":\"es\"");
        then.status(200)
            .json_body(serde_json::json!({"translatedText": "perro"}));
    });
    let fr_down = flaky.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .body_contains("\"target\":\"fr\"");
        then.status(503);
    });

    let input = write_input(temp_dir.path());
    let mut config = config(input, temp_dir.path(), flaky.url("/translate"));
    config.langs = vec!["fr".to_string(), "es".to_string()];
    let output = config.output_path();

    let first = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(first.completed, 4);
    es_ok.assert_hits(4);
    fr_down.assert_hits(8);
    for record in latest_by_id(&output).values() {
        assert_eq!(record.text_field("fr"), None);
        assert_eq!(record.text_field("es"), Some("perro"));
    }

    let healthy = MockServer::start();
    let es_again = healthy.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .body_contains("\"target\":\"es\"");
        then.status(200)
            .json_body(serde_json::json!({"translatedText": "gato"}));
    });
    let fr_ok = healthy.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .body_contains("\"target\":\"fr\"");
        then.status(200)
            .json_body(serde_json::json!({"translatedText": "chien"}));
    });
    config.translator.endpoint = healthy.url("/translate");

    let second = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(second.already_processed, 0);
    assert_eq!(second.resumed, 4);
    assert_eq!(second.completed, 4);
    es_again.assert_hits(0);
    fr_ok.assert_hits(4);

    let latest = latest_by_id(&output);
    assert_eq!(latest.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    for record in latest.values() {
        assert_eq!(record.text_field("fr"), Some("chien"));
        assert_eq!(record.text_field("es"), Some("perro"));
        assert!(record.caption.is_some());
    }

    let third = translate_captions(&config, None, false).await.unwrap();
    assert_eq!(third.already_processed, 4);
    assert_eq!(third.resumed, 0);
    fr_ok.assert_hits(4);
}
