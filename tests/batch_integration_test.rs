mod common;

use common::{secs, test_settings, ScriptedSleeper};
use httpmock::prelude::*;
use seo_batch::domain::model::{OutputRow, ERROR_MARKER};
use seo_batch::{BatchEngine, BatchError, CliConfig, LocalStorage, ScoringPipeline};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_input(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("keywords.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

fn read_output(path: &Path) -> Vec<OutputRow> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|row| row.unwrap()).collect()
}

fn engine(
    server: &MockServer,
    config: CliConfig,
    sleeper: Arc<ScriptedSleeper>,
) -> BatchEngine<ScoringPipeline<LocalStorage, CliConfig>> {
    let pipeline =
        ScoringPipeline::new(LocalStorage::default(), config, test_settings(server), sleeper).unwrap();
    BatchEngine::new(pipeline)
}

fn serp_entry(soseo: i64, dseo: i64) -> serde_json::Value {
    json!({"scores": {"soseo_main_content": soseo, "dseo_main_content": dseo}})
}

#[tokio::test]
async fn test_end_to_end_single_row() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let page_mock = server.mock(|when, then| {
        when.method(GET).path("/page");
        then.status(200)
            .body("<html><body><p>Example text</p></body></html>");
    });
    let guide_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/guide/")
            .body_contains("query=running+shoes");
        then.status(200).json_body(json!({"guide_id": 123}));
    });
    let check_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/check/123")
            .body("content=Example+text");
        then.status(200).json_body(json!({"score": 77, "danger": 3}));
    });
    let serp_mock = server.mock(|when, then| {
        when.method(GET).path("/api/serp/123");
        then.status(200).json_body(json!({"serps": [
            serp_entry(55, 10),
            serp_entry(61, 15),
            serp_entry(70, 20),
            serp_entry(42, 25),
            serp_entry(80, 31),
            serp_entry(99, 99)
        ]}));
    });

    let input = write_input(
        &temp_dir,
        &format!("KEYWORD,URL\nrunning shoes,{}\n", server.url("/page")),
    );
    let sleeper = ScriptedSleeper::new();
    let output_path = engine(&server, CliConfig::new(&input), sleeper.clone())
        .run()
        .await
        .unwrap();

    page_mock.assert_hits(1);
    guide_mock.assert_hits(1);
    check_mock.assert_hits(1);
    serp_mock.assert_hits(1);

    // Only the propagation wait; no retries happened.
    assert_eq!(sleeper.waits(), secs(&[60]));

    let expected_path = temp_dir.path().join("keywords_final_scores.csv");
    assert_eq!(PathBuf::from(&output_path), expected_path);

    let rows = read_output(&expected_path);
    assert_eq!(
        rows,
        vec![OutputRow {
            keyword: "running shoes".to_string(),
            url: server.url("/page"),
            content: "Example text".to_string(),
            guide_id: "123".to_string(),
            seo_score: "77".to_string(),
            danger: "3".to_string(),
            soseo_avg_3: "62".to_string(),
            soseo_avg_5: "61.6".to_string(),
            dseo_avg_3: "15".to_string(),
            dseo_avg_5: "20.2".to_string(),
        }]
    );

    let snapshot = std::fs::read_to_string(temp_dir.path().join("processed_keywords.csv")).unwrap();
    assert!(snapshot.starts_with("KEYWORD,URL,CONTENT\n"));
    assert!(snapshot.contains("running shoes"));
    assert!(snapshot.contains("Example text"));
}

#[tokio::test]
async fn test_every_row_written_when_the_service_is_down() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let guide_mock = server.mock(|when, then| {
        when.method(POST).path("/api/guide/");
        then.status(500);
    });
    let check_mock = server.mock(|when, then| {
        when.method(POST).path_contains("/api/check/");
        then.status(200).json_body(json!({"score": 1}));
    });

    let input = write_input(
        &temp_dir,
        "KEYWORD,URL,CONTENT\nshoes,http://a.test,first\nboots,http://b.test,second\nsandals,http://c.test,third\n",
    );
    let sleeper = ScriptedSleeper::new();
    let mut config = CliConfig::new(&input);
    config.no_snapshot = true;

    let output_path = engine(&server, config, sleeper.clone()).run().await.unwrap();

    guide_mock.assert_hits(3);
    check_mock.assert_hits(0);
    assert!(sleeper.waits().is_empty());
    assert!(!temp_dir.path().join("processed_keywords.csv").exists());

    let rows = read_output(Path::new(&output_path));
    assert_eq!(rows.len(), 3);
    let keywords: Vec<&str> = rows.iter().map(|r| r.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["shoes", "boots", "sandals"]);
    for row in &rows {
        assert_eq!(row.guide_id, ERROR_MARKER);
        assert_eq!(row.seo_score, ERROR_MARKER);
        assert_eq!(row.dseo_avg_5, ERROR_MARKER);
    }
    assert_eq!(rows[1].content, "second");
}

#[tokio::test]
async fn test_invalid_keyword_and_score_failure_rows() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let guide_mock = server.mock(|when, then| {
        when.method(POST).path("/api/guide/");
        then.status(200).json_body(json!({"guide_id": "7"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/check/7");
        then.status(403).body("quota exceeded");
    });
    let serp_mock = server.mock(|when, then| {
        when.method(GET).path("/api/serp/7");
        then.status(200).json_body(json!({"serps": []}));
    });

    let input = write_input(
        &temp_dir,
        "KEYWORD,URL,CONTENT\nmail@shop,http://a.test,text\nshoes,http://b.test,text\n",
    );
    let output = temp_dir.path().join("out").join("report.csv");
    let mut config = CliConfig::new(&input);
    config.output = Some(output.clone());

    let output_path = engine(&server, config, ScriptedSleeper::new())
        .run()
        .await
        .unwrap();
    assert_eq!(PathBuf::from(output_path), output);

    // The invalid keyword never reaches the guide endpoint.
    guide_mock.assert_hits(1);
    serp_mock.assert_hits(0);

    let rows = read_output(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].keyword, "mail@shop");
    assert_eq!(rows[0].guide_id, ERROR_MARKER);
    assert_eq!(rows[1].guide_id, "7");
    assert_eq!(rows[1].seo_score, ERROR_MARKER);
    assert_eq!(rows[1].soseo_avg_3, ERROR_MARKER);
}

#[tokio::test]
async fn test_empty_serp_is_reported_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/api/guide/");
        then.status(200).json_body(json!({"guide_id": 5}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/check/5");
        then.status(200).json_body(json!({"score": 40, "danger": 0}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/serp/5");
        then.status(200).json_body(json!({"serps": []}));
    });

    let input = write_input(&temp_dir, "KEYWORD,URL,CONTENT\nshoes,http://a.test,text\n");
    let output_path = engine(&server, CliConfig::new(&input), ScriptedSleeper::new())
        .run()
        .await
        .unwrap();

    let rows = read_output(Path::new(&output_path));
    assert_eq!(rows[0].seo_score, "40");
    assert_eq!(rows[0].danger, "0");
    for avg in [
        &rows[0].soseo_avg_3,
        &rows[0].soseo_avg_5,
        &rows[0].dseo_avg_3,
        &rows[0].dseo_avg_5,
    ] {
        assert_eq!(avg, "N/A");
    }
}

#[tokio::test]
async fn test_missing_input_file_fails_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let guide_mock = server.mock(|when, then| {
        when.method(POST).path("/api/guide/");
        then.status(200).json_body(json!({"guide_id": 1}));
    });

    let config = CliConfig::new(temp_dir.path().join("missing.csv"));
    let result = engine(&server, config, ScriptedSleeper::new()).run().await;

    match result {
        Err(error @ BatchError::InputError { .. }) => assert_eq!(error.exit_code(), 1),
        other => panic!("expected InputError, got {:?}", other),
    }
    guide_mock.assert_hits(0);
    assert!(!temp_dir.path().join("missing_final_scores.csv").exists());
}

#[tokio::test]
async fn test_input_without_required_columns_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let input = write_input(&temp_dir, "TERM,LINK\nshoes,http://a.test\n");

    let result = engine(&server, CliConfig::new(&input), ScriptedSleeper::new())
        .run()
        .await;
    assert!(matches!(result, Err(BatchError::MalformedInput { .. })));
}
