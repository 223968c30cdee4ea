use logwindow::cli::run::{build_config, run_with_config, RunOverrides};
use logwindow::config::types::Config;
use std::fs;
use tempfile::TempDir;

fn write_log(dir: &TempDir, lines: usize) -> std::path::PathBuf {
    let path = dir.path().join("app.log");
    let mut content = String::new();
    for i in 0..lines {
        content.push_str(&format!("2025-01-01T00:00:{:02}Z INFO request {}\n", i % 60, i));
    }
    fs::write(&path, content).unwrap();
    path
}

fn read_batches(path: &std::path::Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_file_to_jsonl_batches() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_log(&temp_dir, 250);
    let output = temp_dir.path().join("batches.jsonl");

    let overrides = RunOverrides {
        input: Some(input),
        output: Some(output.clone()),
        source_id: Some("api".to_string()),
        ..Default::default()
    };
    let config = build_config(None, overrides).unwrap();
    let summary = run_with_config(config).await.unwrap();

    assert_eq!(summary.read.lines_read, 250);
    assert_eq!(summary.records, 250);
    assert_eq!(summary.size_batches, 2);
    assert_eq!(summary.drain_batches, 1);

    let batches = read_batches(&output);
    let sizes: Vec<u64> = batches.iter().map(|b| b["size"].as_u64().unwrap()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);

    let triggers: Vec<&str> = batches.iter().map(|b| b["trigger"].as_str().unwrap()).collect();
    assert_eq!(triggers, vec!["size", "size", "drain"]);

    let sequence: Vec<u64> = batches.iter().map(|b| b["sequence_num"].as_u64().unwrap()).collect();
    assert_eq!(sequence, vec![0, 1, 2]);

    // Records keep source order across batch boundaries
    let records: Vec<&serde_json::Value> = batches
        .iter()
        .flat_map(|b| b["records"].as_array().unwrap().iter())
        .collect();
    assert_eq!(records.len(), 250);
    assert_eq!(records[0]["source_id"], "api");
    assert_eq!(records[0]["line_number"], 1);
    assert!(records[249]["raw_text"].as_str().unwrap().ends_with("request 249"));
}

#[tokio::test]
async fn test_output_is_appended_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_log(&temp_dir, 3);
    let output = temp_dir.path().join("batches.jsonl");

    for _ in 0..2 {
        let mut config = Config::default();
        config.source.path = input.clone();
        config.output.path = output.clone();
        run_with_config(config).await.unwrap();
    }

    let batches = read_batches(&output);
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b["size"] == 3));
    assert_ne!(batches[0]["batch_id"], batches[1]["batch_id"]);
}

#[tokio::test]
async fn test_missing_input_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("batches.jsonl");

    let mut config = Config::default();
    config.source.path = temp_dir.path().join("missing.log");
    config.output.path = output;

    assert!(run_with_config(config).await.is_err());
}
