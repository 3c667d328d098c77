use assert_cmd::Command;
use assert_cmd::cargo_bin;
use axum::routing::post;
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{Value, json};
use std::io::Write;
use tempfile::NamedTempFile;

async fn completions(Json(body): Json<Value>) -> Json<Value> {
    let text = body["messages"][1]["content"].as_str().unwrap_or_default();
    let intent = if text.contains("öde") {
        json!({"intent": "PAY_DEBT", "studentNo": "12345", "amount": 100, "term": null})
    } else if text.contains("borc") {
        json!({"intent": "QUERY_DEBT", "studentNo": "12345", "amount": null, "term": null})
    } else if text.contains("merhaba") {
        json!({"intent": "GREETING", "studentNo": null, "amount": null, "term": null})
    } else {
        json!({"intent": "UNKNOWN", "studentNo": null, "amount": null, "term": null})
    };
    Json(json!({"choices": [{"message": {"role": "assistant", "content": intent.to_string()}}]}))
}

/// Starts a mock classifier on its own runtime; the runtime must outlive the command.
fn mock_classifier() -> (tokio::runtime::Runtime, String) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/chat/completions", post(completions));
    rt.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (rt, format!("http://{addr}"))
}

fn seed_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "student_no,student_name,term,balance").unwrap();
    writeln!(file, "12345, Ayse Yilmaz, Guz 2024, 450").unwrap();
    file
}

fn desk(classifier_url: &str) -> Command {
    let mut cmd = Command::new(cargo_bin!("tuition-desk"));
    cmd.env_remove("RUST_LOG")
        .arg("--classifier-url")
        .arg(classifier_url)
        .arg("--classifier-key")
        .arg("sk-test")
        .arg("--max-in-flight")
        .arg("1");
    cmd
}

#[test]
fn test_cli_stdio_conversation() {
    let (_rt, url) = mock_classifier();
    let seed = seed_file();
    let export = NamedTempFile::new().unwrap();

    let input = [
        r#"{"id": 1, "content": "merhaba", "sender": "user"}"#,
        r#"{"id": 2, "content": "Merhaba! ...", "sender": "ai"}"#,
        r#"{"id": 3, "content": "12345 borcum ne kadar?", "sender": "user"}"#,
        r#"{"id": 4, "content": "12345 için 100 TL öde", "sender": "user"}"#,
        r#"{"id": 5, "content": "12345 borcum ne kadar?", "sender": "user"}"#,
    ]
    .join("\n");

    let output = desk(&url)
        .arg("--locale")
        .arg("tr")
        .arg("--ledger-seed")
        .arg(seed.path())
        .arg("--export")
        .arg(export.path())
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let replies: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 4);
    assert!(replies.iter().all(|r| r["sender"] == "ai"));

    let answered: Vec<&str> = replies.iter().map(|r| r["in_reply_to"].as_str().unwrap()).collect();
    assert_eq!(answered, ["1", "3", "4", "5"]);
    assert!(replies[1]["content"].as_str().unwrap().contains("450.00 TL"));
    assert!(replies[2]["content"].as_str().unwrap().contains("Kalan borç: **350.00 TL**"));
    assert!(replies[3]["content"].as_str().unwrap().contains("350.00 TL"));

    let exported = std::fs::read_to_string(export.path()).unwrap();
    assert_eq!(exported, "student_no,term,balance\n12345,Guz 2024,350.00\n");
}

#[test]
fn test_cli_skips_unreadable_lines() {
    let (_rt, url) = mock_classifier();

    desk(&url)
        .write_stdin("not json\n\n{\"id\": 1, \"content\": \"merhaba\", \"sender\": \"user\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"in_reply_to\":\"1\""))
        .stdout(predicate::str::contains("Hello!"));
}

#[test]
fn test_cli_requires_classifier_key() {
    let mut cmd = Command::new(cargo_bin!("tuition-desk"));
    cmd.env_remove("OPENAI_API_KEY");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--classifier-key"));
}

#[test]
fn test_cli_rest_backend_requires_url() {
    let mut cmd = Command::new(cargo_bin!("tuition-desk"));
    cmd.env_remove("TUITION_API_URL")
        .arg("--classifier-key")
        .arg("sk-test")
        .arg("--backend")
        .arg("rest");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--api-url is required"));
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let mut cmd = Command::new(cargo_bin!("tuition-desk"));
    cmd.env_remove("RUST_LOG")
        .arg("--classifier-key")
        .arg("sk-test")
        .arg("--db-path")
        .arg("some_db")
        .write_stdin("");

    cmd.assert().success().stderr(predicate::str::contains(
        "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage.",
    ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_ledger_survives_restart() {
    let (_rt, url) = mock_classifier();
    let seed = seed_file();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    desk(&url)
        .arg("--db-path")
        .arg(&db_path)
        .arg("--ledger-seed")
        .arg(seed.path())
        .write_stdin(r#"{"id": "a-1", "content": "12345 için 100 TL öde", "sender": "user"}"#)
        .assert()
        .success()
        .stderr(predicate::str::contains("Falling back").not());

    desk(&url)
        .arg("--db-path")
        .arg(&db_path)
        .write_stdin(r#"{"id": "a-2", "content": "12345 borcum ne kadar?", "sender": "user"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("350.00 TL"));
}
