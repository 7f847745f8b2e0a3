use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};

fn ask_command(history_file: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ask"));
    cmd.env("HISTORY_FILE", history_file)
        .env("MODEL_PROVIDER", "ollama")
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1")
        .env_remove("MODEL")
        .env_remove("ESCALATION_MODEL")
        .env_remove("MODEL_BASE_URL")
        .env_remove("QUERY_APPEND")
        .env_remove("LOG_OUTPUT");
    cmd
}

fn run(history_file: &Path, args: &[&str]) -> Output {
    ask_command(history_file)
        .args(args)
        .output()
        .expect("failed to run ask binary")
}

/// Serves one Ollama-style chat response and hands back the request body.
fn fake_ollama(reply: &str) -> (String, JoinHandle<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let body = serde_json::json!({
        "model": "stub",
        "message": { "role": "assistant", "content": reply },
        "done": true
    })
    .to_string();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept should succeed");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read header line");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().expect("numeric content-length");
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader
            .read_exact(&mut request_body)
            .expect("read request body");

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .expect("write response");
        stream.flush().expect("flush response");

        serde_json::from_slice(&request_body).expect("request body should be JSON")
    });

    (base_url, handle)
}

fn seed_history(path: &Path, answers: usize) {
    let now = chrono::Utc::now();
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": "prompt",
        "timestamp": now.to_rfc3339(),
    })];
    for i in 0..answers {
        messages.push(serde_json::json!({
            "role": "user", "content": format!("question {i}"), "timestamp": now.to_rfc3339(),
        }));
        messages.push(serde_json::json!({
            "role": "assistant", "content": format!("answer {i}"), "timestamp": now.to_rfc3339(),
        }));
    }
    let doc = serde_json::json!({ "escalated_at": null, "messages": messages });
    fs::write(path, doc.to_string()).expect("write history");
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn question_round_trip_persists_history() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    let (base_url, server) = fake_ollama("Use `ss -tulpn`.");

    let output = ask_command(&history)
        .env("MODEL_BASE_URL", &base_url)
        .args(["--raw", "how", "do", "I", "list", "ports?"])
        .output()
        .expect("failed to run ask binary");
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout(&output).trim(), "Use `ss -tulpn`.");

    let request = server.join().expect("server thread should join");
    assert_eq!(request["model"], "qwen2.5:3b");
    assert_eq!(request["messages"][0]["role"], "system");
    assert!(
        request["messages"][0]["content"]
            .as_str()
            .is_some_and(|content| content.contains("<system_detail>"))
    );
    assert_eq!(request["messages"][1]["content"], "how do I list ports?");

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&history).expect("history written"))
            .expect("history is JSON");
    let messages = saved["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["role"], "assistant");

    let last = run(&history, &["--last", "--raw"]);
    assert!(last.status.success());
    assert_eq!(stdout(&last).trim(), "Use `ss -tulpn`.");
}

#[test]
fn piped_stdin_becomes_context() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    let (base_url, server) = fake_ollama("It is a permissions problem.");

    let mut child = ask_command(&history)
        .env("MODEL_BASE_URL", &base_url)
        .args(["-r", "what", "went", "wrong?"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ask");
    child
        .stdin
        .take()
        .expect("stdin handle")
        .write_all(b"Permission denied (publickey)")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for ask");
    assert!(output.status.success());

    let request = server.join().expect("server thread should join");
    assert_eq!(
        request["messages"][1]["content"],
        "what went wrong?\n\n<context>\nPermission denied (publickey)\n</context>"
    );
}

#[test]
fn empty_query_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");

    let output = run(&history, &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no query provided"));
    assert!(!history.exists());
}

#[test]
fn history_lists_ten_most_recent_answers() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    seed_history(&history, 12);

    let output = run(&history, &["--history"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 10);
    assert!(lines[0].starts_with(" 0."), "{listing}");
    assert!(lines[0].ends_with("answer 11"), "{listing}");
    assert!(lines[9].ends_with("answer 2"), "{listing}");

    let got = run(&history, &["--get", "3", "--raw"]);
    assert!(got.status.success());
    assert_eq!(stdout(&got).trim(), "answer 8");
}

#[test]
fn out_of_range_ordinal_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    seed_history(&history, 2);

    let output = run(&history, &["--get", "5"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no assistant message with ordinal 5"));
}

#[test]
fn last_on_empty_history_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&dir.path().join("history.json"), &["--last"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("history is empty"));
}

#[test]
fn clear_empties_persisted_history() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    seed_history(&history, 3);

    let output = run(&history, &["--clear"]);
    assert!(output.status.success());

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&history).expect("history written"))
            .expect("history is JSON");
    assert_eq!(saved["messages"].as_array().map(Vec::len), Some(0));
    assert!(saved["escalated_at"].is_null());
}

#[test]
fn expired_history_is_pruned_on_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    let stale = (chrono::Utc::now() - chrono::TimeDelta::hours(2)).to_rfc3339();
    let doc = serde_json::json!({
        "messages": [
            { "role": "user", "content": "old", "timestamp": stale },
            { "role": "assistant", "content": "old answer", "timestamp": stale },
        ]
    });
    fs::write(&history, doc.to_string()).expect("write history");

    let output = run(&history, &["--last"]);
    assert!(!output.status.success());

    let kept = ask_command(&history)
        .env("HISTORY_PRUNING", "off")
        .args(["--last", "--raw"])
        .output()
        .expect("failed to run ask binary");
    assert!(kept.status.success());
    assert_eq!(stdout(&kept).trim(), "old answer");
}

#[test]
fn escalate_alone_records_transition_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    seed_history(&history, 1);

    let first = run(&history, &["--escalate"]);
    assert!(first.status.success());
    assert!(String::from_utf8_lossy(&first.stderr).contains("Escalated to qwen2.5:14b"));

    let second = run(&history, &["--escalate"]);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("Already escalated"));

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&history).expect("history written"))
            .expect("history is JSON");
    let system_count = saved["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .filter(|msg| msg["role"] == "system")
        .count();
    assert_eq!(system_count, 2);
    assert!(saved["escalated_at"].is_string());
}

#[test]
fn escalated_conversation_uses_stronger_model() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");
    seed_history(&history, 1);
    assert!(run(&history, &["-e"]).status.success());

    let (base_url, server) = fake_ollama("Sure.");
    let output = ask_command(&history)
        .env("MODEL_BASE_URL", &base_url)
        .args(["-r", "again"])
        .output()
        .expect("failed to run ask binary");
    assert!(output.status.success());

    let request = server.join().expect("server thread should join");
    assert_eq!(request["model"], "qwen2.5:14b");
}

#[test]
fn missing_api_key_is_fatal_for_queries_only() {
    let dir = tempfile::tempdir().expect("temp dir");
    let history = dir.path().join("history.json");

    let output = ask_command(&history)
        .env("MODEL_PROVIDER", "groq")
        .env_remove("GROQ_API_KEY")
        .env_remove("MODEL_API_KEY")
        .arg("hello")
        .output()
        .expect("failed to run ask binary");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("GROQ_API_KEY is not set"));
    assert!(!history.exists());

    let system = ask_command(&history)
        .env("MODEL_PROVIDER", "groq")
        .env_remove("GROQ_API_KEY")
        .env_remove("MODEL_API_KEY")
        .arg("--system")
        .output()
        .expect("failed to run ask binary");
    assert!(system.status.success());
    assert!(stdout(&system).contains("Terminal: "));
}

#[test]
fn debug_mode_reports_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(
        &dir.path().join("history.json"),
        &["--debug", "/definitely/not/here.py"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("File not found"));
}
