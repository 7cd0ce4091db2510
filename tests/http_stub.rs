//! HTTP transport tests against an in-process stub server.
//!
//! The stub speaks just enough HTTP/1.1 to answer one scripted reply per
//! connection (`Connection: close`), so the real `reqwest` client, status
//! classification and retry loop are exercised without leaving localhost.

use nephroquiz::pipeline::llm::{complete, HttpTransport};
use nephroquiz::{generate_quiz, load_sources, DifficultyState, FailureKind, QuizConfig, QuizError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ── Stub server ──────────────────────────────────────────────────────────────

enum Reply {
    Status(u16, String),
    Hang,
}

type RequestLog = Arc<Mutex<Vec<String>>>;

async fn spawn_stub(replies: Vec<Reply>) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);
            match reply {
                Reply::Status(status, body) => {
                    let response = format!(
                        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        reason(status),
                        body.len()
                    );
                    socket.write_all(response.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                }
                Reply::Hang => {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        drop(socket);
                    });
                }
            }
        }
    });

    (format!("http://{addr}/openai/v1/chat/completions"), log)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn chat_envelope(content: &str) -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

fn config_for(endpoint: &str) -> QuizConfig {
    QuizConfig::builder()
        .endpoint(endpoint)
        .api_key("test-key")
        .retry_wait_ms(0)
        .request_timeout_secs(1)
        .build()
        .unwrap()
}

// ── LLM client ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let (url, log) = spawn_stub(vec![
        Reply::Status(401, r#"{"error":"invalid_api_key"}"#.into()),
        Reply::Status(200, chat_envelope("never reached")),
    ])
    .await;
    let config = config_for(&url);
    let transport = HttpTransport::from_config(&config).unwrap();

    let err = complete(&transport, "hello", &config).await.unwrap_err();
    match err {
        QuizError::AuthOrEndpoint { status, ref body } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_api_key"));
        }
        ref other => panic!("unexpected error: {other:?}"),
    }

    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = requests[0].to_lowercase();
    assert!(request.starts_with("post /openai/v1/chat/completions"));
    assert!(request.contains("authorization: bearer test-key"));
    assert!(request.contains("\"model\":\"mistral-saba-24b\""));
}

#[tokio::test]
async fn service_unavailable_then_success() {
    let completion = r#"Here: {"1": {"question": "Which stage is kidney failure?", "options": {"a": "Stage 1", "b": "Stage 5"}, "correct": "b", "explanation": "eGFR < 15"}}"#;
    let (url, log) = spawn_stub(vec![
        Reply::Status(503, "model loading".into()),
        Reply::Status(503, "model loading".into()),
        Reply::Status(200, chat_envelope(completion)),
    ])
    .await;

    let quiz = generate_quiz("CKD", 1, &DifficultyState::new(), &config_for(&url))
        .await
        .unwrap();
    assert_eq!(quiz.len(), 1);
    assert_eq!(quiz.questions[0].correct_option(), Some("Stage 5"));
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn retries_exhausted_on_server_errors() {
    let (url, _log) = spawn_stub(vec![
        Reply::Status(500, "boom".into()),
        Reply::Status(502, "bad gateway".into()),
    ])
    .await;
    let config = QuizConfig::builder()
        .endpoint(url)
        .max_retries(2)
        .retry_wait_ms(0)
        .build()
        .unwrap();
    let transport = HttpTransport::from_config(&config).unwrap();

    let err = complete(&transport, "hello", &config).await.unwrap_err();
    match err {
        QuizError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("502"), "got: {last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn request_timeout_is_retried() {
    let (url, log) = spawn_stub(vec![
        Reply::Hang,
        Reply::Status(200, json!({"response": "ok"}).to_string()),
    ])
    .await;
    let config = config_for(&url);
    let transport = HttpTransport::from_config(&config).unwrap();

    let text = complete(&transport, "hello", &config).await.unwrap();
    assert_eq!(text, "ok");
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn non_json_success_is_unexpected_format() {
    let (url, _log) = spawn_stub(vec![Reply::Status(200, "<html>proxy page</html>".into())]).await;
    let config = config_for(&url);
    let transport = HttpTransport::from_config(&config).unwrap();

    let err = complete(&transport, "hello", &config).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnexpectedFormat);
    assert_eq!(err.raw_text(), Some("<html>proxy page</html>"));
}

// ── Source download ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sources_from_url() {
    let body = json!(["First abstract.", "Second abstract."]).to_string();
    let (url, _log) = spawn_stub(vec![Reply::Status(200, body)]).await;
    let sources = load_sources(&url, &QuizConfig::default()).await.unwrap();
    assert_eq!(sources, vec!["First abstract.", "Second abstract."]);
}

#[tokio::test]
async fn download_error_status() {
    let (url, _log) = spawn_stub(vec![Reply::Status(404, "missing".into())]).await;
    let err = load_sources(&url, &QuizConfig::default()).await.unwrap_err();
    assert!(matches!(err, QuizError::DownloadFailed { .. }));
}

#[tokio::test]
async fn download_timeout_comes_from_config() {
    let (url, _log) = spawn_stub(vec![Reply::Hang]).await;
    let config = QuizConfig::builder().download_timeout_secs(1).build().unwrap();

    let started = std::time::Instant::now();
    let err = load_sources(&url, &config).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        QuizError::DownloadFailed { reason, .. } => {
            assert!(reason.contains("timed out after 1s"), "got: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
