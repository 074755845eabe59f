#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use studyai_client::models::{FileState, GoalFrequency, GoalType, StudyGoal};
use studyai_client::services::auth::{AuthClient, AuthConfig};
use studyai_client::services::gemini::{GeminiClient, GeminiConfig};
use studyai_client::services::goal_store::{GoalStoreClient, GoalStoreConfig};
use studyai_client::session::StudySession;

// Port 1 is never listening, so every network call fails fast with a
// connection error instead of hanging on a timeout.
const OFFLINE_ENDPOINT: &str = "http://127.0.0.1:1";

pub fn offline_auth() -> AuthClient {
    AuthClient::new(AuthConfig {
        api_key: Some("test-key".to_string()),
        api_endpoint: OFFLINE_ENDPOINT.to_string(),
        timeout: Duration::from_millis(200),
    })
}

pub fn offline_gemini() -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".to_string()),
        model: "gemini-2.5-flash".to_string(),
        api_endpoint: OFFLINE_ENDPOINT.to_string(),
        timeout: Duration::from_millis(200),
    })
}

pub fn offline_store() -> GoalStoreClient {
    GoalStoreClient::new(GoalStoreConfig {
        api_endpoint: Some(OFFLINE_ENDPOINT.to_string()),
        timeout: Duration::from_millis(200),
    })
}

pub fn offline_session() -> StudySession {
    StudySession::new(offline_auth(), offline_gemini(), offline_store())
}

pub fn text_file(name: &str) -> FileState {
    FileState {
        name: name.to_string(),
        content: "aGVsbG8gd29ybGQ=".to_string(),
        mime_type: "text/plain".to_string(),
    }
}

pub fn goal(id: &str, goal_type: GoalType, target: u32, progress: u32) -> StudyGoal {
    StudyGoal {
        id: id.to_string(),
        goal_type,
        target,
        frequency: GoalFrequency::Daily,
        progress,
        last_reset: 0,
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Minimal local HTTP stub: serves the canned responses in order, one
/// connection per request, recording each request for later assertions.
pub struct StubServer {
    pub addr: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                recorded.lock().unwrap().push(request);

                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\n\
content-type: application/json\r\n\
content-length: {}\r\n\
connection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

    Some(RecordedRequest { method, path, body })
}
