use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use agent_provider::retry::RetryPolicy;
use agent_provider_messages::client::{MessagesApiError, MessagesClient, MessagesClientConfig};
use agent_provider_messages::payload::{ContentBlock, Message, MessagesRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    heads: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener.local_addr().expect("resolved local listener address");
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let heads = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn({
            let request_count = Arc::clone(&request_count);
            let heads = Arc::clone(&heads);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let heads = Arc::clone(&heads);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, heads).await;
                    });
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            request_count,
            heads,
        }
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<(u16, &'static str)>>,
    request_count: Arc<AtomicUsize>,
    heads: Arc<Mutex<Vec<String>>>,
) {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 4096];
    let header_end = loop {
        let Ok(n) = socket.read(&mut buffer).await else {
            return;
        };
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };
    let head = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while request.len() < header_end + content_length {
        match socket.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&buffer[..n]),
        }
    }
    heads.lock().expect("heads lock").push(head);

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let (status, body) = scripts.get(index).copied().unwrap_or((500, "{}"));
    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn client_for(server: &ScriptedServer) -> MessagesClient {
    MessagesClient::new(
        MessagesClientConfig::new("sk-ant")
            .with_base_url(&server.base_url)
            .with_retry(RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
            }),
    )
    .expect("client")
}

fn request() -> MessagesRequest {
    MessagesRequest {
        model: "claude-sonnet-4-5".to_string(),
        max_tokens: 1024,
        system: String::new(),
        messages: vec![Message::user_text("hi")],
        tools: Vec::new(),
        thinking: None,
    }
}

#[tokio::test]
async fn create_sends_auth_headers_and_decodes_response() {
    let server = ScriptedServer::new(vec![(
        200,
        r#"{"id":"msg_1","content":[{"type":"text","text":"hello"}],"stop_reason":"end_turn","usage":{"input_tokens":5,"output_tokens":2}}"#,
    )])
    .await;

    let response = client_for(&server).create(&request()).await.expect("create");

    assert_eq!(response.content, vec![ContentBlock::Text { text: "hello".to_string() }]);
    assert_eq!(response.usage.input_tokens, 5);
    let heads = server.heads.lock().expect("heads lock").clone();
    assert!(heads[0].starts_with("post /v1/messages "));
    assert!(heads[0].contains("x-api-key: sk-ant"));
    assert!(heads[0].contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn overloaded_status_is_retried() {
    let server = ScriptedServer::new(vec![
        (529, r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
        (200, r#"{"id":"msg_2","content":[],"usage":{"input_tokens":1,"output_tokens":1}}"#),
    ])
    .await;

    let response = client_for(&server).create(&request()).await.expect("create");

    assert_eq!(response.id, "msg_2");
    assert_eq!(server.request_count.load(Ordering::Acquire), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = ScriptedServer::new(vec![(
        400,
        r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#,
    )])
    .await;

    let error = client_for(&server)
        .create(&request())
        .await
        .expect_err("bad request");

    assert!(matches!(
        error,
        MessagesApiError::Status { status: 400, ref message } if message == "max_tokens too large"
    ));
    assert_eq!(server.request_count.load(Ordering::Acquire), 1);
}
