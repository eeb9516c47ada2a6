use std::sync::Arc;

use delta_stream::prelude::*;
use delta_stream::{TransportError, channel_sink};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;

/// Serves exactly one HTTP exchange and returns the raw request text.
async fn serve_once(
    status_line: &'static str,
    body_parts: Vec<String>,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.expect("write head");
        for part in body_parts {
            socket.write_all(part.as_bytes()).await.expect("write body");
            socket.flush().await.expect("flush");
            tokio::task::yield_now().await;
        }
        socket.shutdown().await.expect("shutdown");
        request
    });
    (format!("http://{addr}/api/chat"), server)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let n = socket.read(&mut buf).await.expect("read");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn content(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices":[{"delta":{"content": text}}]})
    )
}

#[tokio::test]
async fn streams_sse_body_from_http_server() {
    let (endpoint, server) = serve_once(
        "200 OK",
        vec![
            content("Hi"),
            "data: {\"choices\":[{\"delta\":{\"content\":\" th".to_string(),
            "ere\"}}]}\n\ndata: [DONE]\n\n".to_string(),
        ],
    )
    .await;

    let config = ClientConfig::new(endpoint).default_header("x-client", "test");
    let manager = StreamManager::new(Arc::new(ReqwestTransport::new(&config).expect("transport")));
    let request = config
        .request()
        .body(ChatPayload::new(vec![ChatMessage::user("hello")]))
        .build()
        .expect("request");
    let (sink, mut rx) = channel_sink();

    let outcome = manager
        .start(request, sink)
        .expect("start")
        .finish()
        .await
        .expect("finish");
    assert_eq!(outcome.text(), Some("Hi there"));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&StreamEvent::Started));
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Completed {
            full_text: "Hi there".into()
        })
    );

    let raw_request = server.await.expect("server").to_ascii_lowercase();
    assert!(raw_request.starts_with("post /api/chat"));
    assert!(raw_request.contains("content-type: application/json"));
    assert!(raw_request.contains("x-client: test"));
    assert!(raw_request.contains(r#"{"messages":[{"role":"user","content":"hello"}]}"#));
}

#[tokio::test]
async fn non_success_status_is_reported_once_as_error() {
    let (endpoint, server) = serve_once(
        "500 Internal Server Error",
        vec!["upstream exploded".to_string()],
    )
    .await;

    let config = ClientConfig::new(endpoint);
    let manager = StreamManager::new(Arc::new(ReqwestTransport::new(&config).expect("transport")));
    let request = config.request().build().expect("request");
    let (sink, mut rx) = channel_sink();

    let outcome = manager
        .start(request, sink)
        .expect("start")
        .finish()
        .await
        .expect("finish");
    let expected = StreamError::Transport(TransportError::status(500, "upstream exploded"));
    assert_eq!(outcome, StreamOutcome::Failed(expected.clone()));

    let mut errors = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, StreamEvent::Error { .. }) {
            errors += 1;
        }
    }
    assert_eq!(errors, 1);
    let _ = server.await;
}
