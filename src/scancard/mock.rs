//! In-process scancard stand-in for tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::ScancardConfig;

/// What the mock does with one request.
pub(crate) enum Reply {
    /// Write these bytes and close.
    Bytes(Vec<u8>),
    /// Keep the connection open without answering.
    Silent,
    /// Close without writing anything.
    Close,
}

impl Reply {
    pub(crate) fn code(ret: i64) -> Self {
        Reply::Bytes(format!("{{\"ret\":{ret}}}").into_bytes())
    }
}

/// Accepts connections, records each decoded request and answers through a responder.
pub(crate) struct MockScancard {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl MockScancard {
    pub(crate) async fn spawn<F>(responder: F) -> Self
    where
        F: FnMut(&Value) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder = Arc::new(Mutex::new(responder));

        let log = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let log = Arc::clone(&log);
                let responder = Arc::clone(&responder);
                tokio::spawn(async move {
                    serve(stream, log, responder).await;
                });
            }
        });

        Self { addr, requests, handle }
    }

    /// Mock that answers every command with the same result code.
    pub(crate) async fn constant(ret: i64) -> Self {
        Self::spawn(move |_| Reply::code(ret)).await
    }

    pub(crate) fn config(&self) -> ScancardConfig {
        ScancardConfig {
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// `cmd` of every request received so far.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["cmd"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl Drop for MockScancard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve<F>(mut stream: TcpStream, log: Arc<Mutex<Vec<Value>>>, responder: Arc<Mutex<F>>)
where
    F: FnMut(&Value) -> Reply + Send + 'static,
{
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];

    // Read until the bytes form one JSON document; a probe connection closes first.
    let request = loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                received.extend_from_slice(&buf[..n]);
                if let Ok(value) = serde_json::from_slice::<Value>(&received) {
                    break value;
                }
            }
        }
    };

    let reply = (responder.lock().unwrap())(&request);
    log.lock().unwrap().push(request);

    match reply {
        Reply::Bytes(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.shutdown().await;
        }
        Reply::Silent => {
            // Hold the socket until the client gives up and closes it.
            let _ = stream.read(&mut buf).await;
        }
        Reply::Close => {}
    }
}
