use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Minimal TOC backend: `GET /api/toc/{collection}[/{locale}]`.
pub struct TocStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubBody {
    Json(String),
    Status(u16),
}

impl TocStub {
    pub fn spawn(routes: HashMap<String, StubBody>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start toc stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/api");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                seen.lock().expect("requests lock").push(path.clone());

                if request.method() != &tiny_http::Method::Get {
                    let _ = request.respond(
                        tiny_http::Response::from_string("method not allowed")
                            .with_status_code(405),
                    );
                    continue;
                }

                match routes.get(&path) {
                    Some(StubBody::Json(body)) => {
                        let header = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .expect("build header");
                        let _ = request.respond(
                            tiny_http::Response::from_string(body.clone())
                                .with_status_code(200)
                                .with_header(header),
                        );
                    }
                    Some(StubBody::Status(code)) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("stub error")
                                .with_status_code(*code),
                        );
                    }
                    None => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("not found").with_status_code(404),
                        );
                    }
                }
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for TocStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn collection_one() -> String {
    serde_json::json!({
        "text": "Coll",
        "children": [
            { "itemId": "1_1", "text": "One" },
            { "itemId": "1_2", "text": "Two", "date": "1900-01-01" },
        ],
    })
    .to_string()
}
