use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// Canned answer for one `q=` value.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubReply {
    Cover(&'static str),
    NoItems,
    Status(u16),
}

/// Local stand-in for the Google Books volumes endpoint.
pub struct BooksApiStub {
    pub base_url: String,
    queries: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BooksApiStub {
    /// Queries missing from `replies` get an empty result list.
    pub fn spawn(replies: HashMap<String, StubReply>) -> Self {
        Self::spawn_with_hook(replies, |_| {})
    }

    /// Like [`BooksApiStub::spawn`], but runs `on_query` before answering each query.
    pub fn spawn_with_hook(
        replies: HashMap<String, StubReply>,
        on_query: impl Fn(&str) + Send + 'static,
    ) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start books api stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/books/v1/volumes");

        let queries = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&queries);
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

                let Ok(url) = url::Url::parse(&format!("http://stub{}", request.url())) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("bad url").with_status_code(400),
                    );
                    continue;
                };
                if request.method() != &tiny_http::Method::Get || url.path() != "/books/v1/volumes"
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let Some(query) = url
                    .query_pairs()
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.into_owned())
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing q").with_status_code(400),
                    );
                    continue;
                };
                seen.lock().expect("lock stub queries").push(query.clone());
                on_query(&query);

                let (status, body) = match replies.get(&query).cloned().unwrap_or(StubReply::NoItems)
                {
                    StubReply::Cover(thumbnail) => (
                        200,
                        serde_json::json!({
                            "kind": "books#volumes",
                            "totalItems": 1,
                            "items": [
                                { "id": "stub", "volumeInfo": { "imageLinks": {
                                    "smallThumbnail": thumbnail,
                                    "thumbnail": thumbnail
                                } } }
                            ]
                        }),
                    ),
                    StubReply::NoItems => (
                        200,
                        serde_json::json!({ "kind": "books#volumes", "totalItems": 0 }),
                    ),
                    StubReply::Status(code) => (
                        code,
                        serde_json::json!({ "error": { "code": code, "message": "stub error" } }),
                    ),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            queries,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("lock stub queries").clone()
    }
}

impl Drop for BooksApiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
