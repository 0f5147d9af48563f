use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Served {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

/// Serves canned bodies by path and remembers the request headers it saw.
pub struct UpstreamStub {
    pub base_url: String,
    routes: Arc<Mutex<HashMap<String, Served>>>,
    seen: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl UpstreamStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start upstream stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let routes: Arc<Mutex<HashMap<String, Served>>> = Arc::default();
        let seen: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>> = Arc::default();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_routes = Arc::clone(&routes);
        let thread_seen = Arc::clone(&seen);
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

                let url = request.url().to_string();
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                    .collect();
                thread_seen.lock().unwrap().push((url.clone(), headers));

                let served = thread_routes.lock().unwrap().get(&url).cloned();
                let _ = match served {
                    Some(served) => {
                        let header = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            served.content_type.as_bytes(),
                        )
                        .expect("content-type header");
                        request.respond(
                            tiny_http::Response::from_string(served.body)
                                .with_status_code(served.status)
                                .with_header(header),
                        )
                    }
                    None => request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    ),
                };
            }
        });

        Self {
            base_url,
            routes,
            seen,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn serve(&self, path: &str, status: u16, content_type: &'static str, body: &str) {
        self.routes.lock().unwrap().insert(
            path.to_owned(),
            Served {
                status,
                content_type,
                body: body.to_owned(),
            },
        );
    }

    pub fn serve_csv(&self, path: &str, body: &str) {
        self.serve(path, 200, "text/csv", body);
    }

    pub fn serve_shell(&self) {
        for path in [
            "/",
            "/index.html",
            "/manifest.webmanifest",
            "/service-worker.js",
        ] {
            self.serve(path, 200, "text/plain", &format!("shell {path}"));
        }
        self.serve_csv("/data/shorts.csv", "id,title\nbundled,Bundled\n");
    }

    pub fn requests_for(&self, path: &str) -> Vec<Vec<(String, String)>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url == path)
            .map(|(_, headers)| headers.clone())
            .collect()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        self.stop();
    }
}
