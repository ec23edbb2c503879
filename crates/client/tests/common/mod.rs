//! Mock HTTP servers for upload tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// How the mock server answers a request.
pub enum Reply {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        /// Close the connection after writing.
        close: bool,
    },
    /// Close the connection without answering.
    Drop,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            close: false,
        }
    }

    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        if let Reply::Respond { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn body(mut self, data: &[u8]) -> Self {
        if let Reply::Respond { body, .. } = &mut self {
            *body = data.to_vec();
        }
        self
    }

    pub fn closing(mut self) -> Self {
        if let Reply::Respond { close, .. } = &mut self {
            *close = true;
        }
        self
    }
}

pub type Handler = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Starts a keep-alive HTTP/1.1 server answering with `handler`.
///
/// Returns the base URL and the log of every request fully received.
pub async fn serve(handler: Handler) -> (String, Arc<Mutex<Vec<Request>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}");
    let log = Arc::new(Mutex::new(Vec::new()));

    let requests = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);
                while let Some(req) = read_request(&mut reader).await {
                    requests.lock().unwrap().push(req.clone());
                    match handler(&req) {
                        Reply::Drop => return,
                        Reply::Respond {
                            status,
                            headers,
                            body,
                            close,
                        } => {
                            let raw = render(&req.method, status, &headers, &body);
                            if write.write_all(&raw).await.is_err() || close {
                                let _ = write.shutdown().await;
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (url, log)
}

fn render(method: &str, status: u16, headers: &[(String, String)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status} Mock\r\n");
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    let has_length = headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("content-length"));
    let bodiless = method == "HEAD" || status == 204 || status == 304;
    if !has_length && !bodiless {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");

    let mut raw = out.into_bytes();
    if method != "HEAD" {
        raw.extend_from_slice(body);
    }
    raw
}

async fn read_request<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Option<Request> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        if reader.read_line(&mut h).await.ok()? == 0 {
            return None;
        }
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.ok()?;

    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

/// Knobs for the mock TUS server.
#[derive(Clone)]
pub struct TusBehavior {
    /// `Tus-Extension` value; empty omits the header.
    pub extensions: &'static str,
    /// Number of `POST`s to drop before answering.
    pub drop_posts: usize,
    /// Offset reported for a fresh upload.
    pub initial_offset: u64,
    /// Overrides the `Upload-Offset` returned by `PATCH`.
    pub patch_offset: Option<u64>,
    /// Status returned by `PATCH`.
    pub patch_status: u16,
    /// Close the connection on every `PATCH` instead of answering.
    pub drop_patches: bool,
    /// Overrides the `Upload-Length` returned by `HEAD`.
    pub head_length: Option<u64>,
}

impl Default for TusBehavior {
    fn default() -> Self {
        Self {
            extensions: "creation,termination",
            drop_posts: 0,
            initial_offset: 0,
            patch_offset: None,
            patch_status: 204,
            drop_patches: false,
            head_length: None,
        }
    }
}

#[derive(Default)]
struct Upload {
    length: u64,
    offset: u64,
    data: Vec<u8>,
}

/// A minimal TUS server keeping uploads in memory.
pub struct TusServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
    uploads: Arc<Mutex<HashMap<String, Upload>>>,
}

impl TusServer {
    pub async fn start(behavior: TusBehavior) -> Self {
        let uploads: Arc<Mutex<HashMap<String, Upload>>> = Arc::new(Mutex::new(HashMap::new()));
        let state = Arc::clone(&uploads);
        let drops = Arc::new(Mutex::new(behavior.drop_posts));

        let handler: Handler = Arc::new(move |req: &Request| {
            let mut uploads = state.lock().unwrap();
            match req.method.as_str() {
                "OPTIONS" => {
                    let reply = Reply::status(204)
                        .header("Tus-Resumable", "1.0.0")
                        .header("Tus-Version", "1.0.0");
                    if behavior.extensions.is_empty() {
                        reply
                    } else {
                        reply.header("Tus-Extension", behavior.extensions)
                    }
                }
                "POST" => {
                    {
                        let mut drops = drops.lock().unwrap();
                        if *drops > 0 {
                            *drops -= 1;
                            return Reply::Drop;
                        }
                    }
                    let length = req
                        .header("upload-length")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let id = format!("u{}", uploads.len() + 1);
                    uploads.insert(
                        id.clone(),
                        Upload {
                            length,
                            offset: behavior.initial_offset,
                            data: Vec::new(),
                        },
                    );
                    Reply::status(201).header("Location", format!("/files/{id}"))
                }
                "HEAD" => match upload_id(&req.path).and_then(|id| uploads.get(id)) {
                    Some(upload) => Reply::status(200)
                        .header("Upload-Offset", upload.offset)
                        .header(
                            "Upload-Length",
                            behavior.head_length.unwrap_or(upload.length),
                        )
                        .header("Cache-Control", "no-store"),
                    None => Reply::status(404),
                },
                "PATCH" => {
                    if behavior.drop_patches {
                        return Reply::Drop;
                    }
                    let Some(upload) = upload_id(&req.path).and_then(|id| uploads.get_mut(id))
                    else {
                        return Reply::status(404);
                    };
                    if behavior.patch_status != 204 {
                        return Reply::status(behavior.patch_status);
                    }
                    let offset: Option<u64> =
                        req.header("upload-offset").and_then(|v| v.parse().ok());
                    if offset != Some(upload.offset) {
                        return Reply::status(409);
                    }
                    upload.data.extend_from_slice(&req.body);
                    upload.offset += req.body.len() as u64;
                    Reply::status(204).header(
                        "Upload-Offset",
                        behavior.patch_offset.unwrap_or(upload.offset),
                    )
                }
                _ => Reply::status(405),
            }
        });

        let (base, requests) = serve(handler).await;
        Self {
            url: format!("{base}/files/"),
            requests,
            uploads,
        }
    }

    /// Bytes received for upload `id` (e.g. `"u1"`).
    pub fn received(&self, id: &str) -> Option<Vec<u8>> {
        self.uploads.lock().unwrap().get(id).map(|u| u.data.clone())
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }

    pub fn requests_with(&self, method: &str) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

fn upload_id(path: &str) -> Option<&str> {
    path.strip_prefix("/files/").filter(|id| !id.is_empty())
}

/// Serves `data` as a downloadable resource at `/source.bin`.
///
/// With `truncate_at`, the `GET` body stops after that many bytes and the
/// connection is closed, while still announcing the full length.
pub async fn source_server(data: Vec<u8>, truncate_at: Option<usize>) -> String {
    let handler: Handler = Arc::new(move |req: &Request| match req.method.as_str() {
        "HEAD" => Reply::status(200).header("Content-Length", data.len()),
        "GET" => match truncate_at {
            Some(cut) => Reply::status(200)
                .header("Content-Length", data.len())
                .body(&data[..cut])
                .closing(),
            None => Reply::status(200).body(&data),
        },
        _ => Reply::status(405),
    });
    let (base, _) = serve(handler).await;
    format!("{base}/source.bin")
}

/// Serves a resource whose `HEAD` carries no `Content-Length`.
pub async fn unsized_source_server() -> String {
    let handler: Handler = Arc::new(|_req: &Request| {
        Reply::status(200).header("Transfer-Encoding", "chunked")
    });
    let (base, _) = serve(handler).await;
    format!("{base}/stream")
}
