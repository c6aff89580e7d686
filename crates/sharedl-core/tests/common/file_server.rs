//! Small HTTP/1.1 server for integration tests.
//!
//! Serves one static body at every path. HEAD answers with the length and
//! `Accept-Ranges`; GET honours `Range: bytes=a-b` with 206 when ranges are
//! enabled. One request per connection.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// HEAD returns 405 when false.
    pub head_allowed: bool,
    /// GET ignores `Range` and returns the whole body when false.
    pub ranges: bool,
    /// Every request is answered with 404.
    pub not_found: bool,
    /// Pause between 16 KiB chunks of a GET body.
    pub chunk_delay: Option<Duration>,
    /// Sent as `Content-Disposition` on HEAD and GET.
    pub content_disposition: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            ranges: true,
            not_found: false,
            chunk_delay: None,
            content_disposition: None,
        }
    }
}

/// Handle to a running server. The listener thread lives until the process exits.
#[derive(Debug, Clone)]
pub struct FileServer {
    pub url: String,
    ranged_gets: Arc<AtomicUsize>,
}

impl FileServer {
    /// Number of GET requests answered with 206.
    pub fn ranged_gets(&self) -> usize {
        self.ranged_gets.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> FileServer {
    start_with(body, ServerOptions::default())
}

pub fn start_with(body: Vec<u8>, opts: ServerOptions) -> FileServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let ranged_gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ranged_gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &body, &opts, &counter));
        }
    });
    FileServer {
        url: format!("http://127.0.0.1:{}/files/sample.bin", port),
        ranged_gets,
    }
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0u8..=250).cycle().take(len).collect()
}

fn handle(mut stream: TcpStream, body: &[u8], opts: &ServerOptions, ranged_gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);

    if opts.not_found {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let total = body.len() as u64;
    let mut extra = String::new();
    if opts.ranges {
        extra.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(cd) = &opts.content_disposition {
        extra.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n", total, extra);
        let _ = stream.write_all(head.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let (status, slice) = match range.filter(|_| opts.ranges) {
        Some((start, end_incl)) if start < total => {
            let end_excl = end_incl.saturating_add(1).min(total);
            extra.push_str(&format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                start,
                end_excl - 1,
                total
            ));
            ranged_gets.fetch_add(1, Ordering::SeqCst);
            ("206 Partial Content", &body[start as usize..end_excl as usize])
        }
        Some(_) => {
            let resp = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n\r\n",
                total
            );
            let _ = stream.write_all(resp.as_bytes());
            return;
        }
        None => ("200 OK", body),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}\r\n",
        status,
        slice.len(),
        extra
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match opts.chunk_delay {
        None => {
            let _ = stream.write_all(slice);
        }
        Some(delay) => {
            for chunk in slice.chunks(16 * 1024) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
    }
}

/// Method and optional inclusive byte range of a request.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let Some(bounds) = value.trim().strip_prefix("bytes=") else {
            continue;
        };
        if let Some((a, b)) = bounds.split_once('-') {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = b.trim();
            let end_incl = if end.is_empty() {
                u64::MAX
            } else {
                end.parse::<u64>().unwrap_or(0)
            };
            range = Some((start, end_incl));
        }
    }
    (method, range)
}
