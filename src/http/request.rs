use std::fmt;
use std::io::{self, BufRead, Read};

/// Request heads larger than this are refused.
pub const MAX_HEAD_LEN: usize = 8 * 1024;

/// Every method token HTTP/1.1 defines; anything else is a bad request.
pub const KNOWN_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version)
    }
}

#[derive(Debug)]
pub enum RequestError {
    /// The peer closed before sending anything.
    Closed,
    /// Malformed or oversized head.
    BadRequest(&'static str),
    Io(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Closed => write!(f, "connection closed"),
            RequestError::BadRequest(why) => write!(f, "bad request: {why}"),
            RequestError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        RequestError::Io(e)
    }
}

/// Read one request head (request line plus headers) from `r`.
///
/// Method tokens are not validated here; see [`KNOWN_METHODS`].
pub fn read_request<R: BufRead>(r: &mut R) -> Result<HttpRequest, RequestError> {
    let mut consumed = 0usize;
    let mut lines = Vec::new();

    loop {
        let mut raw = Vec::new();
        let room = (MAX_HEAD_LEN - consumed) as u64 + 1;
        let n = Read::take(&mut *r, room).read_until(b'\n', &mut raw)?;
        if n == 0 {
            if consumed == 0 {
                return Err(RequestError::Closed);
            }
            return Err(RequestError::BadRequest("truncated request head"));
        }
        consumed += n;
        if consumed > MAX_HEAD_LEN {
            return Err(RequestError::BadRequest("request head too large"));
        }

        let line = String::from_utf8(raw)
            .map_err(|_| RequestError::BadRequest("request head is not UTF-8"))?;
        let line = line.trim_end_matches(['\r', '\n']).to_owned();
        if line.is_empty() {
            if lines.is_empty() {
                // tolerate stray CRLF between pipelined requests
                continue;
            }
            break;
        }
        lines.push(line);
    }

    let mut iter = lines.into_iter();
    let first = iter.next().ok_or(RequestError::BadRequest("empty request"))?;
    let mut parts = first.split_whitespace();
    let method = parts.next().ok_or(RequestError::BadRequest("missing method"))?;
    let target = parts.next().ok_or(RequestError::BadRequest("missing target"))?;
    let version = parts.next().unwrap_or("HTTP/1.0");

    let mut headers = Vec::new();
    for line in iter {
        let (k, v) = line
            .split_once(':')
            .ok_or(RequestError::BadRequest("malformed header line"))?;
        headers.push((k.trim().to_owned(), v.trim().to_owned()));
    }

    Ok(HttpRequest {
        method: method.to_owned(),
        target: target.to_owned(),
        version: version.to_owned(),
        headers,
    })
}
