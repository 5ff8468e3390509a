use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::http::request::{HttpRequest, KNOWN_METHODS};
use crate::http::response::{HttpResponse, StatusCode, default_error_page};
use crate::store::FileName;

const HTML: &str = "text/html; charset=UTF-8";

/// Top-level directories a request may read from, besides the index page.
const PUBLIC_DIRS: [&str; 2] = ["assets", "public"];

/// Where a request target points inside the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    /// Relative path under the root, every segment already validated.
    File(PathBuf),
    Forbidden,
}

/// Map a request target onto the served tree.
pub fn route(target: &str) -> Route {
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path == "/" || path == "/index.html" {
        return Route::Index;
    }

    let Some(rest) = path.strip_prefix('/') else {
        return Route::Forbidden;
    };
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let top = match segments.next() {
        Some(top) if PUBLIC_DIRS.contains(&top) => top,
        _ => return Route::Forbidden,
    };

    let mut rel = PathBuf::from(top);
    for seg in segments {
        // non-UTF-8 escapes cannot name a served file
        let Ok(decoded) = urlencoding::decode(seg) else {
            return Route::Forbidden;
        };
        if FileName::parse(&decoded).is_err() {
            return Route::Forbidden;
        }
        rel.push(decoded.as_ref());
    }
    Route::File(rel)
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => HTML,
        Some("css") => "text/css; charset=UTF-8",
        Some("js") => "application/javascript; charset=UTF-8",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("json") => "application/json; charset=UTF-8",
        Some("xml") => "application/xml; charset=UTF-8",
        Some("txt") => "text/plain; charset=UTF-8",
        _ => "application/octet-stream",
    }
}

/// Turns parsed requests into responses over one root directory.
#[derive(Debug, Clone)]
pub struct StaticResponder {
    root: PathBuf,
}

impl StaticResponder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn respond(&self, req: &HttpRequest) -> HttpResponse {
        if !KNOWN_METHODS.contains(&req.method.as_str()) {
            return self.close_with(StatusCode::BadRequest);
        }
        if req.method != "GET" {
            return self.close_with(StatusCode::MethodNotAllowed);
        }
        match route(&req.target) {
            Route::Index => self.serve(Path::new("index.html")),
            Route::File(rel) => self.serve(&rel),
            Route::Forbidden => self.error(StatusCode::Forbidden),
        }
    }

    /// Response for a head that could not be parsed; always closes.
    pub fn bad_request(&self) -> HttpResponse {
        self.close_with(StatusCode::BadRequest)
    }

    fn serve(&self, rel: &Path) -> HttpResponse {
        let path = self.root.join(rel);
        if !path.is_file() {
            return self.error(StatusCode::NotFound);
        }
        if !self.contains(&path) {
            return self.error(StatusCode::Forbidden);
        }
        match fs::read(&path) {
            Ok(body) => HttpResponse::ok(content_type_for(&path), body),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.error(StatusCode::NotFound),
            Err(_) => self.error(StatusCode::InternalServerError),
        }
    }

    /// Whether `path`, with every symlink resolved, still lies under the root.
    fn contains(&self, path: &Path) -> bool {
        match (fs::canonicalize(&self.root), fs::canonicalize(path)) {
            (Ok(root), Ok(path)) => path.starts_with(root),
            _ => false,
        }
    }

    pub fn error(&self, status: StatusCode) -> HttpResponse {
        let page = self.root.join("error").join(format!("{}.html", status.code()));
        let body = fs::read(page).unwrap_or_else(|_| default_error_page(status));
        HttpResponse {
            status,
            content_type: HTML,
            body,
            keep_alive: true,
        }
    }

    fn close_with(&self, status: StatusCode) -> HttpResponse {
        HttpResponse {
            keep_alive: false,
            ..self.error(status)
        }
    }
}
