use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    pub fn is_error(self) -> bool {
        self != StatusCode::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// `false` sends `Connection: close` and ends the connection.
    pub keep_alive: bool,
}

impl HttpResponse {
    pub fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::Ok,
            content_type,
            body,
            keep_alive: true,
        }
    }

    pub fn status_line(&self) -> String {
        format!("HTTP/1.1 {} {}", self.status.code(), self.status.reason())
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        let head = format!(
            "{}\r\nContent-Type: {}\r\nConnection: {}\r\nContent-Length: {}\r\n\r\n",
            self.status_line(),
            self.content_type,
            connection,
            self.body.len()
        );
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        w.write_all(&out)?;
        w.flush()
    }
}

/// Built-in error page used when the root has no `error/<code>.html`.
pub fn default_error_page(status: StatusCode) -> Vec<u8> {
    format!(
        "<!DOCTYPE html><html lang=\"en-us\"><head><meta charset=\"UTF-8\">\
         <title>{code} {reason}</title></head><body><h1>{code} {reason}</h1></body></html>",
        code = status.code(),
        reason = status.reason()
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn serializes_head_and_body() {
        let resp = HttpResponse::ok("text/plain; charset=UTF-8", b"hey".to_vec());
        let mut out = Vec::new();
        resp.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=UTF-8\r\n\
             Connection: keep-alive\r\nContent-Length: 3\r\n\r\nhey"
        );
    }

    #[test]
    fn default_page_names_the_status() {
        let page = String::from_utf8(default_error_page(StatusCode::Forbidden)).unwrap();
        assert!(page.contains("<h1>403 Forbidden</h1>"));
    }
}
