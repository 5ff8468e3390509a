//! Minimal static-file HTTP/1.1 responder.
//!
//! Serves `index.html` and files under `assets/` and `public/` from a root
//! directory, one thread per connection, keep-alive until the peer closes.

pub mod request;
pub mod responder;
pub mod response;
pub mod server;

pub use request::{HttpRequest, RequestError, read_request};
pub use responder::{Route, StaticResponder, content_type_for, route};
pub use response::{HttpResponse, StatusCode};
pub use server::HttpServer;
