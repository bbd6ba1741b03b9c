//! Hand-framed responses written by the gate itself.
//!
//! # Responsibilities
//! - Login page (`200 OK`, HTML body)
//! - Redirect after a successful login, carrying the session cookie
//!
//! # Design Decisions
//! - Every response closes the connection; the browser reconnects for the
//!   next request, which then goes through authentication again
//! - A failed login is a `200` with the form, not a `401`, so the browser
//!   stays on the page

use crate::http::message::Headers;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "totp_auth";

/// An HTTP/1.1 response ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// `200 OK` with an HTML document.
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        let mut response = Self::new(200, "OK");
        response
            .headers
            .insert("Content-Type", "text/html; charset=utf-8");
        response.body = body.into();
        response
    }

    /// `302 Found` to `/`, setting the session cookie.
    pub fn login_redirect(session_token: &str) -> Self {
        let mut response = Self::new(302, "Found");
        response.headers.insert("Location", "/");
        response.headers.insert(
            "Set-Cookie",
            format!("{SESSION_COOKIE}={session_token}; HttpOnly; Path=/"),
        );
        response
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).into_bytes();
        let mut headers = self.headers.clone();
        headers.insert("Content-Length", self.body.len().to_string());
        headers.insert("Connection", "close");
        headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_response_is_framed() {
        let bytes = Response::html("<p>hi</p>").to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn redirect_sets_http_only_cookie() {
        let text = String::from_utf8(Response::login_redirect("MQ==.sig").to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(text.contains("Location: /\r\n"));
        assert!(text.contains("Set-Cookie: totp_auth=MQ==.sig; HttpOnly; Path=/\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
    }
}
