//! HTTP request model.
//!
//! # Responsibilities
//! - Hold a framed request: request line, headers, body
//! - Keep the exact bytes the message was parsed from
//! - Serialize back to wire format after headers are rewritten
//! - Expose cookie and form views of the request
//!
//! # Design Decisions
//! - Headers are an ordered list; inserting an existing name replaces the
//!   value in place (last write wins)
//! - Header names compare case-insensitively on lookup
//! - A message with no mutations serializes byte-identical to its source

use std::collections::HashMap;

/// Name of the header that frames the body.
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Ordered header map with last-write-wins semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header. An existing header with the same name (ignoring case)
    /// is replaced where it stands.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every header as `Name: value\r\n`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

/// A single HTTP request as read from (or written to) a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Headers,
    body: Vec<u8>,
    raw: Vec<u8>,
}

impl HttpMessage {
    /// Build a message programmatically. It has no raw source bytes.
    pub fn new(
        method: impl Into<String>,
        target: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: version.into(),
            headers: Headers::new(),
            body: Vec::new(),
            raw: Vec::new(),
        }
    }

    /// Used by the parser once a head is framed. `raw` holds the head bytes.
    pub(crate) fn from_head(
        method: String,
        target: String,
        version: String,
        headers: Headers,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            method,
            target,
            version,
            headers,
            body: Vec::new(),
            raw,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length announced by `Content-Length`, 0 when absent.
    pub fn content_length(&self) -> usize {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Complete a head-only message with its body bytes as read from the wire.
    pub(crate) fn attach_body(&mut self, body: Vec<u8>) {
        self.raw.extend_from_slice(&body);
        self.body = body;
    }

    /// Replace the body and keep `Content-Length` in step with it.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        if self.body.is_empty() && !self.headers.contains(CONTENT_LENGTH) {
            return;
        }
        self.headers
            .insert(CONTENT_LENGTH, self.body.len().to_string());
    }

    /// The exact bytes this message was parsed from. Empty for messages
    /// built with [`HttpMessage::new`].
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Serialize to wire format from the (possibly rewritten) fields.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.raw.len().max(128) + self.body.len());
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(b"\r\n");
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Cookies from the `Cookie` header. A missing header yields an empty map.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.headers
            .get("Cookie")
            .map(parse_cookies)
            .unwrap_or_default()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// Whether the client asked to switch to the WebSocket protocol.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get("Upgrade")
            .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    /// Later duplicates overwrite earlier ones.
    pub fn form_fields(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// A query-string parameter of the request target, if present.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = self.target.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Split a `Cookie` header value into `name=value` pairs.
///
/// Pairs are separated by `"; "` and split on the first `=`. Pairs without
/// an `=` are skipped.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split("; ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_last_write_wins_in_place() {
        let mut headers = Headers::new();
        headers.insert("Host", "a.example");
        headers.insert("Accept", "*/*");
        headers.insert("host", "b.example");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("HOST"), Some("b.example"));
        assert_eq!(headers.iter().next(), Some(("host", "b.example")));
    }

    #[test]
    fn serialize_builds_request_line_headers_and_body() {
        let mut msg = HttpMessage::new("POST", "/login", "HTTP/1.1");
        msg.headers.insert("Host", "localhost");
        msg.set_body("a=1");

        assert_eq!(
            msg.to_bytes(),
            b"POST /login HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3\r\n\r\na=1".to_vec()
        );
    }

    #[test]
    fn cookies_missing_header_is_empty() {
        let msg = HttpMessage::new("GET", "/", "HTTP/1.1");
        assert!(msg.cookies().is_empty());
    }

    #[test]
    fn cookies_split_on_first_equals() {
        let cookies = parse_cookies("totp_auth=MQ==.abc; theme=dark");
        assert_eq!(cookies.get("totp_auth").map(String::as_str), Some("MQ==.abc"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn websocket_upgrade_detection() {
        let mut msg = HttpMessage::new("GET", "/ws", "HTTP/1.1");
        assert!(!msg.is_websocket_upgrade());
        msg.headers.insert("Upgrade", "WebSocket");
        assert!(msg.is_websocket_upgrade());
    }

    #[test]
    fn form_fields_are_percent_decoded() {
        let mut msg = HttpMessage::new("POST", "/", "HTTP/1.1");
        msg.set_body("login=admin&csrf=MTIz%3AYWJj&note=a+b");
        let form = msg.form_fields();
        assert_eq!(form["login"], "admin");
        assert_eq!(form["csrf"], "MTIz:YWJj");
        assert_eq!(form["note"], "a b");
    }

    #[test]
    fn query_param_lookup() {
        let msg = HttpMessage::new("GET", "/?widget=password", "HTTP/1.1");
        assert_eq!(msg.query_param("widget").as_deref(), Some("password"));
        assert_eq!(msg.query_param("other"), None);
    }
}
