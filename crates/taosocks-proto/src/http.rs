//! HTTP/1.1 header-block parsing.
//!
//! Only the head is parsed: start line plus headers up to the blank line.
//! Bodies are never touched, the caller forwards them as raw bytes.

use crate::ParseResult;
use crate::error::ParseError;

pub const CRLF: &str = "\r\n";
const HTTP_HEADER_END: &[u8] = b"\r\n\r\n";

/// Parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    /// Bytes consumed by the head, including the terminating blank line.
    pub header_len: usize,
}

/// Parsed response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub header_len: usize,
}

impl RequestHead {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

impl ResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Offset just past `\r\n\r\n`, if the head is complete.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HTTP_HEADER_END.len())
        .position(|w| w == HTTP_HEADER_END)
        .map(|idx| idx + HTTP_HEADER_END.len())
}

/// Parse a request head such as `CONNECT host:443 HTTP/1.1`.
pub fn parse_request_head(buf: &[u8], max_len: usize) -> ParseResult<RequestHead> {
    let (start, headers, header_len) = match split_head(buf, max_len) {
        ParseResult::Complete(v) => v,
        ParseResult::Incomplete(n) => return ParseResult::Incomplete(n),
        ParseResult::Invalid(e) => return ParseResult::Invalid(e),
    };
    let mut parts = start.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return ParseResult::Invalid(ParseError::InvalidStartLine);
    };
    if !version.starts_with("HTTP/") {
        return ParseResult::Invalid(ParseError::InvalidStartLine);
    }
    ParseResult::Complete(RequestHead {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        header_len,
    })
}

/// Parse a response head such as `HTTP/1.1 101 Switching Protocols`.
pub fn parse_response_head(buf: &[u8], max_len: usize) -> ParseResult<ResponseHead> {
    let (start, headers, header_len) = match split_head(buf, max_len) {
        ParseResult::Complete(v) => v,
        ParseResult::Incomplete(n) => return ParseResult::Incomplete(n),
        ParseResult::Invalid(e) => return ParseResult::Invalid(e),
    };
    let mut parts = start.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return ParseResult::Invalid(ParseError::InvalidStartLine);
    }
    let code = parts.next().unwrap_or("");
    if code.len() != 3 {
        return ParseResult::Invalid(ParseError::InvalidStatus);
    }
    let Ok(status) = code.parse::<u16>() else {
        return ParseResult::Invalid(ParseError::InvalidStatus);
    };
    ParseResult::Complete(ResponseHead {
        version: version.to_string(),
        status,
        reason: parts.next().unwrap_or("").trim().to_string(),
        headers,
        header_len,
    })
}

type SplitHead<'a> = (&'a str, Vec<(String, String)>, usize);

fn split_head(buf: &[u8], max_len: usize) -> ParseResult<SplitHead<'_>> {
    let Some(header_len) = find_header_end(buf) else {
        if buf.len() >= max_len {
            return ParseResult::Invalid(ParseError::HeaderTooLarge);
        }
        return ParseResult::Incomplete(buf.len() + 1);
    };
    if header_len > max_len {
        return ParseResult::Invalid(ParseError::HeaderTooLarge);
    }
    let Ok(text) = std::str::from_utf8(&buf[..header_len - HTTP_HEADER_END.len()]) else {
        return ParseResult::Invalid(ParseError::InvalidUtf8);
    };
    let mut lines = text.split(CRLF);
    let start = lines.next().unwrap_or("");
    if start.is_empty() {
        return ParseResult::Invalid(ParseError::InvalidStartLine);
    }
    let mut headers = Vec::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return ParseResult::Invalid(ParseError::InvalidHeader);
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    ParseResult::Complete((start, headers, header_len))
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
