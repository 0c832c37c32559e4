// ── Raw response parsing ──
//
// Splits raw HTTP text into head and body, exposes headers, pulls the
// session cookie, and decodes JSON bodies with substring recovery for
// routers that wrap their payload in stray bytes.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// A parsed raw HTTP response. Never fails to construct.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Status code from the status line, when one could be read.
    pub status: Option<u16>,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn parse(raw: &str) -> Self {
        let Some((head, body)) = split_head_body(raw) else {
            return Self {
                status: None,
                headers: Vec::new(),
                body: raw.to_owned(),
            };
        };

        let mut lines = head.lines();
        let status = lines
            .next()
            .filter(|line| line.starts_with("HTTP/"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok());

        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
            .collect();

        let mut response = Self {
            status,
            headers,
            body: body.to_owned(),
        };

        if response
            .header("transfer-encoding")
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
        {
            match dechunk(&response.body) {
                Some(decoded) => response.body = decoded,
                None => debug!("chunked body did not decode, keeping raw body"),
            }
        }

        response
    }

    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Session token from `Set-Cookie`, cut at the first `;`.
    pub fn session_cookie(&self) -> Option<String> {
        let value = self.header("set-cookie")?;
        let token = value.split(';').next().unwrap_or_default().trim();
        (!token.is_empty()).then(|| token.to_owned())
    }

    /// Decode the body as JSON, see [`decode_json`].
    pub fn json(&self) -> Result<Value, Error> {
        decode_json(&self.body)
    }
}

/// Body of a raw response, or the whole text if no header boundary exists.
pub fn extract_body(raw: &str) -> &str {
    split_head_body(raw).map_or(raw, |(_, body)| body)
}

/// Split at the first blank line. Accepts `\n\n`, `\r\n\r\n`, and mixes.
fn split_head_body(raw: &str) -> Option<(&str, &str)> {
    let bytes = raw.as_bytes();
    let (head_end, body_start) = bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'\n')
        .find_map(|(i, _)| match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(b'\n'), _) => Some((i, i + 2)),
            (Some(b'\r'), Some(b'\n')) => Some((i, i + 3)),
            _ => None,
        })?;

    let head = raw.get(..head_end)?.trim_end_matches('\r');
    let body = raw.get(body_start..)?;
    Some((head, body))
}

/// Parse the body as JSON; on failure retry on the first-`{` to last-`}` span.
pub fn decode_json(body: &str) -> Result<Value, Error> {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if let Some(span) = trimmed.get(start..=end) {
            if let Ok(value) = serde_json::from_str(span) {
                debug!(skipped = trimmed.len() - span.len(), "recovered embedded JSON object");
                return Ok(value);
            }
        }
    }

    Err(Error::malformed(
        "body is not JSON and carries no embedded JSON object",
        body,
    ))
}

/// Decode a `Transfer-Encoding: chunked` body. `None` if the framing is broken.
fn dechunk(body: &str) -> Option<String> {
    let mut rest = body.as_bytes();
    let mut out = Vec::with_capacity(rest.len());

    loop {
        let line_end = rest.iter().position(|&b| b == b'\n')?;
        let size_line = std::str::from_utf8(rest.get(..line_end)?).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        rest = rest.get(line_end + 1..)?;

        if size == 0 {
            break;
        }

        out.extend_from_slice(rest.get(..size)?);
        rest = rest.get(size..)?;
        rest = rest.strip_prefix(b"\r\n").or_else(|| rest.strip_prefix(b"\n")).unwrap_or(rest);
    }

    Some(String::from_utf8_lossy(&out).into_owned())
}
