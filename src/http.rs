use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Fixed Accept header sent with every request
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
/// Fixed Accept-Language header sent with every request
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
/// Fixed User-Agent header sent with every request
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/119.0";
/// Fixed Accept-Encoding header sent with every request
pub const ACCEPT_ENCODING: &str = "gzip, deflate";

/// Read chunk size for request aggregation
const READ_CHUNK: usize = 4096;

/// Sanity ceiling on a response body allocation; the declared length is
/// peer-controlled and must be bounded before the buffer is sized
const MAX_RESPONSE_BYTES: usize = 1 << 30;

/// Connection-level fault classes
///
/// The server cares about the distinctions: idle expiry is a clean close,
/// peer resets stay out of the error log, everything else is a fault.
#[derive(Debug, Error)]
pub enum HttpError {
    /// No bytes arrived within the idle window
    #[error("no bytes read for {0:?}")]
    IdleTimeout(Duration),

    /// Aggregated request or declared response exceeded its size ceiling
    #[error("message of {size} bytes exceeds the {limit}-byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// Request line or header block could not be parsed
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Stream ended in the middle of a message
    #[error("connection closed mid-message")]
    Truncated,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// Ordinary peer-initiated teardown rather than a fault
    pub fn is_peer_reset(&self) -> bool {
        matches!(
            self,
            HttpError::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            )
        )
    }
}

/// One fully-aggregated request
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub target: String,
    /// Header map with lowercased names
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Whether the peer advertises gzip support, by case-insensitive
    /// substring match on Accept-Encoding
    pub fn accepts_gzip(&self) -> bool {
        self.headers
            .get("accept-encoding")
            .map(|value| value.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false)
    }
}

/// One complete response as seen by a connection driver
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    /// Header map with lowercased names
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers.get("content-encoding").map(String::as_str)
    }
}

/// Encode the fixed GET request sent by every driver
pub fn encode_get_request(host: &str) -> Vec<u8> {
    format!(
        "GET / HTTP/1.1\r\n\
         host: {host}\r\n\
         accept: {ACCEPT}\r\n\
         accept-language: {ACCEPT_LANGUAGE}\r\n\
         user-agent: {USER_AGENT}\r\n\
         accept-encoding: {ACCEPT_ENCODING}\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Encode a 200 response around `body`
///
/// Content-Length is the exact byte length written; Content-Encoding is
/// present only when `gzip` is set.
pub fn encode_response(body: &[u8], content_type: &str, gzip: bool) -> Vec<u8> {
    let mut response = Vec::with_capacity(body.len() + 128);
    response.extend_from_slice(b"HTTP/1.1 200 OK\r\n");
    response.extend_from_slice(format!("content-type: {content_type}\r\n").as_bytes());
    response.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
    if gzip {
        response.extend_from_slice(b"content-encoding: gzip\r\n");
    }
    response.extend_from_slice(b"\r\n");
    response.extend_from_slice(body);
    response
}

/// Read one complete request, applying `idle` to every read so any inbound
/// bytes re-arm the timer
///
/// Returns `Ok(None)` on a clean close at a request boundary. Bytes beyond
/// the first complete request stay in `buf` for the next call, which is what
/// keeps pipelined requests intact.
pub async fn read_request<R>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    idle: Duration,
    max_request_bytes: usize,
) -> Result<Option<Request>, HttpError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(head_end) = find_header_end(buf) {
            let request = parse_head(&buf[..head_end])?;
            let content_length = content_length_of(&request.headers)?;

            // The declared length is peer-controlled; the total must not
            // wrap past the ceiling check
            let head_len = head_end + 4;
            let total = match head_len.checked_add(content_length) {
                Some(total) if total <= max_request_bytes => total,
                _ => {
                    return Err(HttpError::MessageTooLarge {
                        size: head_len.saturating_add(content_length),
                        limit: max_request_bytes,
                    })
                }
            };
            while buf.len() < total {
                if read_some(stream, buf, idle).await? == 0 {
                    return Err(HttpError::Truncated);
                }
            }

            buf.drain(..total);
            return Ok(Some(request));
        }

        if buf.len() > max_request_bytes {
            return Err(HttpError::MessageTooLarge {
                size: buf.len(),
                limit: max_request_bytes,
            });
        }
        if read_some(stream, buf, idle).await? == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(HttpError::Truncated)
            };
        }
    }
}

/// Read one complete response, delimited by Content-Length
///
/// Returns `Ok(None)` if the stream closes cleanly before a status line.
/// A declared length past the sanity ceiling is rejected before anything is
/// allocated. There is deliberately no timeout here: a driver waiting on a
/// silent server just stalls.
pub async fn read_response<R>(reader: &mut R) -> Result<Option<Response>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let status = parse_status_line(line.trim_end())?;

    let mut headers = HashMap::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(HttpError::Truncated);
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| HttpError::Malformed(format!("bad header line: {trimmed}")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = content_length_of(&headers)?;
    if content_length > MAX_RESPONSE_BYTES {
        return Err(HttpError::MessageTooLarge {
            size: content_length,
            limit: MAX_RESPONSE_BYTES,
        });
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    Ok(Some(Response {
        status,
        headers,
        body,
    }))
}

/// One timeout-bounded read appended to `buf`
async fn read_some<R>(stream: &mut R, buf: &mut Vec<u8>, idle: Duration) -> Result<usize, HttpError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let n = match timeout(idle, stream.read(&mut chunk)).await {
        Ok(result) => result?,
        Err(_) => return Err(HttpError::IdleTimeout(idle)),
    };
    buf.extend_from_slice(&chunk[..n]);
    Ok(n)
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_head(head: &[u8]) -> Result<Request, HttpError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| HttpError::Malformed("head is not valid UTF-8".to_string()))?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| HttpError::Malformed("empty request line".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| HttpError::Malformed(format!("missing request target: {request_line}")))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::Malformed(format!("bad header line: {line}")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        headers,
    })
}

fn parse_status_line(line: &str) -> Result<u16, HttpError> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed(format!("bad status line: {line}")));
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| HttpError::Malformed(format!("bad status line: {line}")))
}

fn content_length_of(headers: &HashMap<String, String>) -> Result<usize, HttpError> {
    match headers.get("content-length") {
        Some(value) => value
            .parse()
            .map_err(|_| HttpError::Malformed(format!("invalid content-length: {value}"))),
        None => Ok(0),
    }
}
