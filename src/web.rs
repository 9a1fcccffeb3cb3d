//! Web form
//!
//! A single page with a term box and a "Map" button, plus a small JSON API.
//! Plain HTTP/1.1 over tokio, one task per connection, `Connection: close`.

use crate::mapping::{ConceptMapper, MappingResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

pub const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_HEAD_BYTES: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request timeout")]
    Timeout,

    #[error("Request too large")]
    TooLarge,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    fn response(&self) -> Option<HttpResponse> {
        let status = match self {
            RequestError::Timeout => 408,
            RequestError::TooLarge => 413,
            RequestError::Malformed(_) => 400,
            RequestError::Io(_) => return None,
        };
        Some(HttpResponse::error(status, &self.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
    service: &'a str,
    mapper: &'a str,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        let body = serde_json::to_string(body)
            .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(
            status,
            &ErrorResponse {
                error: message.to_string(),
            },
        )
    }

    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

/// Accept connections forever, one task each.
pub async fn serve(listener: TcpListener, mapper: Arc<dyn ConceptMapper>) -> std::io::Result<()> {
    loop {
        let (mut stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        let mapper = mapper.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&mut stream, mapper.as_ref()).await {
                error!("Error handling connection from {}: {}", addr, e);
            }
        });
    }
}

pub async fn handle_connection<S>(stream: &mut S, mapper: &dyn ConceptMapper) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match timeout(READ_TIMEOUT, read_request(stream)).await {
        Err(_) => RequestError::Timeout.response(),
        Ok(Ok(request)) => Some(handle_request(&request, mapper).await),
        Ok(Err(e)) => {
            warn!("Rejected request: {}", e);
            e.response()
        }
    };

    if let Some(response) = response {
        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;
    }
    Ok(())
}

/// Read the head, then exactly `Content-Length` body bytes.
pub async fn read_request<S>(stream: &mut S) -> Result<HttpRequest, RequestError>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 8192];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buffer) {
            break pos;
        }
        if buffer.len() > MAX_HEAD_BYTES {
            return Err(RequestError::TooLarge);
        }
        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            return Err(RequestError::Malformed("connection closed before end of headers".to_string()));
        }
        buffer.extend_from_slice(&temp_buf[..n]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let mut request = parse_head(&head)?;

    let content_length = match request.headers.get("content-length") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| RequestError::Malformed(format!("bad Content-Length: {}", v)))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(RequestError::TooLarge);
    }

    let mut body = buffer[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            return Err(RequestError::Malformed("body shorter than Content-Length".to_string()));
        }
        body.extend_from_slice(&temp_buf[..n]);
    }
    body.truncate(content_length);
    request.body = body;

    Ok(request)
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

pub fn parse_head(head: &str) -> Result<HttpRequest, RequestError> {
    let mut lines = head.lines();
    let request_line = lines
        .next()
        .ok_or_else(|| RequestError::Malformed("empty request".to_string()))?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(RequestError::Malformed("invalid request line".to_string()));
    }

    let (path, query) = match parts[1].split_once('?') {
        Some((p, q)) => (p, decode_form(q.as_bytes())),
        None => (parts[1], HashMap::new()),
    };
    let mut path = path.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    Ok(HttpRequest {
        method: parts[0].to_uppercase(),
        path,
        query,
        headers,
        body: Vec::new(),
    })
}

pub fn decode_form(input: &[u8]) -> HashMap<String, String> {
    form_urlencoded::parse(input).into_owned().collect()
}

pub async fn handle_request(request: &HttpRequest, mapper: &dyn ConceptMapper) -> HttpResponse {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => HttpResponse::html(200, render_page("", &PageResult::Empty)),
        ("GET", "/map") => {
            let term = request.query.get("term").cloned().unwrap_or_default();
            map_form(&term, mapper).await
        }
        ("POST", "/map") => {
            let form = decode_form(&request.body);
            let term = form.get("term").cloned().unwrap_or_default();
            map_form(&term, mapper).await
        }
        ("POST", "/api/map") => map_api(&request.body, mapper).await,
        ("GET", "/api/health") => HttpResponse::json(
            200,
            &HealthResponse {
                status: "ok",
                service: "omop-mapper",
                mapper: mapper.name(),
            },
        ),
        (_, "/") | (_, "/map") | (_, "/api/map") | (_, "/api/health") => {
            HttpResponse::error(405, &format!("Method not allowed: {} {}", request.method, request.path))
        }
        _ => HttpResponse::error(404, &format!("Not found: {} {}", request.method, request.path)),
    }
}

async fn map_form(term: &str, mapper: &dyn ConceptMapper) -> HttpResponse {
    let term = term.trim();
    if term.is_empty() {
        return HttpResponse::html(400, render_page("", &PageResult::Message("Please enter a clinical term.")));
    }

    match mapper.map_term(term).await {
        Ok(result) => HttpResponse::html(200, render_page(term, &PageResult::Mapping(&result))),
        Err(e) => {
            error!("Mapping '{}' failed: {}", term, e);
            HttpResponse::html(502, render_page(term, &PageResult::Failure(&e.to_string())))
        }
    }
}

async fn map_api(body: &[u8], mapper: &dyn ConceptMapper) -> HttpResponse {
    let term = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("term").and_then(|v| v.as_str()).map(|s| s.trim().to_string()))
        .unwrap_or_default();

    if term.is_empty() {
        return HttpResponse::error(400, "Term is required");
    }

    match mapper.map_term(&term).await {
        Ok(result) => HttpResponse::json(200, &result),
        Err(e) => {
            error!("Mapping '{}' failed: {}", term, e);
            HttpResponse::error(502, &e.to_string())
        }
    }
}

pub enum PageResult<'a> {
    Empty,
    Message(&'a str),
    Mapping(&'a MappingResult),
    Failure(&'a str),
}

pub fn render_page(term: &str, result: &PageResult<'_>) -> String {
    let section = match result {
        PageResult::Empty => String::new(),
        PageResult::Message(msg) => format!("<p class=\"info\">{}</p>", html_escape(msg)),
        PageResult::Mapping(mapping) => {
            let json = serde_json::to_string_pretty(mapping).unwrap_or_default();
            format!("<pre>{}</pre>", html_escape(&json))
        }
        PageResult::Failure(msg) => format!("<p class=\"error\">{}</p>", html_escape(msg)),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>OMOP Mapper Demo</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2rem auto; }}
pre {{ background: #f4f4f4; padding: 1rem; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>OMOP Mapper Demo</h1>
<form method="post" action="/map">
<label for="term">Enter a clinical term:</label>
<input id="term" name="term" type="text" value="{term}">
<button type="submit">Map</button>
</form>
{section}
</body>
</html>
"#,
        term = html_escape(term),
        section = section
    )
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MapperError, Result};
    use crate::mapping::MockMapper;
    use async_trait::async_trait;

    struct FailingMapper;

    #[async_trait]
    impl ConceptMapper for FailingMapper {
        async fn map_term(&self, _term: &str) -> Result<MappingResult> {
            Err(MapperError::Llm("model server unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn request(method: &str, path: &str, body: &str) -> HttpRequest {
        let mut req = parse_head(&format!("{} {} HTTP/1.1\r\nHost: localhost", method, path)).unwrap();
        req.body = body.as_bytes().to_vec();
        req
    }

    #[test]
    fn test_parse_head() {
        let req = parse_head("post /map/?term=Blood+Pressure HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 0").unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/map");
        assert_eq!(req.query.get("term").map(String::as_str), Some("Blood Pressure"));
        assert_eq!(req.headers.get("content-type").map(String::as_str), Some("text/plain"));

        assert!(matches!(parse_head("GARBAGE"), Err(RequestError::Malformed(_))));
    }

    #[test]
    fn test_decode_form() {
        let form = decode_form(b"term=Blood%20Pressure%20%26%20Pulse&x=1");
        assert_eq!(form.get("term").unwrap(), "Blood Pressure & Pulse");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"<b>"A&B"</b>"#), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[tokio::test]
    async fn test_index_page() {
        let resp = handle_request(&request("GET", "/", ""), &MockMapper).await;
        assert_eq!(resp.status, 200);
        assert!(resp.content_type.starts_with("text/html"));
        assert!(resp.body.contains("OMOP Mapper Demo"));
        assert!(resp.body.contains("Enter a clinical term:"));
        assert!(!resp.body.contains("<pre>"));
    }

    #[tokio::test]
    async fn test_form_post_renders_json() {
        let resp = handle_request(&request("POST", "/map", "term=Blood+Pressure"), &MockMapper).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("<pre>"));
        assert!(resp.body.contains("&quot;CONCEPT_ID&quot;: &quot;12345&quot;"));
        assert!(resp.body.contains("value=\"Blood Pressure\""));
    }

    #[tokio::test]
    async fn test_form_post_empty_term() {
        let resp = handle_request(&request("POST", "/map", "term=+"), &MockMapper).await;
        assert_eq!(resp.status, 400);
        assert!(resp.body.contains("Please enter a clinical term."));
    }

    #[tokio::test]
    async fn test_api_map() {
        let resp = handle_request(&request("POST", "/api/map", r#"{"term": "Heart Rate"}"#), &MockMapper).await;
        assert_eq!(resp.status, 200);
        let result: MappingResult = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(result.concept_id, "12345");
        assert!(result.reason.contains("Heart Rate"));

        let resp = handle_request(&request("POST", "/api/map", "{}"), &MockMapper).await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_mapping_failure_is_502() {
        let resp = handle_request(&request("POST", "/api/map", r#"{"term": "x"}"#), &FailingMapper).await;
        assert_eq!(resp.status, 502);
        assert!(resp.body.contains("model server unavailable"));

        let resp = handle_request(&request("POST", "/map", "term=x"), &FailingMapper).await;
        assert_eq!(resp.status, 502);
        assert!(resp.body.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_health_and_unknown_routes() {
        let resp = handle_request(&request("GET", "/api/health", ""), &MockMapper).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains(r#""mapper":"mock""#));

        let resp = handle_request(&request("GET", "/nope", ""), &MockMapper).await;
        assert_eq!(resp.status, 404);

        let resp = handle_request(&request("DELETE", "/map", ""), &MockMapper).await;
        assert_eq!(resp.status, 405);
    }

    #[tokio::test]
    async fn test_read_request_body_by_content_length() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client
            .write_all(b"POST /map HTTP/1.1\r\nContent-Length: 9\r\n\r\nterm=Feve")
            .await
            .unwrap();
        client.write_all(b"r").await.unwrap();

        let req = read_request(&mut server).await.unwrap();
        assert_eq!(req.path, "/map");
        assert_eq!(req.body, b"term=Feve");
    }

    #[tokio::test]
    async fn test_read_request_too_large() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let head = format!("POST /api/map HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1);
        client.write_all(head.as_bytes()).await.unwrap();
        assert!(matches!(read_request(&mut server).await, Err(RequestError::TooLarge)));
    }

    #[tokio::test]
    async fn test_get_map_with_query() {
        let resp = handle_request(&request("GET", "/map?term=Blood+Pressure", ""), &MockMapper).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("<pre>"));
        assert!(resp.body.contains("Mock mapping for &#39;Blood Pressure&#39;"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_request_times_out() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"POST /map HTTP/1.1\r\nHost: loc").await.unwrap();

        handle_connection(&mut server, &MockMapper).await.unwrap();
        drop(server);

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 408 Request Timeout"));
    }

    #[tokio::test]
    async fn test_serve_end_to_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(MockMapper)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let body = r#"{"term":"Blood Pressure"}"#;
        let req = format!(
            "POST /api/map HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            addr,
            body.len(),
            body
        );
        stream.write_all(req.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains(r#""CONCEPT_ID":"12345""#));
    }
}
