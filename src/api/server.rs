//! Newline-delimited JSON server
//!
//! One thread per connection; each request line is handled independently and
//! answered with a single response line. A trace request carries the subject
//! source in `code`; the response is either the full trace result or a
//! single-field `{"error": ...}` object. Failures of the traced program are
//! ordinary error responses; only transport-level I/O tears the connection
//! down.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::TraceError;

/// One request line
#[derive(Debug, Deserialize)]
struct TraceRequest {
    /// Subject source to trace
    code: Option<String>,
    /// Optional command; `PING` answers a health check
    command: Option<String>,
}

/// Bind and serve forever
pub fn start_server(port: u16) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!(%address, "trace server listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream) {
                        tracing::warn!(error = %e, "connection error");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "accept error"),
        }
    }

    Ok(())
}

fn handle_connection(mut stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = process_request(trimmed);
        stream.write_all(serde_json::to_string(&response)?.as_bytes())?;
        stream.write_all(b"\n")?;
    }

    Ok(())
}

/// Decode one request and produce the wire-contract response object
fn process_request(raw: &str) -> serde_json::Value {
    let request: TraceRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => return json!({ "error": format!("invalid request: {}", e) }),
    };

    if request.command.as_deref() == Some("PING") {
        return json!("PONG");
    }

    let Some(code) = request.code else {
        return json!({ "error": "missing 'code' field" });
    };

    match crate::trace(&code) {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(e) => json!({ "error": format!("failed to encode result: {}", e) }),
        },
        Err(e @ TraceError::Parse(_)) | Err(e @ TraceError::Runtime(_)) => {
            json!({ "error": e.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_answers_pong() {
        let response = process_request(r#"{"command": "PING"}"#);
        assert_eq!(response, json!("PONG"));
    }

    #[test]
    fn trace_request_returns_frames_and_complexity() {
        let response = process_request(r#"{"code": "x = 1\n"}"#);
        assert!(response.get("frames").is_some());
        assert_eq!(response["complexity"], json!("O(1)"));
    }

    #[test]
    fn bad_subject_source_is_an_error_object() {
        let response = process_request(r#"{"code": "def f(:\n"}"#);
        assert!(response.get("error").is_some());
        assert!(response.get("frames").is_none());
    }

    #[test]
    fn malformed_request_json_is_an_error_object() {
        let response = process_request("{not json");
        assert!(response.get("error").is_some());
    }

    #[test]
    fn missing_code_field_is_an_error_object() {
        let response = process_request("{}");
        assert_eq!(response, json!({ "error": "missing 'code' field" }));
    }
}
