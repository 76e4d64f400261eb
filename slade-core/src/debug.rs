//! Wire-level debug rendering.
//!
//! When a client runs in debug mode every authenticated request is logged as
//! an equivalent `curl` invocation. Credential headers are redacted.

use reqwest::Method;
use reqwest::header::HeaderMap;

/// Headers whose values are never rendered.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

const REDACTED: &str = "[REDACTED]";

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render a request as a `curl` command line.
pub fn curl_command(method: &Method, url: &str, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), "-X".to_string(), method.to_string()];

    for (name, value) in headers {
        let rendered = if is_sensitive(name.as_str()) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{}: {}", name, rendered)));
    }

    if let Some(body) = body.filter(|b| !b.is_empty()) {
        parts.push("-d".to_string());
        parts.push(shell_quote(&String::from_utf8_lossy(body)));
    }

    parts.push(shell_quote(url));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

    #[test]
    fn test_curl_command_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer GJJGFDGJJGFGJHHJF"));
        headers.insert("x-workstation", HeaderValue::from_static("4d2f3b"));

        let command = curl_command(
            &Method::POST,
            "https://api.healthcloud.co.ke/v1/items/",
            &headers,
            Some(br#"{"name":"it's"}"#),
        );

        assert!(!command.contains("GJJGFDGJJGFGJHHJF"));
        assert!(command.contains("'authorization: [REDACTED]'"));
        assert!(command.contains("'x-workstation: 4d2f3b'"));
        assert!(command.contains(r#"-d '{"name":"it'\''s"}'"#));
        assert!(command.starts_with("curl -X POST "));
        assert!(command.ends_with("'https://api.healthcloud.co.ke/v1/items/'"));
    }

    #[test]
    fn test_curl_command_without_body() {
        let command = curl_command(&Method::GET, "http://127.0.0.1/", &HeaderMap::new(), None);
        assert_eq!(command, "curl -X GET 'http://127.0.0.1/'");
    }
}
