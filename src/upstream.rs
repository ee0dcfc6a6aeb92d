//! The single outbound call to the inference API.

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::headers;
use crate::translate::types::UpstreamPayload;
use crate::user_agent::UserAgentSource;

use reqwest::header::{HeaderValue, ACCEPT};

/// Build the shared HTTP client. Connect and per-read timeouts only; a total
/// timeout would cut off long pass-through streams.
pub fn build_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .build()
        .map_err(|e| ProxyError::config(format!("Failed to build HTTP client: {e}")))
}

/// POSTs payloads to the upstream dressed as a browser session.
#[derive(Clone)]
pub struct UpstreamInvoker {
    client: reqwest::Client,
    url: String,
}

impl UpstreamInvoker {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `payload` with a fresh spoofed identity from `user_agents`.
    ///
    /// A 2xx response is returned with its body unread. Any other status is read
    /// in full and returned as [`ProxyError::UpstreamStatus`]; transport failures
    /// become [`ProxyError::Network`].
    pub async fn invoke(
        &self,
        payload: &UpstreamPayload,
        user_agents: &dyn UserAgentSource,
    ) -> Result<reqwest::Response> {
        let user_agent = user_agents.next();
        let mut headers = headers::compose(&user_agent)
            .ok_or_else(|| ProxyError::internal("User-Agent is not a valid header value"))?;
        if !payload.stream {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        tracing::debug!(
            url = %self.url,
            model = %payload.model,
            stream = payload.stream,
            messages = payload.messages.len(),
            "POST upstream"
        );

        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProxyError::Network(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::warn!(
                    status = status.as_u16(),
                    error = %e,
                    "Could not read upstream error body"
                );
                String::new()
            });
            tracing::warn!(
                status = status.as_u16(),
                body = %truncate(&body, 300),
                "Upstream error"
            );
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::types::{ChatMessage, Role};
    use crate::user_agent::UserAgentPool;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with a 500 whose body stops short of its
    /// `Content-Length`, then hangs up.
    async fn truncated_error_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 64\r\n\r\nshort")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/v1/openai/chat/completions")
    }

    #[tokio::test]
    async fn test_unreadable_error_body_keeps_status() {
        let url = truncated_error_upstream().await;
        let invoker = UpstreamInvoker::new(build_client(&UpstreamConfig::default()).unwrap(), url);
        let payload = UpstreamPayload {
            model: "m".to_string(),
            messages: vec![ChatMessage::new(Role::User, "hi").into()],
            stream: false,
            stream_options: None,
        };

        let err = invoker
            .invoke(&payload, &UserAgentPool::builtin())
            .await
            .unwrap_err();
        match err {
            ProxyError::UpstreamStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "");
            }
            other => panic!("expected upstream status, got {other:?}"),
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate("héllo", 2), "h");
    }
}
