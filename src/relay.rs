//! Getting the upstream's answer back to the caller.
//!
//! Three ways, one per [`RelayMode`](crate::translate::RelayMode):
//! pipe the SSE body through untouched, assemble it into one JSON reply, or
//! unwrap a non-streamed completion.

use crate::error::{ProxyError, Result};
use crate::translate::types::{AssembledReply, SingleShotReply};
use crate::translate::SseAssembler;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Logs when a pass-through stream is dropped before the upstream finished,
/// which is what happens when the caller hangs up. Dropping the stream also
/// drops the upstream response and aborts that fetch.
struct DisconnectGuard {
    request_id: Uuid,
    bytes: usize,
    completed: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(
                request_id = %self.request_id,
                bytes = self.bytes,
                "Client disconnected, upstream stream abandoned"
            );
        }
    }
}

/// Forward an upstream byte stream chunk by chunk.
pub fn passthrough_stream<S, E>(
    byte_stream: S,
    request_id: Uuid,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::stream! {
        let mut guard = DisconnectGuard {
            request_id,
            bytes: 0,
            completed: false,
        };

        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    guard.bytes += bytes.len();
                    yield Ok(bytes);
                }
                Err(e) => {
                    tracing::warn!(%request_id, error = %e, "Upstream stream broke off");
                    guard.completed = true;
                    yield Err(std::io::Error::other(e));
                    break;
                }
            }
        }

        if !guard.completed {
            guard.completed = true;
            tracing::info!(%request_id, bytes = guard.bytes, "Stream relayed");
        }
    }
}

/// Pass-through response: the upstream SSE body, unmodified.
pub fn passthrough(response: reqwest::Response, request_id: Uuid) -> Result<Response> {
    let stream = passthrough_stream(response.bytes_stream(), request_id);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| ProxyError::internal(format!("Failed to build stream response: {e}")))
}

/// Drain a streamed completion and return the concatenated delta text.
///
/// A transport error part-way through fails the whole assembly; no partial
/// answer is returned.
pub async fn assemble_stream<S, E>(byte_stream: S) -> Result<String>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut assembler = SseAssembler::new();

    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk
            .map_err(|e| ProxyError::internal(format!("Upstream stream failed: {e}")))?;
        assembler.push(&chunk);
    }

    tracing::debug!(
        events = assembler.events(),
        skipped = assembler.skipped(),
        done = assembler.saw_done(),
        "Stream assembled"
    );

    Ok(assembler.finish())
}

/// Assembled mode: stream in, one JSON reply out.
pub async fn assembled(
    response: reqwest::Response,
    model: &str,
    provider: &str,
) -> Result<AssembledReply> {
    let content = assemble_stream(response.bytes_stream()).await?;
    Ok(AssembledReply::success(model, content, provider))
}

/// Single-shot mode: a non-streamed completion, normalised.
pub async fn single_shot(response: reqwest::Response, model: &str) -> Result<SingleShotReply> {
    let body = response
        .bytes()
        .await
        .map_err(|e| ProxyError::internal(format!("Failed to read upstream body: {e}")))?;
    let raw: serde_json::Value = serde_json::from_slice(&body)?;
    Ok(SingleShotReply::from_raw(model, raw))
}

/// Bound a buffered relay by a whole-request deadline.
pub async fn with_deadline<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProxyError::Timeout(limit.as_secs()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static [u8]]) -> Vec<std::result::Result<Bytes, String>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect()
    }

    #[test]
    fn test_assemble_stream_joins_deltas() {
        let body = chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\nda",
            b"ta: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ]);
        let text = tokio_test::block_on(assemble_stream(stream::iter(body))).unwrap();
        assert_eq!(text, "Hi there");
    }

    #[test]
    fn test_assemble_stream_fails_on_transport_error() {
        let mut body = chunks(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n"]);
        body.push(Err("connection reset".to_string()));

        let err = tokio_test::block_on(assemble_stream(stream::iter(body))).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_passthrough_ends_after_upstream_error() {
        let body: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[]}\n\n")),
            Ok(Bytes::from_static(b"data: {\"cho")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"never relayed")),
        ];

        let items: Vec<_> = tokio_test::block_on(
            passthrough_stream(stream::iter(body), Uuid::new_v4()).collect(),
        );
        assert_eq!(items.len(), 3);
        assert_eq!(&items[0].as_ref().unwrap()[..], b"data: {\"choices\":[]}\n\n");
        assert_eq!(&items[1].as_ref().unwrap()[..], b"data: {\"cho");
        let err = items[2].as_ref().unwrap_err();
        assert!(err.to_string().contains("reset"));
    }

    #[test]
    fn test_assemble_empty_stream() {
        let text = tokio_test::block_on(assemble_stream(stream::iter(chunks(&[])))).unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout() {
        let err = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
