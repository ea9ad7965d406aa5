//! Stream transport for the answer service.
//!
//! Opens the streaming chat endpoint and exposes the response body as a
//! pull-based stream of decoded text fragments. Fragments arrive strictly in
//! network order; dropping the stream releases the connection and cancels
//! the read, on the error path and on normal completion alike.

mod decode;
mod errors;

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;

pub use decode::Utf8Decoder;
pub use errors::{TransportError, TransportErrorKind, TransportResult};

use crate::session::generate_trace_id;

/// Request payload for the streaming answer endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Client for the answer service's streaming chat endpoint.
pub struct AnswerClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnswerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Opens the answer stream for one question.
    ///
    /// The returned stream is lazy, finite and non-restartable. Errors
    /// before the first fragment surface here; errors while iterating
    /// surface as stream items.
    pub async fn ask_stream(&self, request: &AskRequest) -> TransportResult<FragmentStream> {
        let url = format!("{}/ai/chat", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("X-Trace-ID", generate_trace_id())
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::connection(&e))?;

        let status = response.status();
        if !status.is_success() {
            // Best-effort diagnostic: the body usually carries the reason
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &body));
        }

        if response.content_length() == Some(0) {
            return Err(TransportError::empty_body());
        }

        let bytes = response
            .bytes_stream()
            .map(|item| item.map_err(|e| TransportError::read(e)));
        Ok(FragmentStream::new(bytes))
    }
}

/// Pull-based stream of decoded text fragments.
///
/// The concatenation of all yielded fragments equals the full response
/// text. A response that opened successfully but carried no bytes yields a
/// single `EmptyBody` error.
pub struct FragmentStream {
    inner: Pin<Box<dyn Stream<Item = TransportResult<Bytes>> + Send>>,
    decoder: Utf8Decoder,
    saw_bytes: bool,
    done: bool,
}

impl FragmentStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = TransportResult<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            decoder: Utf8Decoder::new(),
            saw_bytes: false,
            done: false,
        }
    }
}

impl Stream for FragmentStream {
    type Item = TransportResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if !chunk.is_empty() {
                        self.saw_bytes = true;
                    }
                    let text = self.decoder.decode(&chunk);
                    if text.is_empty() {
                        // Chunk ended mid-character; keep polling
                        continue;
                    }
                    return Poll::Ready(Some(Ok(text)));
                }
                Poll::Ready(Some(Err(e))) => {
                    // Fragments already delivered stay valid; the stream ends here
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    let tail = self.decoder.flush();
                    if !tail.is_empty() {
                        return Poll::Ready(Some(Ok(tail)));
                    }
                    if !self.saw_bytes {
                        return Poll::Ready(Some(Err(TransportError::empty_body())));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    fn chunks(parts: &[&[u8]]) -> Vec<TransportResult<Bytes>> {
        parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect()
    }

    async fn drain(mut s: FragmentStream) -> (Vec<String>, Option<TransportError>) {
        let mut fragments = Vec::new();
        while let Some(item) = s.next().await {
            match item {
                Ok(text) => fragments.push(text),
                Err(e) => return (fragments, Some(e)),
            }
        }
        (fragments, None)
    }

    #[tokio::test]
    async fn test_fragments_concatenate_to_full_text() {
        let s = FragmentStream::new(stream::iter(chunks(&[b"He", b"llo", b", world"])));
        let (fragments, err) = drain(s).await;

        assert!(err.is_none());
        assert_eq!(fragments, vec!["He", "llo", ", world"]);
        assert_eq!(fragments.concat(), "Hello, world");
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        let bytes = "caf\u{e9} au lait".as_bytes();
        // Split inside the two-byte é
        let s = FragmentStream::new(stream::iter(chunks(&[&bytes[..4], &bytes[4..]])));
        let (fragments, err) = drain(s).await;

        assert!(err.is_none());
        assert_eq!(fragments.concat(), "café au lait");
    }

    #[tokio::test]
    async fn test_truncated_tail_flushed_at_end() {
        let bytes = "ok\u{00e9}".as_bytes();
        let s = FragmentStream::new(stream::iter(chunks(&[&bytes[..3]])));
        let (fragments, err) = drain(s).await;

        assert!(err.is_none());
        assert_eq!(fragments.concat(), "ok\u{FFFD}");
    }

    #[tokio::test]
    async fn test_empty_stream_yields_empty_body_error() {
        let s = FragmentStream::new(stream::iter(chunks(&[])));
        let (fragments, err) = drain(s).await;

        assert!(fragments.is_empty());
        assert_eq!(err.unwrap().kind, TransportErrorKind::EmptyBody);
    }

    #[tokio::test]
    async fn test_whitespace_chunks_delivered_verbatim() {
        let s = FragmentStream::new(stream::iter(chunks(&[b"a", b"  \n", b"b"])));
        let (fragments, err) = drain(s).await;

        assert!(err.is_none());
        assert_eq!(fragments, vec!["a", "  \n", "b"]);
    }

    #[tokio::test]
    async fn test_mid_stream_error_preserves_prior_fragments() {
        let items: Vec<TransportResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial ")),
            Err(TransportError::read("connection reset")),
        ];
        let mut s = FragmentStream::new(stream::iter(items));

        assert_eq!(s.next().await.unwrap().unwrap(), "partial ");
        let err = s.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Read);
        // Nothing delivered after the failure
        assert!(s.next().await.is_none());
    }

    #[test]
    fn test_ask_request_wire_shape() {
        let request = AskRequest {
            question: "is it in stock?".to_string(),
            session_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            product_id: Some("42".to_string()),
            order_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["question"], "is it in stock?");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["productId"], "42");
        assert!(json.get("orderId").is_none());
    }
}
