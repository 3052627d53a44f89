//! The REST plane's response body: buffered JSON bytes, an empty frame,
//! or a streamed proxy pass-through chunk sequence.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full, StreamBody};

/// A buffered, empty, or streamed HTTP response body for the REST plane.
#[derive(Default)]
pub enum RestBody {
    Buffered(Full<Bytes>),
    #[default]
    Empty,
    Streamed(StreamBody<Pin<Box<dyn Stream<Item = Result<Frame<Bytes>, std::io::Error>> + Send>>>),
}

impl std::fmt::Debug for RestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(_) => f.write_str("RestBody::Buffered"),
            Self::Empty => f.write_str("RestBody::Empty"),
            Self::Streamed(_) => f.write_str("RestBody::Streamed"),
        }
    }
}

impl RestBody {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(bytes.into()))
    }

    #[must_use]
    pub fn from_json(value: &impl serde::Serialize) -> Self {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        Self::from_bytes(bytes)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Wrap an upstream byte stream for the proxy plane, forwarding I/O
    /// errors as body-poll errors instead of collecting into memory.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        let frames = stream.map(|chunk| chunk.map(Frame::data));
        Self::Streamed(StreamBody::new(Box::pin(frames)))
    }
}

impl Body for RestBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full).poll_frame(cx).map_err(|never: Infallible| match never {}),
            Self::Empty => Poll::Ready(None),
            Self::Streamed(stream) => Pin::new(stream).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
            Self::Streamed(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => SizeHint::with_exact(0),
            Self::Streamed(_) => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_has_zero_size_hint() {
        let body = RestBody::empty();
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.is_end_stream());
    }

    #[test]
    fn test_json_body_serializes_the_value() {
        let body = RestBody::from_json(&serde_json::json!({"ok": true}));
        assert!(!body.is_end_stream());
    }
}
