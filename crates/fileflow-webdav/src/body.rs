//! The WebDAV plane's response body: buffered bytes or an empty frame.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A buffered or empty HTTP response body for the WebDAV plane.
#[derive(Debug, Default)]
pub enum WebDavBody {
    Buffered(Full<Bytes>),
    #[default]
    Empty,
}

impl WebDavBody {
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::Buffered(Full::new(bytes))
    }

    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(xml)))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl Body for WebDavBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full).poll_frame(cx).map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_has_zero_size_hint() {
        let body = WebDavBody::empty();
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.is_end_stream());
    }

    #[test]
    fn test_buffered_body_reports_its_length() {
        let body = WebDavBody::from_bytes(Bytes::from_static(b"hello"));
        assert_eq!(body.size_hint().exact(), Some(5));
    }
}
