//! Synthesized call objects that reproduce the observable behavior of a real
//! gRPC call from recorded data (`spec.md` §4.4). These are what both the
//! replay path and the "just recorded, hand it back" path of every
//! interceptor return — there is no separate code path for "freshly
//! recorded" vs "replayed from a prior episode".

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio_stream::Stream;
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

fn to_status(code: Code, details: Option<&str>, trailing: &MetadataMap) -> Status {
    let mut status = Status::new(code, details.unwrap_or_default());
    *status.metadata_mut() = trailing.clone();
    status
}

/// A synthesized unary (or client-streaming-response) call.
///
/// Polling/awaiting it yields `Ok(result)` when the recorded status is `OK`,
/// or the recorded `Err(Status)` otherwise. `done()` is always true and
/// `cancelled()` always false: a fake call has no in-flight state to cancel.
pub struct FakeUnaryCall<Resp> {
    outcome: Option<std::result::Result<Resp, (Code, Option<String>)>>,
    code: Code,
    details: Option<String>,
    trailing_metadata: MetadataMap,
}

impl<Resp> FakeUnaryCall<Resp> {
    pub fn ok(result: Resp, trailing_metadata: MetadataMap) -> Self {
        FakeUnaryCall {
            outcome: Some(Ok(result)),
            code: Code::Ok,
            details: None,
            trailing_metadata,
        }
    }

    pub fn error(code: Code, details: Option<String>, trailing_metadata: MetadataMap) -> Self {
        FakeUnaryCall {
            outcome: Some(Err((code, details.clone()))),
            code,
            details,
            trailing_metadata,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn trailing_metadata(&self) -> &MetadataMap {
        &self.trailing_metadata
    }

    /// Initial metadata is always empty for a synthesized call: the source
    /// cassette format has no concept of a separate headers frame for
    /// non-streaming responses (`spec.md` §4.4).
    pub fn initial_metadata(&self) -> MetadataMap {
        MetadataMap::new()
    }

    pub fn cancelled(&self) -> bool {
        false
    }

    pub fn done(&self) -> bool {
        true
    }

    /// Done-callbacks fire immediately, since the call is already resolved.
    pub fn on_done<F: FnOnce()>(&self, f: F) {
        f();
    }
}

impl<Resp: Unpin> Future for FakeUnaryCall<Resp> {
    type Output = std::result::Result<Resp, Status>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = self
            .outcome
            .take()
            .expect("FakeUnaryCall polled after completion");
        let trailing = self.trailing_metadata.clone();
        Poll::Ready(match outcome {
            Ok(resp) => Ok(resp),
            Err((code, details)) => Err(to_status(code, details.as_deref(), &trailing)),
        })
    }
}

/// A synthesized server-streaming (or bidi-streaming) call.
///
/// Iteration yields each recorded message in order; after the last message,
/// if the recorded status is not `OK`, the stream ends with that error
/// (`spec.md` §4.4, P7/P8). A suspension point is inserted between messages
/// (`tokio::task::yield_now`) so cooperative schedulers can make progress
/// between them (`spec.md` §5, P9).
pub struct FakeStreamingCall<Resp> {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<Resp, Status>> + Send>>,
    code: Code,
    details: Option<String>,
    trailing_metadata: MetadataMap,
}

impl<Resp> FakeStreamingCall<Resp>
where
    Resp: Send + 'static,
{
    pub fn new(
        messages: Vec<Resp>,
        code: Code,
        details: Option<String>,
        trailing_metadata: MetadataMap,
    ) -> Self {
        let stream_code = code;
        let stream_details = details.clone();
        let inner = Box::pin(async_stream::stream! {
            let mut iter = messages.into_iter().peekable();
            while let Some(msg) = iter.next() {
                yield Ok(msg);
                if iter.peek().is_some() {
                    tokio::task::yield_now().await;
                }
            }
            if stream_code != Code::Ok {
                yield Err(Status::new(stream_code, stream_details.clone().unwrap_or_default()));
            }
        });

        FakeStreamingCall {
            inner,
            code,
            details,
            trailing_metadata,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn trailing_metadata(&self) -> &MetadataMap {
        &self.trailing_metadata
    }

    pub fn initial_metadata(&self) -> MetadataMap {
        MetadataMap::new()
    }

    pub fn cancelled(&self) -> bool {
        false
    }
}

impl<Resp> Stream for FakeStreamingCall<Resp> {
    type Item = std::result::Result<Resp, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn unary_ok_resolves_to_result() {
        let call = FakeUnaryCall::ok(42, MetadataMap::new());
        assert_eq!(call.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn unary_error_resolves_to_status() {
        let call: FakeUnaryCall<i32> =
            FakeUnaryCall::error(Code::NotFound, Some("User 999 not found".into()), MetadataMap::new());
        let err = call.await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert!(err.message().contains("not found"));
    }

    #[tokio::test]
    async fn streaming_yields_messages_in_order_then_ends_cleanly() {
        let mut call = FakeStreamingCall::new(vec![1, 2, 3], Code::Ok, None, MetadataMap::new());
        let mut got = Vec::new();
        while let Some(item) = call.next().await {
            got.push(item.unwrap());
        }
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn streaming_raises_error_after_last_message() {
        let mut call = FakeStreamingCall::new(
            vec!["a".to_string(), "b".to_string()],
            Code::Internal,
            Some("boom".into()),
            MetadataMap::new(),
        );
        let first = call.next().await.unwrap().unwrap();
        assert_eq!(first, "a");
        let second = call.next().await.unwrap().unwrap();
        assert_eq!(second, "b");
        let third = call.next().await.unwrap();
        assert!(third.unwrap_err().code() == Code::Internal);
        assert!(call.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_streaming_with_error_yields_only_error() {
        let mut call: FakeStreamingCall<i32> =
            FakeStreamingCall::new(vec![], Code::Unavailable, None, MetadataMap::new());
        let only = call.next().await.unwrap();
        assert_eq!(only.unwrap_err().code(), Code::Unavailable);
        assert!(call.next().await.is_none());
    }
}
