//! The cooperative (async) recording channel wrapper (`spec.md` §4.6).
//!
//! Composes a user-visible channel from a real [`Channel`], the four
//! call-shape interceptors, and a [`Cassette`]. There is no generated stub
//! to wrap (protobuf codegen is out of scope, `spec.md` §1), so the
//! channel's call methods are the generic entry points a caller's own
//! hand-written or codegen'd stub would invoke per method.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prost::Message;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};

use crate::cassette::Cassette;
use crate::error::{Result, VcrError};
use crate::fake_call::{FakeStreamingCall, FakeUnaryCall};
use crate::interceptor;

/// A gRPC channel wrapped with the grpcvcr interceptor stack.
///
/// Cheap to clone: internally an `Arc`-backed channel handle plus a shared
/// cassette and a shared "was this closed explicitly" flag, so multiple
/// cloned handles can be handed to concurrent callers while still sharing
/// one cassette and one closing decision.
#[derive(Clone)]
pub struct RecordingChannel {
    channel: Channel,
    cassette: Cassette,
    closed: Arc<AtomicBool>,
}

impl RecordingChannel {
    /// Build a real channel for `endpoint` and wrap it.
    pub async fn connect(cassette: Cassette, endpoint: Endpoint) -> Result<Self> {
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| VcrError::SerializationFailure {
                message: format!("failed to connect: {e}"),
                cause: Some(Box::new(e)),
            })?;
        Ok(Self::from_channel(channel, cassette))
    }

    /// Wrap an already-connected channel (e.g. an in-process test channel).
    pub fn from_channel(channel: Channel, cassette: Cassette) -> Self {
        RecordingChannel {
            channel,
            cassette,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cassette(&self) -> &Cassette {
        &self.cassette
    }

    pub async fn unary<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> Result<FakeUnaryCall<Resp>>
    where
        Req: Message + Default + 'static,
        Resp: Message + Default + 'static,
    {
        interceptor::unary_call(self.channel.clone(), &self.cassette, method, request, metadata).await
    }

    pub async fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> Result<FakeStreamingCall<Resp>>
    where
        Req: Message + Default + 'static,
        Resp: Message + Default + Send + 'static,
    {
        interceptor::server_streaming_call(self.channel.clone(), &self.cassette, method, request, metadata)
            .await
    }

    pub async fn client_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Vec<Req>,
        metadata: MetadataMap,
    ) -> Result<FakeUnaryCall<Resp>>
    where
        Req: Message + Default + Clone + Send + 'static,
        Resp: Message + Default + 'static,
    {
        interceptor::client_streaming_call(self.channel.clone(), &self.cassette, method, requests, metadata)
            .await
    }

    pub async fn bidi_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Vec<Req>,
        metadata: MetadataMap,
    ) -> Result<FakeStreamingCall<Resp>>
    where
        Req: Message + Default + Clone + Send + 'static,
        Resp: Message + Default + Send + 'static,
    {
        interceptor::bidi_streaming_call(self.channel.clone(), &self.cassette, method, requests, metadata)
            .await
    }

    /// Explicit close: saves the cassette (a no-op if clean) and marks this
    /// handle closed so the `Drop` backstop below does not double-save.
    pub async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.cassette.save().await
    }
}

impl Drop for RecordingChannel {
    /// Best-effort backstop for `spec.md` §9's "save must run on all exit
    /// paths including exceptional ones": if the last handle to this
    /// cassette is dropped without an explicit `close()` (e.g. the caller's
    /// code panicked before reaching it), spawn a detached save so episodes
    /// recorded so far are not silently lost. `close()` remains the primary,
    /// awaitable contract; this only covers what it can't.
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if Arc::strong_count(&self.closed) != 1 {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let cassette = self.cassette.clone();
            handle.spawn(async move {
                let _ = cassette.save().await;
            });
        }
    }
}

/// Scoped acquisition: connect, run `body` with the channel, then close
/// (saving the cassette) on every exit path including `body` returning
/// early via `?` inside an async block (`spec.md` §4.6/§9).
pub async fn with_recording_channel<F, Fut, T>(
    cassette: Cassette,
    endpoint: Endpoint,
    body: F,
) -> Result<T>
where
    F: FnOnce(RecordingChannel) -> Fut,
    Fut: Future<Output = T>,
{
    let channel = RecordingChannel::connect(cassette, endpoint).await?;
    let result = body(channel.clone()).await;
    channel.close().await?;
    Ok(result)
}
