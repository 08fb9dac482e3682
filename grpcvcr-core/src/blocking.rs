//! The blocking recording channel wrapper (`spec.md` §4.6, §9 "implementers
//! targeting a thread-per-call model").
//!
//! Drives the same async interceptor engine as [`crate::channel`] on a
//! dedicated current-thread `tokio::runtime::Runtime`, so callers on a
//! thread-per-call model never have to touch `async`/`.await` themselves.

use prost::Message;
use tokio_stream::StreamExt;
use tonic::metadata::MetadataMap;
use tonic::transport::Endpoint;
use tonic::{Code, Status};

use crate::blocking_call::{BlockingStreamingCall, BlockingUnaryCall};
use crate::cassette::Cassette;
use crate::channel::RecordingChannel;
use crate::error::{Result, VcrError};
use crate::fake_call::{FakeStreamingCall, FakeUnaryCall};

fn non_empty(message: &str) -> Option<String> {
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

async fn to_blocking_unary<Resp: Unpin>(call: FakeUnaryCall<Resp>) -> BlockingUnaryCall<Resp> {
    let trailing = call.trailing_metadata().clone();
    match call.await {
        Ok(resp) => BlockingUnaryCall::ok(resp, trailing),
        Err(status) => blocking_unary_error(status),
    }
}

fn blocking_unary_error<Resp>(status: Status) -> BlockingUnaryCall<Resp> {
    BlockingUnaryCall::error(status.code(), non_empty(status.message()), status.metadata().clone())
}

async fn to_blocking_streaming<Resp: Send + 'static>(
    mut call: FakeStreamingCall<Resp>,
) -> BlockingStreamingCall<Resp> {
    let mut messages = Vec::new();
    let mut terminal: Option<Status> = None;
    while let Some(item) = call.next().await {
        match item {
            Ok(msg) => messages.push(msg),
            Err(status) => {
                terminal = Some(status);
                break;
            }
        }
    }
    match terminal {
        Some(status) => BlockingStreamingCall::new(
            messages,
            status.code(),
            non_empty(status.message()),
            status.metadata().clone(),
        ),
        None => BlockingStreamingCall::new(messages, Code::Ok, None, MetadataMap::new()),
    }
}

/// A gRPC channel wrapped with the grpcvcr interceptor stack, for callers on
/// a thread-per-call (blocking) execution model.
pub struct BlockingRecordingChannel {
    runtime: tokio::runtime::Runtime,
    inner: RecordingChannel,
}

impl BlockingRecordingChannel {
    pub fn connect(cassette: Cassette, endpoint: Endpoint) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VcrError::SerializationFailure {
                message: format!("failed to start blocking runtime: {e}"),
                cause: Some(Box::new(e)),
            })?;
        let inner = runtime.block_on(RecordingChannel::connect(cassette, endpoint))?;
        Ok(BlockingRecordingChannel { runtime, inner })
    }

    pub fn cassette(&self) -> &Cassette {
        self.inner.cassette()
    }

    pub fn unary<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> Result<BlockingUnaryCall<Resp>>
    where
        Req: Message + Default + 'static,
        Resp: Message + Default + Unpin + 'static,
    {
        let call = self.runtime.block_on(self.inner.unary(method, request, metadata))?;
        Ok(self.runtime.block_on(to_blocking_unary(call)))
    }

    pub fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> Result<BlockingStreamingCall<Resp>>
    where
        Req: Message + Default + 'static,
        Resp: Message + Default + Send + 'static,
    {
        let call = self
            .runtime
            .block_on(self.inner.server_streaming(method, request, metadata))?;
        Ok(self.runtime.block_on(to_blocking_streaming(call)))
    }

    pub fn client_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Vec<Req>,
        metadata: MetadataMap,
    ) -> Result<BlockingUnaryCall<Resp>>
    where
        Req: Message + Default + Clone + Send + 'static,
        Resp: Message + Default + Unpin + 'static,
    {
        let call = self
            .runtime
            .block_on(self.inner.client_streaming(method, requests, metadata))?;
        Ok(self.runtime.block_on(to_blocking_unary(call)))
    }

    pub fn bidi_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Vec<Req>,
        metadata: MetadataMap,
    ) -> Result<BlockingStreamingCall<Resp>>
    where
        Req: Message + Default + Clone + Send + 'static,
        Resp: Message + Default + Send + 'static,
    {
        let call = self
            .runtime
            .block_on(self.inner.bidi_streaming(method, requests, metadata))?;
        Ok(self.runtime.block_on(to_blocking_streaming(call)))
    }

    /// Closes the underlying channel's cassette (saves unconditionally via
    /// `RecordingChannel::close`, a no-op when clean).
    pub fn close(&self) -> Result<()> {
        self.runtime.block_on(self.inner.close())
    }
}
