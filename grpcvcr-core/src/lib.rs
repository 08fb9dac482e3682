//! grpcvcr: record-and-replay testing for gRPC clients.
//!
//! Wrap a [`tonic::transport::Channel`] in a [`RecordingChannel`] (or the
//! thread-per-call [`BlockingRecordingChannel`]) backed by a [`Cassette`].
//! Calls made through the wrapper are matched against previously recorded
//! episodes and replayed without touching the network; unmatched calls are
//! forwarded to the real server and recorded, according to the cassette's
//! [`RecordMode`].

mod blocking;
mod blocking_call;
mod cassette;
mod channel;
mod codec;
mod error;
mod fake_call;
mod interceptor;
mod matcher;
mod metadata;
mod record;
mod record_mode;
mod status;

pub use blocking::BlockingRecordingChannel;
pub use blocking_call::{BlockingStreamingCall, BlockingUnaryCall};
pub use cassette::Cassette;
pub use channel::{with_recording_channel, RecordingChannel};
pub use error::{Result, VcrError};
pub use fake_call::{FakeStreamingCall, FakeUnaryCall};
pub use matcher::Matcher;
pub use metadata::OrderedMetadata;
pub use record::{Episode, RequestRecord, ResponseOutcome, ResponseRecord, RpcType, StreamingResponseRecord};
pub use record_mode::RecordMode;
pub use status::{code_from_name, code_to_name};
