//! Call-shape handlers: the engine driving all four gRPC call shapes
//! against a [`Cassette`] (`spec.md` §4.5).
//!
//! Every function here follows the same skeleton: build a request record,
//! consult the cassette, and either replay or forward-then-record. Both
//! paths return the *same* synthesized call type, so a caller cannot tell a
//! hit from a freshly recorded miss (`spec.md` §4.4/§4.5).
//!
//! Every function is generic over `Req`/`Resp` supplied independently by the
//! caller (the generated stub wrapper) — this crate never reuses the
//! request's type to decode the response, which `spec.md` §9 flags as a bug
//! in the source it was distilled from (`SPEC_FULL.md` §D).

use http::uri::PathAndQuery;
use prost::Message;
use tonic::client::Grpc;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::Code;

use crate::cassette::Cassette;
use crate::fake_call::{FakeStreamingCall, FakeUnaryCall};
use crate::metadata::{metadata_to_record, record_to_metadata};
use crate::record::{
    Episode, RequestRecord, ResponseOutcome, ResponseRecord, RpcType, StreamingResponseRecord,
};
use crate::record_mode::RecordMode;
use crate::status::{code_from_name, code_to_name};
use crate::VcrError;

fn parse_path(method: &str) -> Result<PathAndQuery, VcrError> {
    method
        .parse()
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("invalid method path {method:?}: {e}"),
            cause: None,
        })
}

/// Decides replay vs. forward for a live request (`spec.md` §4.3's decision
/// table). `ALL` mode never replays: every live call is forwarded and the
/// cassette is re-recorded, with `Cassette::record` compacting out whatever
/// prior episode matched (P5). Every other mode tries a cache hit first and
/// only falls through to forwarding (or `RecordingDisabled`) on a miss.
async fn consult<'a>(
    cassette: &'a Cassette,
    method: &str,
    request: &RequestRecord,
) -> Result<Option<Episode>, VcrError> {
    if cassette.record_mode() == RecordMode::All {
        return Ok(None);
    }
    if let Some(episode) = cassette.find(request).await {
        return Ok(Some(episode));
    }
    if cassette.requires_match() {
        return Err(VcrError::RecordingDisabled(method.to_string()));
    }
    Ok(None)
}

fn fake_unary_from_response<Resp: Message + Default>(
    response: &ResponseRecord,
) -> Result<FakeUnaryCall<Resp>, VcrError> {
    let code = code_from_name(&response.code);
    let trailing = record_to_metadata(&response.trailing_metadata);
    if code == Code::Ok {
        let resp = Resp::decode(response.body.as_slice()).map_err(|e| VcrError::SerializationFailure {
            message: format!("failed to decode recorded response: {e}"),
            cause: Some(Box::new(e)),
        })?;
        Ok(FakeUnaryCall::ok(resp, trailing))
    } else {
        Ok(FakeUnaryCall::error(code, response.details.clone(), trailing))
    }
}

fn fake_streaming_from_response<Resp: Message + Default + Send + 'static>(
    response: &StreamingResponseRecord,
) -> Result<FakeStreamingCall<Resp>, VcrError> {
    let code = code_from_name(&response.code);
    let trailing = record_to_metadata(&response.trailing_metadata);
    let mut messages = Vec::with_capacity(response.messages.len());
    for m in &response.messages {
        let resp = Resp::decode(m.as_slice()).map_err(|e| VcrError::SerializationFailure {
            message: format!("failed to decode recorded message: {e}"),
            cause: Some(Box::new(e)),
        })?;
        messages.push(resp);
    }
    Ok(FakeStreamingCall::new(
        messages,
        code,
        response.details.clone(),
        trailing,
    ))
}

/// Unary/unary: a single request, a single response.
pub async fn unary_call<Req, Resp>(
    channel: Channel,
    cassette: &Cassette,
    method: &str,
    request: Req,
    metadata: MetadataMap,
) -> Result<FakeUnaryCall<Resp>, VcrError>
where
    Req: Message + Default + 'static,
    Resp: Message + Default + 'static,
{
    let body = request.encode_to_vec();
    let req_record = RequestRecord::new(method, body.clone(), metadata_to_record(&metadata));

    if let Some(episode) = consult(cassette, method, &req_record).await? {
        return match episode.response {
            ResponseOutcome::Unary(r) => fake_unary_from_response(&r),
            ResponseOutcome::Streaming(_) => Err(VcrError::SerializationFailure {
                message: format!("episode for {method} is a streaming response but was invoked as unary"),
                cause: None,
            }),
        };
    }

    let path = parse_path(method)?;
    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let mut client = Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("transport not ready: {e}"),
            cause: None,
        })?;

    let mut tonic_request = tonic::Request::new(request);
    *tonic_request.metadata_mut() = metadata;

    let (response_record, fake) = match client.unary(tonic_request, path, codec).await {
        Ok(response) => {
            let trailing = response.metadata().clone();
            let resp = response.into_inner();
            let record = ResponseRecord {
                body: resp.encode_to_vec(),
                code: "OK".into(),
                details: None,
                trailing_metadata: metadata_to_record(&trailing),
            };
            let fake = FakeUnaryCall::ok(resp, trailing);
            (record, fake)
        }
        Err(status) => {
            let trailing = status.metadata().clone();
            let record = ResponseRecord {
                body: Vec::new(),
                code: code_to_name(status.code()).to_string(),
                details: non_empty(status.message()),
                trailing_metadata: metadata_to_record(&trailing),
            };
            let fake = FakeUnaryCall::error(status.code(), non_empty(status.message()), trailing);
            (record, fake)
        }
    };

    cassette
        .record(Episode::new(req_record, ResponseOutcome::Unary(response_record), RpcType::Unary))
        .await;

    Ok(fake)
}

/// Unary/stream (server-streaming): a single request, a stream of responses.
pub async fn server_streaming_call<Req, Resp>(
    channel: Channel,
    cassette: &Cassette,
    method: &str,
    request: Req,
    metadata: MetadataMap,
) -> Result<FakeStreamingCall<Resp>, VcrError>
where
    Req: Message + Default + 'static,
    Resp: Message + Default + Send + 'static,
{
    let body = request.encode_to_vec();
    let req_record = RequestRecord::new(method, body.clone(), metadata_to_record(&metadata));

    if let Some(episode) = consult(cassette, method, &req_record).await? {
        return match episode.response {
            ResponseOutcome::Streaming(r) => fake_streaming_from_response(&r),
            ResponseOutcome::Unary(_) => Err(VcrError::SerializationFailure {
                message: format!("episode for {method} is a unary response but was invoked as streaming"),
                cause: None,
            }),
        };
    }

    let path = parse_path(method)?;
    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let mut client = Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("transport not ready: {e}"),
            cause: None,
        })?;

    let mut tonic_request = tonic::Request::new(request);
    *tonic_request.metadata_mut() = metadata;

    let streaming_record = match client.server_streaming(tonic_request, path, codec).await {
        Ok(response) => {
            let mut stream = response.into_inner();
            let mut messages = Vec::new();
            loop {
                match stream.message().await {
                    Ok(Some(msg)) => messages.push(msg.encode_to_vec()),
                    Ok(None) => {
                        let trailing = stream.trailers().await.ok().flatten().unwrap_or_default();
                        break StreamingResponseRecord {
                            messages,
                            code: "OK".into(),
                            details: None,
                            trailing_metadata: metadata_to_record(&trailing),
                        };
                    }
                    Err(status) => {
                        let trailing = status.metadata().clone();
                        break StreamingResponseRecord {
                            messages,
                            code: code_to_name(status.code()).to_string(),
                            details: non_empty(status.message()),
                            trailing_metadata: metadata_to_record(&trailing),
                        };
                    }
                }
            }
        }
        Err(status) => {
            let trailing = status.metadata().clone();
            StreamingResponseRecord {
                messages: Vec::new(),
                code: code_to_name(status.code()).to_string(),
                details: non_empty(status.message()),
                trailing_metadata: metadata_to_record(&trailing),
            }
        }
    };

    let fake = fake_streaming_from_response::<Resp>(&streaming_record)?;
    cassette
        .record(Episode::new(
            req_record,
            ResponseOutcome::Streaming(streaming_record),
            RpcType::ServerStreaming,
        ))
        .await;

    Ok(fake)
}

/// Stream/unary (client-streaming): a stream of requests, a single response.
/// The outgoing messages are drained first and concatenated into the
/// request record's body (`spec.md` §4.5 step 1, §9).
pub async fn client_streaming_call<Req, Resp>(
    channel: Channel,
    cassette: &Cassette,
    method: &str,
    requests: Vec<Req>,
    metadata: MetadataMap,
) -> Result<FakeUnaryCall<Resp>, VcrError>
where
    Req: Message + Default + Clone + Send + 'static,
    Resp: Message + Default + 'static,
{
    let mut body = Vec::new();
    for req in &requests {
        body.extend_from_slice(&req.encode_to_vec());
    }
    let req_record = RequestRecord::new(method, body, metadata_to_record(&metadata));

    if let Some(episode) = consult(cassette, method, &req_record).await? {
        return match episode.response {
            ResponseOutcome::Unary(r) => fake_unary_from_response(&r),
            ResponseOutcome::Streaming(_) => Err(VcrError::SerializationFailure {
                message: format!("episode for {method} is a streaming response but was invoked as unary"),
                cause: None,
            }),
        };
    }

    let path = parse_path(method)?;
    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let mut client = Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("transport not ready: {e}"),
            cause: None,
        })?;

    let outbound = tokio_stream::iter(requests);
    let mut tonic_request = tonic::Request::new(outbound);
    *tonic_request.metadata_mut() = metadata;

    let (response_record, fake) = match client.client_streaming(tonic_request, path, codec).await {
        Ok(response) => {
            let trailing = response.metadata().clone();
            let resp = response.into_inner();
            let record = ResponseRecord {
                body: resp.encode_to_vec(),
                code: "OK".into(),
                details: None,
                trailing_metadata: metadata_to_record(&trailing),
            };
            let fake = FakeUnaryCall::ok(resp, trailing);
            (record, fake)
        }
        Err(status) => {
            let trailing = status.metadata().clone();
            let record = ResponseRecord {
                body: Vec::new(),
                code: code_to_name(status.code()).to_string(),
                details: non_empty(status.message()),
                trailing_metadata: metadata_to_record(&trailing),
            };
            let fake = FakeUnaryCall::error(status.code(), non_empty(status.message()), trailing);
            (record, fake)
        }
    };

    cassette
        .record(Episode::new(
            req_record,
            ResponseOutcome::Unary(response_record),
            RpcType::ClientStreaming,
        ))
        .await;

    Ok(fake)
}

/// Stream/stream (bidi-streaming): a stream of requests, a stream of
/// responses. Like client-streaming, outgoing messages are drained and
/// concatenated before the call is made (recording cannot interleave
/// send/receive the way a live bidi call can).
pub async fn bidi_streaming_call<Req, Resp>(
    channel: Channel,
    cassette: &Cassette,
    method: &str,
    requests: Vec<Req>,
    metadata: MetadataMap,
) -> Result<FakeStreamingCall<Resp>, VcrError>
where
    Req: Message + Default + Clone + Send + 'static,
    Resp: Message + Default + Send + 'static,
{
    let mut body = Vec::new();
    for req in &requests {
        body.extend_from_slice(&req.encode_to_vec());
    }
    let req_record = RequestRecord::new(method, body, metadata_to_record(&metadata));

    if let Some(episode) = consult(cassette, method, &req_record).await? {
        return match episode.response {
            ResponseOutcome::Streaming(r) => fake_streaming_from_response(&r),
            ResponseOutcome::Unary(_) => Err(VcrError::SerializationFailure {
                message: format!("episode for {method} is a unary response but was invoked as streaming"),
                cause: None,
            }),
        };
    }

    let path = parse_path(method)?;
    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let mut client = Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("transport not ready: {e}"),
            cause: None,
        })?;

    let outbound = tokio_stream::iter(requests);
    let mut tonic_request = tonic::Request::new(outbound);
    *tonic_request.metadata_mut() = metadata;

    let streaming_record = match client.streaming(tonic_request, path, codec).await {
        Ok(response) => {
            let mut stream = response.into_inner();
            let mut messages = Vec::new();
            loop {
                match stream.message().await {
                    Ok(Some(msg)) => messages.push(msg.encode_to_vec()),
                    Ok(None) => {
                        let trailing = stream.trailers().await.ok().flatten().unwrap_or_default();
                        break StreamingResponseRecord {
                            messages,
                            code: "OK".into(),
                            details: None,
                            trailing_metadata: metadata_to_record(&trailing),
                        };
                    }
                    Err(status) => {
                        let trailing = status.metadata().clone();
                        break StreamingResponseRecord {
                            messages,
                            code: code_to_name(status.code()).to_string(),
                            details: non_empty(status.message()),
                            trailing_metadata: metadata_to_record(&trailing),
                        };
                    }
                }
            }
        }
        Err(status) => {
            let trailing = status.metadata().clone();
            StreamingResponseRecord {
                messages: Vec::new(),
                code: code_to_name(status.code()).to_string(),
                details: non_empty(status.message()),
                trailing_metadata: metadata_to_record(&trailing),
            }
        }
    };

    let fake = fake_streaming_from_response::<Resp>(&streaming_record)?;
    cassette
        .record(Episode::new(
            req_record,
            ResponseOutcome::Streaming(streaming_record),
            RpcType::BidiStreaming,
        ))
        .await;

    Ok(fake)
}

fn non_empty(message: &str) -> Option<String> {
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}
