use crate::metadata::OrderedMetadata;

/// One of the four gRPC call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcType {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl RpcType {
    /// `true` for the two shapes whose response is a [`StreamingResponseRecord`].
    pub fn has_streaming_response(self) -> bool {
        matches!(self, RpcType::ServerStreaming | RpcType::BidiStreaming)
    }
}

/// One recorded request. `body` is the wire-format bytes the transport would
/// have sent; for client-streamed shapes this is the concatenation of every
/// serialized message in send order (`spec.md` §9, client-streaming request
/// identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: String,
    pub body: Vec<u8>,
    pub metadata: OrderedMetadata,
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, body: Vec<u8>, metadata: OrderedMetadata) -> Self {
        RequestRecord {
            method: method.into(),
            body,
            metadata,
        }
    }
}

/// A non-streaming outcome: unary and client-streaming responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    /// Empty when `code != OK`.
    pub body: Vec<u8>,
    /// Canonical gRPC status code name, e.g. `OK`, `NOT_FOUND`.
    pub code: String,
    pub details: Option<String>,
    pub trailing_metadata: OrderedMetadata,
}

/// A streamed outcome: server-streaming and bidi-streaming responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingResponseRecord {
    /// Messages observed before a terminal error, in wire order.
    pub messages: Vec<Vec<u8>>,
    pub code: String,
    pub details: Option<String>,
    pub trailing_metadata: OrderedMetadata,
}

/// The response half of an [`Episode`]; the variant present is determined by
/// the episode's `rpc_type` (I1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Unary(ResponseRecord),
    Streaming(StreamingResponseRecord),
}

impl ResponseOutcome {
    pub fn code(&self) -> &str {
        match self {
            ResponseOutcome::Unary(r) => &r.code,
            ResponseOutcome::Streaming(r) => &r.code,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            ResponseOutcome::Unary(r) => r.details.as_deref(),
            ResponseOutcome::Streaming(r) => r.details.as_deref(),
        }
    }

    pub fn trailing_metadata(&self) -> &OrderedMetadata {
        match self {
            ResponseOutcome::Unary(r) => &r.trailing_metadata,
            ResponseOutcome::Streaming(r) => &r.trailing_metadata,
        }
    }
}

/// One recorded `(request, response, rpc_type)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub request: RequestRecord,
    pub response: ResponseOutcome,
    pub rpc_type: RpcType,
}

impl Episode {
    /// Construct an episode, asserting I1 (response variant matches rpc_type).
    /// The codec and interceptors are the only callers, and both already
    /// choose the right variant by construction — this is a debug-only
    /// sanity check, not a public validation API.
    pub fn new(request: RequestRecord, response: ResponseOutcome, rpc_type: RpcType) -> Self {
        debug_assert_eq!(
            rpc_type.has_streaming_response(),
            matches!(response, ResponseOutcome::Streaming(_)),
            "response variant must match rpc_type"
        );
        Episode {
            request,
            response,
            rpc_type,
        }
    }
}
