//! Translation between the in-memory [`Episode`] graph and the on-disk
//! cassette document (`spec.md` §4.1). JSON is the canonical shape; YAML
//! serializes the identical keys. Both share the wire document types below.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VcrError};
use crate::metadata::OrderedMetadata;
use crate::record::{Episode, RequestRecord, ResponseOutcome, ResponseRecord, RpcType, StreamingResponseRecord};

const CURRENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CURRENT_VERSION
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CassetteDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    interactions: Vec<InteractionDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InteractionDoc {
    request: RequestDoc,
    response: ResponseDoc,
    rpc_type: RpcTypeDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestDoc {
    method: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    metadata: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ResponseDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    messages: Vec<String>,
    code: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    trailing_metadata: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RpcTypeDoc {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl From<RpcType> for RpcTypeDoc {
    fn from(t: RpcType) -> Self {
        match t {
            RpcType::Unary => RpcTypeDoc::Unary,
            RpcType::ServerStreaming => RpcTypeDoc::ServerStreaming,
            RpcType::ClientStreaming => RpcTypeDoc::ClientStreaming,
            RpcType::BidiStreaming => RpcTypeDoc::BidiStreaming,
        }
    }
}

impl From<RpcTypeDoc> for RpcType {
    fn from(t: RpcTypeDoc) -> Self {
        match t {
            RpcTypeDoc::Unary => RpcType::Unary,
            RpcTypeDoc::ServerStreaming => RpcType::ServerStreaming,
            RpcTypeDoc::ClientStreaming => RpcType::ClientStreaming,
            RpcTypeDoc::BidiStreaming => RpcType::BidiStreaming,
        }
    }
}

fn b64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn b64_decode(text: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| VcrError::SerializationFailure {
            message: format!("invalid base64 body: {e}"),
            cause: Some(Box::new(e)),
        })
}

/// `.json` selects JSON; any other extension selects YAML (`spec.md` §6.1).
pub fn is_json_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn episode_to_doc(episode: &Episode) -> InteractionDoc {
    let request = RequestDoc {
        method: episode.request.method.clone(),
        body: b64_encode(&episode.request.body),
        metadata: episode.request.metadata.0.clone(),
    };

    let response = match &episode.response {
        ResponseOutcome::Unary(r) => ResponseDoc {
            body: Some(b64_encode(&r.body)),
            messages: Vec::new(),
            code: r.code.clone(),
            details: r.details.clone(),
            trailing_metadata: r.trailing_metadata.0.clone(),
        },
        ResponseOutcome::Streaming(r) => ResponseDoc {
            body: None,
            messages: r.messages.iter().map(|m| b64_encode(m)).collect(),
            code: r.code.clone(),
            details: r.details.clone(),
            trailing_metadata: r.trailing_metadata.0.clone(),
        },
    };

    InteractionDoc {
        request,
        response,
        rpc_type: episode.rpc_type.into(),
    }
}

fn doc_to_episode(doc: InteractionDoc) -> Result<Episode> {
    let rpc_type: RpcType = doc.rpc_type.into();

    let request = RequestRecord::new(
        doc.request.method,
        b64_decode(&doc.request.body)?,
        OrderedMetadata(doc.request.metadata),
    );

    let response = if rpc_type.has_streaming_response() {
        let mut messages = Vec::with_capacity(doc.response.messages.len());
        for m in &doc.response.messages {
            messages.push(b64_decode(m)?);
        }
        ResponseOutcome::Streaming(StreamingResponseRecord {
            messages,
            code: doc.response.code,
            details: doc.response.details,
            trailing_metadata: OrderedMetadata(doc.response.trailing_metadata),
        })
    } else {
        let body = match &doc.response.body {
            Some(b) => b64_decode(b)?,
            None => Vec::new(),
        };
        ResponseOutcome::Unary(ResponseRecord {
            body,
            code: doc.response.code,
            details: doc.response.details,
            trailing_metadata: OrderedMetadata(doc.response.trailing_metadata),
        })
    };

    Ok(Episode::new(request, response, rpc_type))
}

/// Parse cassette text, dispatching on `is_json` for the wire format.
pub fn decode(text: &str, is_json: bool) -> Result<Vec<Episode>> {
    let doc: CassetteDocument = if is_json {
        serde_json::from_str(text).map_err(|e| VcrError::SerializationFailure {
            message: format!("invalid cassette JSON: {e}"),
            cause: Some(Box::new(e)),
        })?
    } else {
        serde_yaml::from_str(text).map_err(|e| VcrError::SerializationFailure {
            message: format!("invalid cassette YAML: {e}"),
            cause: Some(Box::new(e)),
        })?
    };

    if doc.version != CURRENT_VERSION {
        return Err(VcrError::SerializationFailure {
            message: format!("unsupported cassette version {}", doc.version),
            cause: None,
        });
    }

    doc.interactions.into_iter().map(doc_to_episode).collect()
}

/// Serialize episodes to text in the given wire format. YAML output uses
/// block style, preserves key insertion order, and allows unicode — all of
/// which `serde_yaml`'s default writer already does.
pub fn encode(episodes: &[Episode], is_json: bool) -> Result<String> {
    let doc = CassetteDocument {
        version: CURRENT_VERSION,
        interactions: episodes.iter().map(episode_to_doc).collect(),
    };

    if is_json {
        serde_json::to_string_pretty(&doc).map_err(|e| VcrError::SerializationFailure {
            message: format!("failed to encode cassette JSON: {e}"),
            cause: Some(Box::new(e)),
        })
    } else {
        serde_yaml::to_string(&doc).map_err(|e| VcrError::SerializationFailure {
            message: format!("failed to encode cassette YAML: {e}"),
            cause: Some(Box::new(e)),
        })
    }
}
