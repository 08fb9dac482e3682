use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tonic::metadata::{KeyAndValueRef, MetadataMap};

/// An ordered, multi-valued header mapping: the shape `spec.md` §3 requires
/// for both request metadata and trailing metadata.
///
/// Insertion order is preserved both across keys and within a single key's
/// value list, matching [`grpcurl_core::metadata`]'s header handling but
/// keeping every value instead of the last-one-wins behavior a plain map
/// would give.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedMetadata(pub IndexMap<String, Vec<String>>);

impl OrderedMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(|v| v.as_slice())
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

/// Convert a tonic [`MetadataMap`] into the ordered record shape.
///
/// Binary (`-bin`) values are base64-encoded using the standard alphabet so
/// they survive the cassette's text-only serialization, mirroring how
/// `grpcurl_core::metadata::metadata_to_string` renders binary headers.
/// Non-UTF-8 ASCII values (which tonic rejects at insertion time) cannot
/// occur.
pub fn metadata_to_record(md: &MetadataMap) -> OrderedMetadata {
    use base64::Engine;

    let mut out = OrderedMetadata::new();
    for kv in md.iter() {
        match kv {
            KeyAndValueRef::Ascii(key, value) => {
                let v = value.to_str().unwrap_or_default().to_string();
                out.append(key.as_str(), v);
            }
            KeyAndValueRef::Binary(key, value) => {
                let bytes = value.to_bytes().unwrap_or_default();
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                out.append(key.as_str(), encoded);
            }
        }
    }
    out
}

/// Convert a recorded ordered metadata map back into a tonic [`MetadataMap`].
///
/// `-bin`-suffixed keys are decoded from base64 into binary metadata values;
/// everything else is inserted as ASCII metadata. Entries that tonic's key
/// or value grammar rejects are silently dropped, matching
/// `grpcurl_core::metadata::metadata_from_headers`'s lenient behavior.
pub fn record_to_metadata(record: &OrderedMetadata) -> MetadataMap {
    use base64::Engine;

    let mut md = MetadataMap::new();
    for (key, values) in record.0.iter() {
        if key.ends_with("-bin") {
            let Ok(bin_key) = tonic::metadata::BinaryMetadataKey::from_bytes(key.as_bytes())
            else {
                continue;
            };
            for value in values {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(value)
                    .unwrap_or_else(|_| value.clone().into_bytes());
                md.append_bin(
                    bin_key.clone(),
                    tonic::metadata::BinaryMetadataValue::from_bytes(&bytes),
                );
            }
        } else {
            let Ok(ascii_key) = tonic::metadata::AsciiMetadataKey::from_bytes(key.as_bytes())
            else {
                continue;
            };
            for value in values {
                if let Ok(ascii_value) = value.parse::<tonic::metadata::AsciiMetadataValue>() {
                    md.append(ascii_key.clone(), ascii_value);
                }
            }
        }
    }
    md
}
