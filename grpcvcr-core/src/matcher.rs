use std::fmt;
use std::ops::BitAnd;
use std::sync::Arc;

use crate::record::RequestRecord;

/// A predicate over `(live, candidate)` request pairs, used to pick an
/// episode to replay. Matchers compose with `&` (`spec.md` §4.2); combining
/// two matchers flattens a nested [`Matcher::All`] on the left, so a chain
/// `m1 & m2 & m3` builds one flat `All([m1, m2, m3])` rather than nesting.
#[derive(Clone)]
pub enum Matcher {
    /// `live.method == candidate.method`.
    Method,
    /// `live.body == candidate.body` (byte-exact).
    Request,
    /// Compare metadata. `keys = Some(_)` compares exactly those keys;
    /// `keys = None` compares the union of both sides' keys minus
    /// `ignore_keys`. The two modes are mutually exclusive; if both were
    /// supplied, `keys` wins (enforced by the constructors below).
    Metadata {
        keys: Option<Vec<String>>,
        ignore_keys: Vec<String>,
    },
    /// An opaque caller-supplied predicate.
    Custom(Arc<dyn Fn(&RequestRecord, &RequestRecord) -> bool + Send + Sync>),
    /// Logical AND over a flat list of matchers, short-circuiting on the
    /// first `false`.
    All(Vec<Matcher>),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Method => write!(f, "Method"),
            Matcher::Request => write!(f, "Request"),
            Matcher::Metadata { keys, ignore_keys } => f
                .debug_struct("Metadata")
                .field("keys", keys)
                .field("ignore_keys", ignore_keys)
                .finish(),
            Matcher::Custom(_) => write!(f, "Custom(..)"),
            Matcher::All(matchers) => f.debug_tuple("All").field(matchers).finish(),
        }
    }
}

impl Matcher {
    pub fn method() -> Self {
        Matcher::Method
    }

    pub fn request() -> Self {
        Matcher::Request
    }

    /// `MetadataMatcher()` with no args: compare the union of keys, ignoring
    /// none.
    pub fn metadata() -> Self {
        Matcher::Metadata {
            keys: None,
            ignore_keys: Vec::new(),
        }
    }

    /// `MetadataMatcher(keys)`: compare only the listed keys.
    pub fn metadata_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Matcher::Metadata {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            ignore_keys: Vec::new(),
        }
    }

    /// `MetadataMatcher(ignore_keys)`: compare everything except the listed
    /// keys.
    pub fn metadata_ignoring<I, S>(ignore_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Matcher::Metadata {
            keys: None,
            ignore_keys: ignore_keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestRecord, &RequestRecord) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Arc::new(f))
    }

    pub fn matches(&self, live: &RequestRecord, candidate: &RequestRecord) -> bool {
        match self {
            Matcher::Method => live.method == candidate.method,
            Matcher::Request => live.body == candidate.body,
            Matcher::Metadata { keys, ignore_keys } => {
                metadata_matches(live, candidate, keys.as_deref(), ignore_keys)
            }
            Matcher::Custom(f) => f(live, candidate),
            Matcher::All(matchers) => matchers.iter().all(|m| m.matches(live, candidate)),
        }
    }
}

fn metadata_matches(
    live: &RequestRecord,
    candidate: &RequestRecord,
    keys: Option<&[String]>,
    ignore_keys: &[String],
) -> bool {
    let empty: &[String] = &[];
    match keys {
        Some(keys) => keys.iter().all(|key| {
            live.metadata.get(key).unwrap_or(empty) == candidate.metadata.get(key).unwrap_or(empty)
        }),
        None => {
            let mut all_keys: Vec<&str> = live
                .metadata
                .keys()
                .chain(candidate.metadata.keys())
                .collect();
            all_keys.sort_unstable();
            all_keys.dedup();
            all_keys
                .into_iter()
                .filter(|k| !ignore_keys.iter().any(|ig| ig == k))
                .all(|key| {
                    live.metadata.get(key).unwrap_or(empty)
                        == candidate.metadata.get(key).unwrap_or(empty)
                })
        }
    }
}

impl Default for Matcher {
    /// The default matcher when none is specified: `MethodMatcher` alone.
    fn default() -> Self {
        Matcher::method()
    }
}

impl BitAnd for Matcher {
    type Output = Matcher;

    fn bitand(self, rhs: Matcher) -> Matcher {
        match self {
            Matcher::All(mut matchers) => {
                matchers.push(rhs);
                Matcher::All(matchers)
            }
            other => Matcher::All(vec![other, rhs]),
        }
    }
}
