use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::codec;
use crate::error::{Result, VcrError};
use crate::matcher::Matcher;
use crate::record::{Episode, RequestRecord};
use crate::record_mode::RecordMode;

struct CassetteInner {
    episodes: Vec<Episode>,
    dirty: bool,
}

/// A persisted file of recorded gRPC episodes, consulted and mutated by the
/// interceptor stack (`spec.md` §4.3).
///
/// Mutation (`record`, and `ALL`-mode compaction) is serialized by a single
/// `tokio::sync::Mutex`, matching `spec.md` §4.3/§5: one cassette may be
/// shared by many concurrent calls, and the lock is held only for the
/// duration of a single `find`/`record` operation.
#[derive(Clone)]
pub struct Cassette {
    inner: Arc<Mutex<CassetteInner>>,
    path: PathBuf,
    is_json: bool,
    record_mode: RecordMode,
    matcher: Matcher,
    /// Whether the file existed *and was non-empty* at `open()` time. Drives
    /// the `ONCE` gating decision (`spec.md` §9 open question, resolved in
    /// `SPEC_FULL.md` §D): a `ONCE` cassette behaves like `NONE` exactly when
    /// this is true.
    had_file_at_open: bool,
}

impl Cassette {
    /// Load `path`, or start empty if the mode permits an absent/empty file
    /// (`spec.md` §4.3, I2).
    pub fn open(path: impl AsRef<Path>, record_mode: RecordMode, matcher: Matcher) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let is_json = codec::is_json_path(&path);

        let file_exists = path.is_file();

        if record_mode == RecordMode::None && !file_exists {
            return Err(VcrError::CassetteNotFound(path));
        }

        let episodes = if file_exists {
            let text = std::fs::read_to_string(&path).map_err(|e| VcrError::SerializationFailure {
                message: format!("failed to read cassette {}: {e}", path.display()),
                cause: Some(Box::new(e)),
            })?;
            codec::decode(&text, is_json)?
        } else {
            Vec::new()
        };

        let had_file_at_open = file_exists && !episodes.is_empty();

        Ok(Cassette {
            inner: Arc::new(Mutex::new(CassetteInner {
                episodes,
                dirty: false,
            })),
            path,
            is_json,
            record_mode,
            matcher,
            had_file_at_open,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// `true` iff this cassette is ever allowed to forward a live call
    /// (`spec.md` §4.3's `can_record`, independent of the `ONCE` gate below).
    pub fn can_record(&self) -> bool {
        self.record_mode.can_record()
    }

    /// `true` iff a live request that finds no match must fail instead of
    /// being forwarded — the decision-table gate that `ONCE` shares with
    /// `NONE` once the cassette started non-empty.
    pub fn requires_match(&self) -> bool {
        match self.record_mode {
            RecordMode::None => true,
            RecordMode::Once => self.had_file_at_open,
            RecordMode::NewEpisodes | RecordMode::All => false,
        }
    }

    /// Linear scan for the first episode matching `request` under the
    /// configured matcher. Episodes are not consumed (P4: first-match-wins).
    pub async fn find(&self, request: &RequestRecord) -> Option<Episode> {
        let inner = self.inner.lock().await;
        inner
            .episodes
            .iter()
            .find(|e| self.matcher.matches(request, &e.request))
            .cloned()
    }

    /// Record `episode` per the mode's decision table (`spec.md` §4.3). In
    /// `ALL` mode, any prior episode whose request matches under the
    /// configured matcher is removed before the new one is appended (P5).
    pub async fn record(&self, episode: Episode) {
        let mut inner = self.inner.lock().await;
        if self.record_mode == RecordMode::All {
            inner
                .episodes
                .retain(|e| !self.matcher.matches(&episode.request, &e.request));
        }
        inner.episodes.push(episode);
        inner.dirty = true;
    }

    /// Serialize to `path` only if dirty; clears the flag on success (I3).
    pub async fn save(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.dirty {
            return Ok(());
        }

        let text = codec::encode(&inner.episodes, self.is_json)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| VcrError::CassetteWriteFailure {
                    path: self.path.clone(),
                    cause: e,
                })?;
            }
        }

        std::fs::write(&self.path, text).map_err(|e| VcrError::CassetteWriteFailure {
            path: self.path.clone(),
            cause: e,
        })?;

        inner.dirty = false;
        Ok(())
    }

    /// Current episode count, chiefly for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.episodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Method paths of every recorded episode, for
    /// [`crate::error::VcrError::NoMatchingInteraction`] diagnostics.
    pub async fn available_methods(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .episodes
            .iter()
            .map(|e| e.request.method.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::OrderedMetadata;
    use crate::record::{ResponseOutcome, ResponseRecord, RpcType};

    fn episode(method: &str, body: &[u8]) -> Episode {
        Episode::new(
            RequestRecord::new(method, body.to_vec(), OrderedMetadata::new()),
            ResponseOutcome::Unary(ResponseRecord {
                body: b"resp".to_vec(),
                code: "OK".into(),
                details: None,
                trailing_metadata: OrderedMetadata::new(),
            }),
            RpcType::Unary,
        )
    }

    #[tokio::test]
    async fn none_mode_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = Cassette::open(&path, RecordMode::None, Matcher::default()).unwrap_err();
        assert!(matches!(err, VcrError::CassetteNotFound(_)));
    }

    #[tokio::test]
    async fn once_mode_starts_empty_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let cassette = Cassette::open(&path, RecordMode::Once, Matcher::default()).unwrap();
        assert!(cassette.is_empty().await);
        assert!(!cassette.requires_match());
    }

    #[tokio::test]
    async fn new_episodes_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");
        let cassette = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();

        cassette.record(episode("/s/A", b"1")).await;
        cassette.record(episode("/s/A", b"2")).await;

        assert_eq!(cassette.len().await, 2);
        let found = cassette
            .find(&RequestRecord::new("/s/A", b"anything".to_vec(), OrderedMetadata::new()))
            .await
            .unwrap();
        assert_eq!(found.request.body, b"1");
    }

    #[tokio::test]
    async fn all_mode_overwrites_matching_prior_episode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");
        let cassette = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
        cassette.record(episode("/s/A", b"1")).await;
        cassette.record(episode("/s/B", b"2")).await;
        cassette.save().await.unwrap();

        let reopened = Cassette::open(&path, RecordMode::All, Matcher::default()).unwrap();
        reopened.record(episode("/s/A", b"fresh")).await;

        assert_eq!(reopened.len().await, 2);
        let all = reopened.inner.lock().await;
        assert_eq!(all.episodes[0].request.method, "/s/B");
        assert_eq!(all.episodes[1].request.method, "/s/A");
        assert_eq!(all.episodes[1].request.body, b"fresh");
    }

    #[tokio::test]
    async fn save_is_idempotent_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");
        let cassette = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
        cassette.record(episode("/s/A", b"1")).await;
        cassette.save().await.unwrap();
        let mtime1 = std::fs::metadata(&path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        cassette.save().await.unwrap();
        let mtime2 = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime1, mtime2);
    }

    #[tokio::test]
    async fn requires_match_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");

        let new_ep = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
        assert!(!new_ep.requires_match());

        let all = Cassette::open(&path, RecordMode::All, Matcher::default()).unwrap();
        assert!(!all.requires_match());
    }

    #[tokio::test]
    async fn once_mode_gates_like_none_when_file_was_nonempty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");
        let writer = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
        writer.record(episode("/s/A", b"1")).await;
        writer.save().await.unwrap();

        let once = Cassette::open(&path, RecordMode::Once, Matcher::default()).unwrap();
        assert!(once.requires_match());
    }
}
