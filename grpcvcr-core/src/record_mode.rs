use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Controls the record/replay arbitration performed by a [`crate::Cassette`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Never forward live requests; every call must match a recorded episode.
    None,
    /// Replay matches, forward and append on a miss.
    NewEpisodes,
    /// Always forward and append, removing any prior match for the request first.
    All,
    /// Record once: forward+append only while the cassette started empty/absent.
    Once,
}

impl RecordMode {
    /// `true` for every mode that is ever allowed to forward a live call.
    ///
    /// `ONCE` stays `can_record` even after its first write; the finer-grained
    /// "replay only past this point" gating lives in [`crate::Cassette`], keyed
    /// on whether the cassette file existed (non-empty) at `open()` time.
    pub fn can_record(self) -> bool {
        matches!(self, RecordMode::All | RecordMode::NewEpisodes | RecordMode::Once)
    }

    /// The default mode per §6.2: `new_episodes`, unless `CI` is set to a
    /// non-empty value, in which case `none`.
    pub fn default_for_environment() -> Self {
        match std::env::var("CI") {
            Ok(val) if !val.is_empty() => RecordMode::None,
            _ => RecordMode::NewEpisodes,
        }
    }
}

impl Default for RecordMode {
    fn default() -> Self {
        RecordMode::default_for_environment()
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordMode::None => "none",
            RecordMode::NewEpisodes => "new_episodes",
            RecordMode::All => "all",
            RecordMode::Once => "once",
        };
        f.write_str(s)
    }
}

impl FromStr for RecordMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RecordMode::None),
            "new_episodes" => Ok(RecordMode::NewEpisodes),
            "all" => Ok(RecordMode::All),
            "once" => Ok(RecordMode::Once),
            other => Err(format!("unknown record mode {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_exact_strings() {
        for (s, mode) in [
            ("none", RecordMode::None),
            ("new_episodes", RecordMode::NewEpisodes),
            ("all", RecordMode::All),
            ("once", RecordMode::Once),
        ] {
            assert_eq!(s.parse::<RecordMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), s);
        }
    }

    #[test]
    fn rejects_case_variants() {
        assert!("NONE".parse::<RecordMode>().is_err());
        assert!("None".parse::<RecordMode>().is_err());
    }

    #[test]
    fn can_record_table() {
        assert!(!RecordMode::None.can_record());
        assert!(RecordMode::NewEpisodes.can_record());
        assert!(RecordMode::All.can_record());
        assert!(RecordMode::Once.can_record());
    }

    #[test]
    fn ci_env_selects_none_default() {
        // SAFETY-free: tests run single-threaded-per-var via serial env access
        // within this process is not guaranteed, so only assert the non-CI path.
        std::env::remove_var("CI");
        assert_eq!(RecordMode::default_for_environment(), RecordMode::NewEpisodes);
    }

    #[test]
    fn serde_uses_lowercase_values() {
        let json = serde_json::to_string(&RecordMode::NewEpisodes).unwrap();
        assert_eq!(json, "\"new_episodes\"");
        let back: RecordMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RecordMode::NewEpisodes);
    }
}
