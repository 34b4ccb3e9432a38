//! Player kind selection
//!
//! An ordered table of `(predicate, kind)` rules; the first match wins and
//! the fallback covers everything else.

use crate::engine::DataSource;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which player implementation handles a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    /// Hardware video player
    Hardware,
    /// Hardware audio-only player
    AudioOnly,
    /// Software audio decoder
    Software,
    Midi,
    /// Caller-fed streams
    Streaming,
}

impl PlayerKind {
    pub const ALL: [PlayerKind; 5] = [
        PlayerKind::Hardware,
        PlayerKind::AudioOnly,
        PlayerKind::Software,
        PlayerKind::Midi,
        PlayerKind::Streaming,
    ];
}

impl fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerKind::Hardware => "hardware",
            PlayerKind::AudioOnly => "audio_only",
            PlayerKind::Software => "software",
            PlayerKind::Midi => "midi",
            PlayerKind::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Built-in extension table
static DEFAULT_EXTENSIONS: Lazy<BTreeMap<&'static str, PlayerKind>> = Lazy::new(|| {
    let groups: [(&[&str], PlayerKind); 3] = [
        (
            &["ogg", "mp3", "wav", "amr", "flac", "m4a"],
            PlayerKind::Software,
        ),
        (
            &["mid", "midi", "smf", "xmf", "imy", "rtttl", "rtx", "ota"],
            PlayerKind::Midi,
        ),
        (
            &["ape", "ac3", "dts", "wma", "aac", "mp2", "mp1"],
            PlayerKind::AudioOnly,
        ),
    ];

    groups
        .iter()
        .flat_map(|(extensions, kind)| extensions.iter().map(move |ext| (*ext, *kind)))
        .collect()
});

type Predicate = Box<dyn Fn(&DataSource) -> bool + Send + Sync>;

/// Ordered selection rules
pub struct PlayerSelector {
    rules: Vec<(Predicate, PlayerKind)>,
    fallback: PlayerKind,
}

impl PlayerSelector {
    /// Empty table selecting `fallback` for everything
    pub fn new(fallback: PlayerKind) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Append a rule
    pub fn rule<F>(mut self, predicate: F, kind: PlayerKind) -> Self
    where
        F: Fn(&DataSource) -> bool + Send + Sync + 'static,
    {
        self.rules.push((Box::new(predicate), kind));
        self
    }

    /// Append a rule matching a file extension, case-insensitively
    pub fn extension(self, extension: &str, kind: PlayerKind) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.rule(
            move |source| source.extension().as_deref() == Some(extension.as_str()),
            kind,
        )
    }

    /// Default table with `overrides` checked first
    pub fn with_overrides(overrides: &BTreeMap<String, PlayerKind>) -> Self {
        let mut selector = Self::new(PlayerKind::Hardware);
        for (extension, kind) in overrides {
            selector = selector.extension(extension, *kind);
        }
        selector.with_default_rules()
    }

    fn with_default_rules(self) -> Self {
        let selector = self.rule(
            |source| matches!(source, DataSource::Stream { .. }),
            PlayerKind::Streaming,
        );
        [PlayerKind::Software, PlayerKind::Midi, PlayerKind::AudioOnly]
            .into_iter()
            .fold(selector, |selector, kind| {
                selector.rule(move |source| default_kind(source) == Some(kind), kind)
            })
    }

    /// Pick the player kind for a source
    pub fn select(&self, source: &DataSource) -> PlayerKind {
        self.rules
            .iter()
            .find(|(predicate, _)| predicate(source))
            .map_or(self.fallback, |(_, kind)| *kind)
    }
}

fn default_kind(source: &DataSource) -> Option<PlayerKind> {
    let extension = source.extension()?;
    DEFAULT_EXTENSIONS.get(extension.as_str()).copied()
}

impl Default for PlayerSelector {
    fn default() -> Self {
        Self::new(PlayerKind::Hardware).with_default_rules()
    }
}
