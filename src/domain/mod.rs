//! Core domain vocabulary: the tagged enums and value records described in
//! the design notes, in place of the inheritance/duck-typing the source
//! system uses. Nothing here owns state; these are plain values passed
//! around by the engine's top-level types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured streaming catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Aniworld,
    #[serde(rename = "s_to")]
    STo,
    Megakino,
}

impl Site {
    #[must_use]
    pub const fn host(self) -> &'static str {
        match self {
            Self::Aniworld => "aniworld.to",
            Self::STo => "s.to",
            Self::Megakino => "megakino.icu",
        }
    }

    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Aniworld => "https://aniworld.to",
            Self::STo => "https://s.to",
            Self::Megakino => "https://megakino.icu",
        }
    }

    /// Prefix used for magnet query parameters (`aw_*` / `sto_*`).
    #[must_use]
    pub const fn magnet_param_prefix(self) -> &'static str {
        match self {
            Self::Aniworld => "aw",
            Self::STo => "sto",
            // Megakino is search-only and never reaches the magnet codec via
            // its own prefix; it borrows aniworld's for episode identity.
            Self::Megakino => "aw",
        }
    }

    /// Release-group tag used when synthesising a filename.
    #[must_use]
    pub const fn release_group(self) -> &'static str {
        match self {
            Self::Aniworld => "ANIWORLD",
            Self::STo => "STO",
            Self::Megakino => "MEGAKINO",
        }
    }

    #[must_use]
    pub const fn has_alphabet_index(self) -> bool {
        matches!(self, Self::Aniworld | Self::STo)
    }

    #[must_use]
    pub const fn has_suggest_api(self) -> bool {
        matches!(self, Self::STo)
    }

    #[must_use]
    pub const fn has_specials(self) -> bool {
        matches!(self, Self::Aniworld)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aniworld => "aniworld",
            Self::STo => "s_to",
            Self::Megakino => "megakino",
        }
    }

    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::Aniworld, Self::STo, Self::Megakino]
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Site {
    type Err = UnknownSite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aniworld" | "aniworld.to" => Ok(Self::Aniworld),
            "s_to" | "s.to" | "sto" => Ok(Self::STo),
            "megakino" | "megakino.icu" => Ok(Self::Megakino),
            other => Err(UnknownSite(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown catalogue site: {0}")]
pub struct UnknownSite(pub String);

/// What a job runner produces: a media file on disk, or a `.strm` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    Download,
    Strm,
}

impl JobMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Strm => "strm",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Self::Download),
            "strm" => Ok(Self::Strm),
            _ => Err(()),
        }
    }
}

/// A `Job`'s lifecycle state. Transitions are strictly monotonic:
/// `Queued -> Downloading -> {Completed|Failed|Cancelled}`. No variant here
/// may legally be constructed from a terminal one; callers enforce this at
/// the store boundary (see `db::repositories::job`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Downloading | Self::Failed | Self::Cancelled),
            Self::Downloading => {
                matches!(next, Self::Completed | Self::Failed | Self::Cancelled)
            }
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

/// The qBittorrent-facing state derived from `JobStatus` plus façade-only
/// fields (paused). Kept distinct from `JobStatus` because the wire
/// vocabulary (qBittorrent's `state` field) is a foreign contract, not an
/// engine concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTaskState {
    Queued,
    Downloading,
    Paused,
    Completed,
    Error,
}

impl ClientTaskState {
    #[must_use]
    pub const fn as_qbit_state(self) -> &'static str {
        match self {
            Self::Queued => "queuedDL",
            Self::Downloading => "downloading",
            Self::Paused => "pausedDL",
            Self::Completed => "uploading",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn derive(status: JobStatus, paused: bool) -> Self {
        if paused && !status.is_terminal() {
            return Self::Paused;
        }
        match status {
            JobStatus::Queued => Self::Queued,
            JobStatus::Downloading => Self::Downloading,
            JobStatus::Completed => Self::Completed,
            JobStatus::Failed | JobStatus::Cancelled => Self::Error,
        }
    }
}

/// A video-hosting provider that fronts a direct URL for a catalogue
/// episode. A value record, not a trait object: the provider set is small
/// and closed, so a per-site extractor table plus this descriptor is
/// enough to avoid a class hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub base_url: String,
    pub default_languages: Vec<String>,
}

/// What a catalogue site supports. Realised as one record per `Site`
/// instead of a class hierarchy — see design notes.
#[derive(Debug, Clone, Copy)]
pub struct CatalogueCapabilities {
    pub has_index: bool,
    pub has_suggest_api: bool,
    pub has_specials: bool,
    pub has_episode_listing: bool,
}

impl CatalogueCapabilities {
    #[must_use]
    pub const fn for_site(site: Site) -> Self {
        match site {
            Site::Aniworld => Self {
                has_index: true,
                has_suggest_api: false,
                has_specials: true,
                has_episode_listing: true,
            },
            Site::STo => Self {
                has_index: true,
                has_suggest_api: true,
                has_specials: false,
                has_episode_listing: true,
            },
            Site::Megakino => Self {
                has_index: false,
                has_suggest_api: false,
                has_specials: false,
                has_episode_listing: false,
            },
        }
    }
}

/// The tuple that uniquely identifies playable content, per GLOSSARY.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeIdentity {
    pub site: Site,
    pub slug: String,
    pub season: i32,
    pub episode: i32,
    pub language: String,
}

impl EpisodeIdentity {
    #[must_use]
    pub const fn new(site: Site, slug: String, season: i32, episode: i32, language: String) -> Self {
        Self {
            site,
            slug,
            season,
            episode,
            language,
        }
    }
}

impl fmt::Display for EpisodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/S{:02}E{:02}/{}",
            self.site, self.slug, self.season, self.episode, self.language
        )
    }
}
