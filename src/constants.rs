//! Application-wide constants
//!
//! Centralizes magic values that are used across multiple modules.

/// Video/playlist extensions the prober and STRM writer recognise.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "webm", "mov", "m3u8"];

/// Resolver scoring.
pub mod scoring {
    /// Minimum combined score for the resolver to accept a candidate without
    /// falling back to the suggest API / megakino path.
    pub const CONFIDENCE_FLOOR: f64 = 3.5;

    /// Minimum token F1 before sequence-similarity is allowed to contribute
    /// at all, so it cannot singlehandedly promote an unrelated title.
    pub const SEQUENCE_SIMILARITY_GATE: f64 = 0.2;

    pub const WEIGHT_EXACT: f64 = 4.0;
    pub const WEIGHT_SUBSTRING: f64 = 1.5;
    pub const WEIGHT_TOKEN_F1: f64 = 2.0;
    pub const WEIGHT_TOKEN_PRECISION: f64 = 0.5;
    pub const WEIGHT_TOKEN_RECALL: f64 = 0.5;
    pub const WEIGHT_SEQUENCE: f64 = 1.0;

    /// Stricter threshold used by the specials/alias mapper.
    pub const SPECIAL_CONFIDENCE_FLOOR: f64 = 4.5;
}

/// Default cache TTL / refresh values.
pub mod cache {
    /// Availability cache freshness window (hours).
    pub const AVAILABILITY_TTL_HOURS: i64 = 24;

    /// How old a per-site title index may get before it is rebuilt (hours).
    pub const INDEX_REFRESH_HOURS: i64 = 24;
}

/// Background loop intervals.
pub mod intervals {
    use std::time::Duration;

    /// TTL-cleanup sweep interval.
    pub const CLEANUP_SCAN: Duration = Duration::from_secs(60 * 10);

    /// Progress-persistence debounce: never write more than this often per job.
    pub const PROGRESS_DEBOUNCE: Duration = Duration::from_millis(500);
}

/// Scheduler / worker pool defaults.
pub mod scheduler {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
    pub const DEFAULT_DOWNLOADS_TTL_HOURS: i64 = 24 * 7;
    pub const DEFAULT_CLEANUP_SCAN_MINUTES: u32 = 10;
}

/// STRM reverse proxy defaults.
pub mod strm {
    /// Chunked-streaming write size; must never buffer a full response.
    pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 64 * 1024;

    /// Default signed-URL validity window (seconds).
    pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 15 * 60;

    /// Permitted clock skew when verifying a token's `exp`.
    pub const CLOCK_SKEW_TOLERANCE_SECONDS: i64 = 30;

    /// Upstream statuses that invalidate a cached mapping and trigger one retry.
    pub const REFRESHABLE_STATUSES: &[u16] = &[403, 404, 410, 451, 429];

    /// Tags in an HLS playlist that carry a `URI="..."` attribute.
    pub const URI_BEARING_TAGS: &[&str] = &[
        "EXT-X-KEY",
        "EXT-X-MAP",
        "EXT-X-MEDIA",
        "EXT-X-I-FRAME-STREAM-INF",
        "EXT-X-SESSION-KEY",
        "EXT-X-SESSION-DATA",
        "EXT-X-PRELOAD-HINT",
        "EXT-X-RENDITION-REPORT",
    ];
}

/// Season-search probing guardrails (§4.8).
pub mod torznab {
    pub const DEFAULT_MAX_EPISODES: u32 = 24;
    pub const DEFAULT_MAX_CONSECUTIVE_MISSES: u32 = 3;

    /// Languages probed for each candidate episode when building a release
    /// list; every catalogue site's episode page is a subset of these.
    pub const CANDIDATE_LANGUAGES: &[&str] =
        &["German Dub", "German Sub", "English Sub"];

    /// Torznab category ids advertised in `t=caps` and attached to every item.
    pub const CATEGORY_TV: u32 = 5000;
    pub const CATEGORY_TV_ANIME: u32 = 5070;
}
