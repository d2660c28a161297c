//! Out-of-process media inspection, used by the availability prober to
//! attach resolution/codec metadata to a probed episode without decoding any
//! video itself. A thin `ffprobe` wrapper, shaped like a typical
//! `services::media::MediaService`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

pub use crate::models::media::MediaInfo;

pub struct MediaAnalyzer;

impl Default for MediaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaAnalyzer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs `ffprobe` against a local file and extracts the fields the
    /// resolver/quality-label code needs. Errors (missing binary, no video
    /// stream) propagate to the caller, which treats them as a failed probe
    /// rather than a hard error.
    pub fn analyze(&self, path: &Path) -> Result<MediaInfo> {
        let output = ffprobe::ffprobe(path)
            .with_context(|| format!("ffprobe failed on {}", path.display()))?;

        let video_stream = output
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .context("no video stream found")?;

        let resolution_width = video_stream.width.unwrap_or(0);
        let resolution_height = video_stream.height.unwrap_or(0);
        let video_codec = video_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let duration_secs = output
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .or_else(|| {
                video_stream
                    .duration
                    .as_ref()
                    .and_then(|d| d.parse::<f64>().ok())
            })
            .unwrap_or(0.0);

        let audio_codecs: Vec<String> = output
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .filter_map(|s| s.codec_name.clone())
            .collect();

        debug!(
            path = %path.display(),
            resolution_width,
            resolution_height,
            video_codec = %video_codec,
            duration_secs,
            "probed media file"
        );

        Ok(MediaInfo {
            resolution_width,
            resolution_height,
            video_codec,
            audio_codecs,
            duration_secs,
        })
    }

    /// Runs `ffprobe` directly against a remote URL without downloading it,
    /// used by the prober to read quality metadata off a just-extracted
    /// direct/HLS URL (§4.2: "inspects the resulting stream metadata...
    /// using an out-of-process media analyser").
    pub fn analyze_url(&self, url: &str) -> Result<MediaInfo> {
        self.analyze(Path::new(url))
    }
}
