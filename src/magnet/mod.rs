//! Synthetic BitTorrent-magnet codec (§4.3). No swarm is ever joined; the
//! magnet string is only a transport between the Torznab and qBittorrent
//! façades, carrying an `EpisodeIdentity` plus job-mode across the wire.

use sha1::{Digest, Sha1};
use std::collections::HashMap;

use crate::domain::{EpisodeIdentity, JobMode, Site};

#[derive(Debug, thiserror::Error)]
pub enum MagnetError {
    #[error("not a magnet URI")]
    NotAMagnet,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {0}: {1}")]
    InvalidField(&'static str, String),
    #[error("unknown or ambiguous payload")]
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetPayload {
    pub identity: EpisodeIdentity,
    pub provider: Option<String>,
    pub mode: JobMode,
    pub display_name: String,
    pub size_bytes: u64,
    pub absolute_number: Option<i32>,
}

/// Deterministic 40-hex digest of the identity tuple. Distinct `mode`s (and
/// thus distinct job lineages) always yield distinct hashes, per invariant 4.
#[must_use]
pub fn derive_infohash(
    identity: &EpisodeIdentity,
    provider: Option<&str>,
    mode: JobMode,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(identity.site.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(identity.slug.as_bytes());
    hasher.update(b"\0");
    hasher.update(identity.season.to_le_bytes());
    hasher.update(identity.episode.to_le_bytes());
    hasher.update(identity.language.as_bytes());
    hasher.update(b"\0");
    hasher.update(provider.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(mode.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

#[must_use]
pub fn encode(payload: &MagnetPayload) -> String {
    let prefix = payload.identity.site.magnet_param_prefix();
    let infohash = derive_infohash(
        &payload.identity,
        payload.provider.as_deref(),
        payload.mode,
    );

    let mut qs = vec![
        format!("xt=urn:btih:{infohash}"),
        format!("dn={}", urlencoding::encode(&payload.display_name)),
        format!("xl={}", payload.size_bytes),
        format!(
            "{prefix}_slug={}",
            urlencoding::encode(&payload.identity.slug)
        ),
        format!("{prefix}_s={}", payload.identity.season),
        format!("{prefix}_e={}", payload.identity.episode),
        format!(
            "{prefix}_lang={}",
            urlencoding::encode(&payload.identity.language)
        ),
        format!("{prefix}_site={}", payload.identity.site.host()),
    ];

    if let Some(provider) = &payload.provider {
        qs.push(format!("{prefix}_provider={}", urlencoding::encode(provider)));
    }
    if payload.mode == JobMode::Strm {
        qs.push(format!("{prefix}_mode=strm"));
    }
    if let Some(abs) = payload.absolute_number {
        qs.push(format!("{prefix}_abs={abs}"));
    }

    format!("magnet:?{}", qs.join("&"))
}

pub fn decode(magnet: &str) -> Result<MagnetPayload, MagnetError> {
    let rest = magnet
        .strip_prefix("magnet:?")
        .ok_or(MagnetError::NotAMagnet)?;

    let mut fields: HashMap<String, String> = HashMap::new();
    for pair in rest.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let decoded = urlencoding::decode(v)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| v.to_string());
        fields.insert(k.to_string(), decoded);
    }

    let xt = fields
        .get("xt")
        .ok_or(MagnetError::MissingField("xt"))?;
    let infohash = xt
        .strip_prefix("urn:btih:")
        .ok_or_else(|| MagnetError::InvalidField("xt", xt.clone()))?;
    if infohash.len() != 40 || !infohash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MagnetError::InvalidField("xt", xt.clone()));
    }

    let prefix = if fields.keys().any(|k| k.starts_with("sto_")) {
        "sto"
    } else if fields.keys().any(|k| k.starts_with("aw_")) {
        "aw"
    } else {
        return Err(MagnetError::Ambiguous);
    };

    let field = |name: &'static str| -> Result<&String, MagnetError> {
        fields
            .get(&format!("{prefix}_{name}"))
            .ok_or(MagnetError::MissingField(name))
    };

    let slug = field("slug")?.clone();
    let season: i32 = field("s")?
        .parse()
        .map_err(|_| MagnetError::InvalidField("s", field("s").unwrap().clone()))?;
    let episode: i32 = field("e")?
        .parse()
        .map_err(|_| MagnetError::InvalidField("e", field("e").unwrap().clone()))?;
    let language = field("lang")?.clone();
    let site_host = field("site")?.clone();
    let site: Site = site_host
        .parse()
        .map_err(|_| MagnetError::InvalidField("site", site_host.clone()))?;

    let provider = fields.get(&format!("{prefix}_provider")).cloned();
    let mode = match fields.get(&format!("{prefix}_mode")).map(String::as_str) {
        Some("strm") => JobMode::Strm,
        Some(other) => return Err(MagnetError::InvalidField("mode", other.to_string())),
        None => JobMode::Download,
    };
    let absolute_number = fields
        .get(&format!("{prefix}_abs"))
        .map(|v| v.parse::<i32>())
        .transpose()
        .map_err(|_| MagnetError::InvalidField("abs", "not an integer".to_string()))?;

    let display_name = fields.get("dn").cloned().unwrap_or_default();
    let size_bytes = fields
        .get("xl")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MagnetPayload {
        identity: EpisodeIdentity::new(site, slug, season, episode, language),
        provider,
        mode,
        display_name,
        size_bytes,
        absolute_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mode: JobMode) -> MagnetPayload {
        MagnetPayload {
            identity: EpisodeIdentity::new(
                Site::Aniworld,
                "naruto".to_string(),
                1,
                1,
                "German Dub".to_string(),
            ),
            provider: Some("VOE".to_string()),
            mode,
            display_name: "Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD".to_string(),
            size_bytes: 512_000_000,
            absolute_number: None,
        }
    }

    #[test]
    fn round_trips() {
        let payload = sample(JobMode::Download);
        let encoded = encode(&payload);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn download_and_strm_hashes_differ() {
        let dl = derive_infohash(&sample(JobMode::Download).identity, Some("VOE"), JobMode::Download);
        let strm = derive_infohash(&sample(JobMode::Strm).identity, Some("VOE"), JobMode::Strm);
        assert_ne!(dl, strm);
    }

    #[test]
    fn rejects_non_magnet() {
        assert!(matches!(decode("https://example.com"), Err(MagnetError::NotAMagnet)));
    }

    #[test]
    fn rejects_ambiguous_payload() {
        let bogus = "magnet:?xt=urn:btih:0000000000000000000000000000000000000000&dn=x";
        assert!(matches!(decode(bogus), Err(MagnetError::Ambiguous)));
    }

    #[test]
    fn sto_prefix_round_trips() {
        let payload = MagnetPayload {
            identity: EpisodeIdentity::new(
                Site::STo,
                "9-1-1".to_string(),
                1,
                3,
                "German Dub".to_string(),
            ),
            provider: None,
            mode: JobMode::Strm,
            display_name: "9-1-1.S01E03.1080p.WEB.H264.GER-STO".to_string(),
            size_bytes: 900_000_000,
            absolute_number: Some(15),
        };
        let encoded = encode(&payload);
        assert!(encoded.contains("sto_slug=9-1-1"));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }
}
