//! Provider-specific direct-URL extractors (§4.2, §4.6 step 3). Each
//! extractor takes the embed/redirect URL a catalogue page linked to and
//! resolves it to a direct media or HLS playlist URL. The provider set is
//! small and closed, so a per-provider struct plus this registry replaces a
//! class hierarchy, same as `CatalogueAdapter`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// What an extractor yields: a direct URL plus whatever content-type hint it
/// could read off the embed page, used by the prober to decide whether to
/// treat the result as playable media without a further probe.
#[derive(Debug, Clone)]
pub struct ExtractedStream {
    pub direct_url: String,
    pub content_type_hint: Option<String>,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    fn provider_id(&self) -> &'static str;

    async fn extract(&self, client: &reqwest::Client, embed_url: &str) -> Result<ExtractedStream>;
}

async fn fetch_embed_page(client: &reqwest::Client, embed_url: &str) -> Result<String> {
    let resp = client
        .get(embed_url)
        .timeout(Duration::from_secs(20))
        .send()
        .await
        .with_context(|| format!("embed page request failed: {embed_url}"))?;

    if !resp.status().is_success() {
        bail!("embed page returned {} for {embed_url}", resp.status());
    }

    resp.text()
        .await
        .with_context(|| format!("failed reading embed page body: {embed_url}"))
}

fn first_capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// VOE embeds its direct source as a single quoted URL assigned to a known
/// JS variable on the embed page.
pub struct VoeExtractor;

#[async_trait]
impl Extractor for VoeExtractor {
    fn provider_id(&self) -> &'static str {
        "VOE"
    }

    async fn extract(&self, client: &reqwest::Client, embed_url: &str) -> Result<ExtractedStream> {
        static SOURCE_RE: OnceLock<Regex> = OnceLock::new();
        let re = SOURCE_RE.get_or_init(|| {
            Regex::new(r#"(?:'hls'|"hls"|sources\s*:\s*\[)\s*[:=]?\s*['"]([^'"]+\.(?:m3u8|mp4)[^'"]*)['"]"#)
                .expect("static regex compiles")
        });

        let html = fetch_embed_page(client, embed_url).await?;
        let direct_url = first_capture(re, &html)
            .with_context(|| format!("no direct source found on VOE embed {embed_url}"))?;

        Ok(ExtractedStream {
            direct_url,
            content_type_hint: None,
        })
    }
}

/// Filemoon embeds a packed-JS player config; the direct `file:` URL survives
/// unpacking as a plain string literal.
pub struct FilemoonExtractor;

#[async_trait]
impl Extractor for FilemoonExtractor {
    fn provider_id(&self) -> &'static str {
        "Filemoon"
    }

    async fn extract(&self, client: &reqwest::Client, embed_url: &str) -> Result<ExtractedStream> {
        static SOURCE_RE: OnceLock<Regex> = OnceLock::new();
        let re = SOURCE_RE
            .get_or_init(|| Regex::new(r#"file\s*:\s*["']([^"']+\.m3u8[^"']*)["']"#).expect("static regex compiles"));

        let html = fetch_embed_page(client, embed_url).await?;
        let direct_url = first_capture(re, &html)
            .with_context(|| format!("no direct source found on Filemoon embed {embed_url}"))?;

        Ok(ExtractedStream {
            direct_url,
            content_type_hint: Some("application/vnd.apple.mpegurl".to_string()),
        })
    }
}

/// Best-effort fallback for providers without a dedicated extractor: scans
/// the embed page for the first `.m3u8` or `.mp4` URL literal it can find.
pub struct GenericExtractor {
    pub id: &'static str,
}

#[async_trait]
impl Extractor for GenericExtractor {
    fn provider_id(&self) -> &'static str {
        self.id
    }

    async fn extract(&self, client: &reqwest::Client, embed_url: &str) -> Result<ExtractedStream> {
        static ANY_MEDIA_RE: OnceLock<Regex> = OnceLock::new();
        let re = ANY_MEDIA_RE.get_or_init(|| {
            Regex::new(r#"https?://[^\s"'<>]+\.(?:m3u8|mp4)(?:\?[^\s"'<>]*)?"#)
                .expect("static regex compiles")
        });

        let html = fetch_embed_page(client, embed_url).await?;
        let direct_url = re
            .find(&html)
            .map(|m| m.as_str().to_string())
            .with_context(|| format!("no media URL found on embed {embed_url}"))?;

        Ok(ExtractedStream {
            direct_url,
            content_type_hint: None,
        })
    }
}

/// Provider-id keyed lookup table. Unknown providers fall back to
/// `GenericExtractor` rather than failing outright, since the catalogue
/// sites add providers faster than a dedicated extractor can be written.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn Extractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut extractors: HashMap<String, Box<dyn Extractor>> = HashMap::new();
        extractors.insert("voe".to_string(), Box::new(VoeExtractor));
        extractors.insert("filemoon".to_string(), Box::new(FilemoonExtractor));
        Self { extractors }
    }
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, provider_id: &str) -> &dyn Extractor {
        self.extractors
            .get(&provider_id.to_lowercase())
            .map(std::convert::AsRef::as_ref)
            .unwrap_or(&GenericFallback)
    }
}

struct GenericFallback;

#[async_trait]
impl Extractor for GenericFallback {
    fn provider_id(&self) -> &'static str {
        "generic"
    }

    async fn extract(&self, client: &reqwest::Client, embed_url: &str) -> Result<ExtractedStream> {
        GenericExtractor { id: "generic" }.extract(client, embed_url).await
    }
}
