//! Torznab XML rendering. Hand-templated rather than built through
//! `quick_xml`'s serde layer: the response shape is a handful of fixed
//! elements, and `quick_xml::escape::escape` is enough to keep every
//! user-derived string (titles, error messages) safely embedded.

use quick_xml::escape::escape;

use crate::constants::torznab::{CATEGORY_TV, CATEGORY_TV_ANIME};

use super::ReleaseItem;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// `t=caps` response: the fixed category set and supported search params.
#[must_use]
pub fn render_caps() -> String {
    format!(
        r#"{XML_DECL}
<caps>
  <server version="1.0" title="AniBridge"/>
  <limits max="100" default="50"/>
  <searching>
    <search available="yes" supportedParams="q"/>
    <tv-search available="yes" supportedParams="q,season,ep,tvdbid,tmdbid,imdbid,rid,tvmazeid"/>
    <movie-search available="no" supportedParams="q"/>
  </searching>
  <categories>
    <category id="{CATEGORY_TV}" name="TV">
      <subcat id="{CATEGORY_TV_ANIME}" name="Anime"/>
    </category>
  </categories>
</caps>"#
    )
}

/// `t=search`/`t=tvsearch` success response: one `<item>` per release.
#[must_use]
pub fn render_rss(items: &[ReleaseItem]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str(&render_item(item));
    }

    format!(
        r#"{XML_DECL}
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
<channel>
<title>AniBridge</title>
<description>AniBridge Torznab indexer</description>
{body}</channel>
</rss>"#
    )
}

fn render_item(item: &ReleaseItem) -> String {
    let title = escape(&item.title);
    let magnet = escape(&item.magnet);
    let language = escape(&item.language);
    let (seeders, peers) = synthetic_swarm_attrs(item);

    let mut attrs = format!(
        r#"<torznab:attr name="category" value="{CATEGORY_TV_ANIME}"/>
<torznab:attr name="infohash" value="{}"/>
<torznab:attr name="seeders" value="{seeders}"/>
<torznab:attr name="peers" value="{peers}"/>
<torznab:attr name="language" value="{language}"/>
"#,
        item.infohash
    );
    if let Some(n) = item.absolute_number {
        attrs.push_str(&format!(r#"<torznab:attr name="absoluteNumber" value="{n}"/>"#));
        attrs.push('\n');
    }
    if item.fallback {
        attrs.push_str(r#"<torznab:attr name="anibridgeFallback" value="true"/>"#);
        attrs.push('\n');
    }

    format!(
        r#"<item>
<title>{title}</title>
<guid isPermaLink="false">{}</guid>
<link>{magnet}</link>
<enclosure url="{magnet}" length="{}" type="application/x-bittorrent"/>
<category>{CATEGORY_TV}</category>
{attrs}</item>
"#,
        item.infohash, item.size_bytes
    )
}

/// Deterministic-looking but non-authoritative seeder/peer counts: derived
/// from the infohash so repeated renders of the same item are stable.
fn synthetic_swarm_attrs(item: &ReleaseItem) -> (u32, u32) {
    let seed = item
        .infohash
        .as_bytes()
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(*b)));
    (3 + seed % 12, seed % 4)
}

/// Torznab error element (§6: `400` for bad parameters, `401` for a bad
/// apikey). The HTTP status itself is set by the caller.
#[must_use]
pub fn render_error(code: u16, description: &str) -> String {
    format!(
        r#"{XML_DECL}
<error code="{code}" description="{}"/>"#,
        escape(description)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobMode;

    fn sample_item() -> ReleaseItem {
        ReleaseItem {
            title: "Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD".to_string(),
            magnet: "magnet:?xt=urn:btih:0000000000000000000000000000000000000000".to_string(),
            size_bytes: 900_000_000,
            infohash: "0000000000000000000000000000000000000000".to_string(),
            language: "German Dub".to_string(),
            absolute_number: Some(13),
            fallback: false,
        }
    }

    #[test]
    fn caps_lists_required_search_params() {
        let caps = render_caps();
        assert!(caps.contains("tvdbid"));
        assert!(caps.contains("tvmazeid"));
    }

    #[test]
    fn rss_item_carries_infohash_and_magnet() {
        let item = sample_item();
        let rss = render_rss(std::slice::from_ref(&item));
        assert!(rss.contains(&item.infohash));
        assert!(rss.contains("torznab:attr name=\"infohash\""));
        assert!(rss.contains("absoluteNumber"));
        let _ = JobMode::Download;
    }

    #[test]
    fn error_escapes_description() {
        let xml = render_error(400, "bad <param>");
        assert!(xml.contains("&lt;param&gt;"));
    }
}
