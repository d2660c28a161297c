//! HLS playlist rewriting (§4.7.2). Detects whether a response body is an
//! `#EXTM3U` playlist; if so, every URI it references (a bare line or a
//! `URI="..."` attribute on one of `URI_BEARING_TAGS`) is replaced with a
//! signed `/strm/proxy` URL resolved against the playlist's own address, so
//! players never see or follow an upstream URL directly. Anything else
//! passes through unchanged.

use url::Url;

use crate::constants::strm::URI_BEARING_TAGS;

#[must_use]
pub fn is_hls_playlist(content_type: Option<&str>, body: &[u8]) -> bool {
    let looks_like_m3u8 = content_type
        .map(|ct| ct.contains("mpegurl") || ct.contains("x-mpegURL"))
        .unwrap_or(false);
    looks_like_m3u8 || body.starts_with(b"#EXTM3U")
}

/// Resolves `reference` (absolute or relative) against the playlist's own
/// URL, the way a player would.
fn resolve_uri(playlist_url: &Url, reference: &str) -> Option<Url> {
    playlist_url.join(reference).ok()
}

/// Rewrites every URI in an HLS playlist to a signed proxy URL. `sign` maps
/// a resolved absolute URL to the public URL a player should fetch instead
/// (loop prevention: `sign` must refuse to re-sign a URL that is already
/// one of this bridge's own `/strm/proxy` URLs, per invariant 9).
pub fn rewrite_playlist(playlist_url: &Url, body: &str, mut sign: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(body.len());

    for line in body.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(c) => (c, "\n"),
            None => (line, ""),
        };
        let trimmed = content.trim_end_matches('\r');
        let trailing_cr = if trimmed.len() != content.len() { "\r" } else { "" };

        if let Some(tag_body) = trimmed.strip_prefix('#') {
            if let Some(rewritten) = rewrite_tag_line(playlist_url, tag_body, &mut sign) {
                out.push('#');
                out.push_str(&rewritten);
                out.push_str(trailing_cr);
                out.push_str(newline);
                continue;
            }
            out.push_str(content);
            out.push_str(newline);
            continue;
        }

        if trimmed.is_empty() {
            out.push_str(content);
            out.push_str(newline);
            continue;
        }

        // A bare (non-comment, non-tag) line is a segment or variant-playlist URI.
        match resolve_uri(playlist_url, trimmed) {
            Some(resolved) => {
                out.push_str(&sign(resolved.as_str()));
                out.push_str(trailing_cr);
                out.push_str(newline);
            }
            None => {
                out.push_str(content);
                out.push_str(newline);
            }
        }
    }

    out
}

/// Rewrites the `URI="..."` attribute of a tag line, if its tag is one of
/// `URI_BEARING_TAGS`. Returns `None` (caller keeps the line verbatim) for
/// any other tag.
fn rewrite_tag_line(playlist_url: &Url, tag_body: &str, sign: &mut impl FnMut(&str) -> String) -> Option<String> {
    let tag_name = tag_body.split(':').next().unwrap_or(tag_body);
    if !URI_BEARING_TAGS.contains(&tag_name) {
        return None;
    }

    let uri_attr_start = tag_body.find("URI=\"")?;
    let value_start = uri_attr_start + "URI=\"".len();
    let value_end = value_start + tag_body[value_start..].find('"')?;
    let reference = &tag_body[value_start..value_end];

    let resolved = resolve_uri(playlist_url, reference)?;
    let signed = sign(resolved.as_str());

    let mut rewritten = String::with_capacity(tag_body.len());
    rewritten.push_str(&tag_body[..value_start]);
    rewritten.push_str(&signed);
    rewritten.push_str(&tag_body[value_end..]);
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_url() -> Url {
        Url::parse("https://upstream.example/hls/master.m3u8").unwrap()
    }

    #[test]
    fn detects_playlist_by_magic_bytes() {
        assert!(is_hls_playlist(None, b"#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(!is_hls_playlist(Some("video/mp4"), b"\x00\x00\x00\x18ftyp"));
    }

    #[test]
    fn rewrites_bare_segment_lines() {
        let body = "#EXTM3U\n#EXTINF:4.0,\nsegment0.ts\nsegment1.ts\n";
        let out = rewrite_playlist(&playlist_url(), body, |u| format!("SIGNED({u})"));
        assert!(out.contains("SIGNED(https://upstream.example/hls/segment0.ts)"));
        assert!(out.contains("SIGNED(https://upstream.example/hls/segment1.ts)"));
        assert!(out.contains("#EXTINF:4.0,"));
    }

    #[test]
    fn rewrites_uri_bearing_tag_attribute() {
        let body = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x1234\n";
        let out = rewrite_playlist(&playlist_url(), body, |u| format!("SIGNED({u})"));
        assert!(out.contains("URI=\"SIGNED(https://upstream.example/hls/key.bin)\""));
        assert!(out.contains("IV=0x1234"));
    }

    #[test]
    fn leaves_unrelated_tags_untouched() {
        let body = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n";
        let out = rewrite_playlist(&playlist_url(), body, |u| format!("SIGNED({u})"));
        assert_eq!(out, body);
    }
}
