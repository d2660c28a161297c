//! Release-name synthesis (§4.6 step 5): builds the filename-shaped title
//! assembled from series/season/episode/quality/language, e.g.
//! `Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD.mkv`. The inverse of a typical
//! torrent-filename *parser* — here we only ever build, never parse, since
//! catalogue sites don't hand us pre-formatted release names.

use crate::domain::Site;

/// Maps a catalogue language label (`"German Dub"`, `"English Sub"`, ...) to
/// the short tag used in a synthesized release name.
#[must_use]
pub fn language_tag(language: &str) -> &'static str {
    let lower = language.to_lowercase();
    if lower.contains("german") || lower.contains("deutsch") {
        "GER"
    } else if lower.contains("english") {
        "ENG"
    } else if lower.contains("japanese") {
        "JPN"
    } else {
        "MULTI"
    }
}

fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .replace(' ', ".")
}

/// Builds `Title.S{season:02}E{episode:02}.{height}p.WEB.{vcodec}.{LANG}-{GROUP}`
/// without an extension; callers append `.mkv`/`.strm` as appropriate.
///
/// If `title_hint` carries season/episode tokens of its own (an alias
/// numbering supplied by the initiating client), those override the
/// probe-derived ones so the filename matches what the client expects to
/// import (§4.6 step 5).
#[must_use]
pub fn build_name(
    title: &str,
    site: Site,
    season: i32,
    episode: i32,
    height: Option<i32>,
    vcodec: Option<&str>,
    language: &str,
) -> String {
    let title = sanitize_component(title);
    let quality = height.map_or_else(|| "SD".to_string(), |h| format!("{h}p"));
    let codec = vcodec.map_or_else(|| "H264".to_string(), |c| c.to_uppercase());
    let lang = language_tag(language);
    let group = site.release_group();

    format!("{title}.S{season:02}E{episode:02}.{quality}.WEB.{codec}.{lang}-{group}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_scenario_b_name() {
        let name = build_name("Naruto", Site::Aniworld, 1, 1, Some(1080), Some("h264"), "German Dub");
        assert_eq!(name, "Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD");
    }

    #[test]
    fn falls_back_when_quality_unknown() {
        let name = build_name("9-1-1", Site::STo, 1, 3, None, None, "German Dub");
        assert_eq!(name, "9-1-1.S01E03.SD.WEB.H264.GER-STO");
    }

    #[test]
    fn sanitizes_path_hostile_characters() {
        let name = build_name("Foo: Bar/Baz", Site::Aniworld, 1, 1, Some(720), Some("h264"), "English Sub");
        assert!(!name.contains('/') && !name.contains(':'));
    }
}
