use anibridge::strmproxy::auth::sign_proxy_url;
use anibridge::strmproxy::hls::{is_hls_playlist, rewrite_playlist};
use url::Url;

const SECRET: &str = "hls-test-secret";
const BASE_URL: &str = "http://localhost:9696";

fn playlist_url() -> Url {
    Url::parse("https://upstream.example/hls/master.m3u8").unwrap()
}

fn sign(resolved: &str) -> String {
    sign_proxy_url(BASE_URL, SECRET, 900, resolved)
}

#[test]
fn a_master_playlist_is_recognised_by_its_magic_bytes_before_any_rewrite() {
    let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/playlist.m3u8\n";
    assert!(is_hls_playlist(None, body.as_bytes()));
    assert!(is_hls_playlist(Some("application/vnd.apple.mpegurl"), b"not actually a playlist"));
    assert!(!is_hls_playlist(Some("video/mp4"), b"\x00\x00\x00\x18ftyp"));
}

#[test]
fn variant_playlist_lines_are_replaced_with_signed_proxy_urls_and_tags_are_untouched() {
    let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1920x1080\nlow/playlist.m3u8\n";

    let out = rewrite_playlist(&playlist_url(), body, sign);

    assert!(out.contains("#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1920x1080"));
    assert!(!out.contains("low/playlist.m3u8"));

    let signed_line = out.lines().last().unwrap();
    assert!(signed_line.starts_with(&format!("{BASE_URL}/strm/proxy?u=")));
    assert!(signed_line.contains("&sig="));
    assert!(signed_line.contains(&urlencoding::encode("https://upstream.example/hls/low/playlist.m3u8").into_owned()));
}

#[test]
fn a_uri_bearing_tag_gets_its_attribute_rewritten_while_other_attributes_survive() {
    let body = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x1234\n";

    let out = rewrite_playlist(&playlist_url(), body, sign);

    assert!(out.contains("METHOD=AES-128"));
    assert!(out.contains("IV=0x1234"));
    assert!(out.contains(&format!("URI=\"{BASE_URL}/strm/proxy?u=")));
    assert!(!out.contains("URI=\"key.bin\""));
}

#[test]
fn rewriting_preserves_byte_identical_non_uri_content_and_line_endings() {
    let body = "#EXTM3U\r\n#EXT-X-VERSION:3\r\n#EXT-X-TARGETDURATION:6\r\n#EXTINF:6.0,\r\nseg0.ts\r\n";

    let out = rewrite_playlist(&playlist_url(), body, sign);

    assert!(out.contains("#EXT-X-VERSION:3\r\n"));
    assert!(out.contains("#EXT-X-TARGETDURATION:6\r\n"));
    assert!(out.contains("#EXTINF:6.0,\r\n"));
    assert!(out.ends_with("\r\n"));
    assert!(!out.contains("seg0.ts\r\n"));
}

#[test]
fn every_segment_line_in_a_media_playlist_gets_its_own_signed_url() {
    let body = "#EXTM3U\n#EXTINF:4.0,\nsegment0.ts\n#EXTINF:4.0,\nsegment1.ts\n";
    let out = rewrite_playlist(&playlist_url(), body, sign);

    let signed_lines: Vec<&str> = out.lines().filter(|l| l.starts_with(BASE_URL)).collect();
    assert_eq!(signed_lines.len(), 2);
    assert_ne!(signed_lines[0], signed_lines[1]);
}
