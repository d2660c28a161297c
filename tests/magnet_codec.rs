use anibridge::domain::{EpisodeIdentity, JobMode, Site};
use anibridge::magnet::{self, MagnetError, MagnetPayload};

fn naruto_identity() -> EpisodeIdentity {
    EpisodeIdentity::new(Site::Aniworld, "naruto".to_string(), 1, 1, "German Dub".to_string())
}

#[test]
fn encodes_a_download_magnet_clients_can_decode_back() {
    let payload = MagnetPayload {
        identity: naruto_identity(),
        provider: Some("VOE".to_string()),
        mode: JobMode::Download,
        display_name: "Naruto.S01E01.1080p.WEB.H264.GER-ANIWORLD".to_string(),
        size_bytes: 900_000_000,
        absolute_number: None,
    };

    let encoded = magnet::encode(&payload);
    assert!(encoded.starts_with("magnet:?xt=urn:btih:"));
    assert!(encoded.contains("aw_slug=naruto"));
    assert!(encoded.contains("aw_s=1"));
    assert!(encoded.contains("aw_e=1"));
    assert!(encoded.contains("aw_site=aniworld.to"));
    assert!(encoded.contains("aw_provider=VOE"));
    assert!(!encoded.contains("aw_mode=strm"));

    let decoded = magnet::decode(&encoded).expect("round trips");
    assert_eq!(decoded, payload);
}

#[test]
fn download_and_strm_variants_of_the_same_episode_hash_differently() {
    let download = MagnetPayload {
        identity: naruto_identity(),
        provider: Some("VOE".to_string()),
        mode: JobMode::Download,
        display_name: "Naruto.S01E01".to_string(),
        size_bytes: 900_000_000,
        absolute_number: None,
    };
    let strm = MagnetPayload { mode: JobMode::Strm, ..download.clone() };

    let dl_hash = magnet::decode(&magnet::encode(&download)).unwrap();
    let strm_hash = magnet::decode(&magnet::encode(&strm)).unwrap();

    let dl_infohash = magnet::derive_infohash(&dl_hash.identity, dl_hash.provider.as_deref(), dl_hash.mode);
    let strm_infohash = magnet::derive_infohash(&strm_hash.identity, strm_hash.provider.as_deref(), strm_hash.mode);
    assert_ne!(dl_infohash, strm_infohash);
    assert!(magnet::encode(&strm).contains("aw_mode=strm"));
}

#[test]
fn s_to_magnets_use_the_sto_prefix_and_carry_the_absolute_number() {
    let payload = MagnetPayload {
        identity: EpisodeIdentity::new(Site::STo, "9-1-1".to_string(), 1, 3, "German Dub".to_string()),
        provider: None,
        mode: JobMode::Strm,
        display_name: "9-1-1.S01E03.1080p.WEB.H264.GER-STO".to_string(),
        size_bytes: 700_000_000,
        absolute_number: Some(15),
    };

    let encoded = magnet::encode(&payload);
    assert!(encoded.contains("sto_slug=9-1-1"));
    assert!(encoded.contains("sto_abs=15"));
    assert!(!encoded.contains("aw_"));

    let decoded = magnet::decode(&encoded).expect("round trips");
    assert_eq!(decoded, payload);
}

#[test]
fn a_magnet_naming_neither_prefix_is_rejected_as_ambiguous() {
    let bogus = "magnet:?xt=urn:btih:0000000000000000000000000000000000000000&dn=mystery";
    assert!(matches!(magnet::decode(bogus), Err(MagnetError::Ambiguous)));
}

#[test]
fn a_non_magnet_uri_is_rejected_outright() {
    assert!(matches!(
        magnet::decode("https://aniworld.to/anime/stream/naruto"),
        Err(MagnetError::NotAMagnet)
    ));
}
