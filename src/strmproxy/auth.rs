//! STRM proxy authentication (§4.7.1). Three modes: `none` (trusted LAN),
//! `apikey` (shared secret), `token` (HMAC-SHA256 over the canonical query
//! parameters, default for WAN deployments). Verification is constant-time
//! via `hmac::Mac::verify_slice`.

use chrono::Utc;
use hex::ToHex;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::StrmProxyAuthMode;
use crate::domain::EpisodeIdentity;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing required auth parameter: {0}")]
    MissingParam(&'static str),
    #[error("signature verification failed")]
    BadSignature,
    #[error("signed URL has expired")]
    Expired,
    #[error("api key mismatch")]
    BadApiKey,
}

/// The query parameters an authenticated STRM request carries, gathered up
/// for signing/verification regardless of whether the request is for
/// `/strm/stream` (episode identity) or `/strm/proxy` (opaque upstream URL).
pub struct SignableParams<'a> {
    pub site: &'a str,
    pub slug: &'a str,
    pub season: i32,
    pub episode: i32,
    pub language: &'a str,
    pub provider: Option<&'a str>,
    pub target_url: Option<&'a str>,
    pub exp: i64,
}

fn canonical_string(params: &SignableParams<'_>) -> String {
    format!(
        "site={}&slug={}&s={}&e={}&lang={}&provider={}&u={}&exp={}",
        params.site,
        params.slug,
        params.season,
        params.episode,
        params.language,
        params.provider.unwrap_or(""),
        params.target_url.unwrap_or(""),
        params.exp,
    )
}

fn hmac_sign(secret: &str, params: &SignableParams<'_>) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(canonical_string(params).as_bytes());
    mac.finalize().into_bytes().encode_hex::<String>()
}

/// Verifies a signature in constant time and rejects an expired `exp`,
/// tolerating `CLOCK_SKEW_TOLERANCE_SECONDS` of clock skew (invariant 8).
pub fn verify_token(secret: &str, params: &SignableParams<'_>, sig_hex: &str) -> Result<(), AuthError> {
    let now = Utc::now().timestamp();
    if params.exp + crate::constants::strm::CLOCK_SKEW_TOLERANCE_SECONDS < now {
        return Err(AuthError::Expired);
    }

    let sig_bytes = hex::decode(sig_hex).map_err(|_| AuthError::BadSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(canonical_string(params).as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| AuthError::BadSignature)
}

/// Constant-time API key comparison (no HMAC needed: both sides already
/// hold the plaintext key, unlike the token scheme's signature check).
#[must_use]
pub fn verify_apikey(configured: &str, provided: &str) -> bool {
    let (a, b) = (configured.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Builds a fully-signed `/strm/stream` URL for the `.strm` file written by
/// the STRM runner in `proxy` mode (§4.6 "strm" step 3).
#[must_use]
pub fn sign_stream_url(
    base_url: &str,
    secret: &str,
    ttl_seconds: i64,
    identity: &EpisodeIdentity,
    provider: Option<&str>,
) -> String {
    let exp = Utc::now().timestamp() + ttl_seconds;
    let params = SignableParams {
        site: identity.site.as_str(),
        slug: &identity.slug,
        season: identity.season,
        episode: identity.episode,
        language: &identity.language,
        provider,
        target_url: None,
        exp,
    };
    let sig = hmac_sign(secret, &params);

    let mut url = format!(
        "{base_url}/strm/stream?site={}&slug={}&s={}&e={}&lang={}&exp={exp}&sig={sig}",
        identity.site.as_str(),
        urlencoding::encode(&identity.slug),
        identity.season,
        identity.episode,
        urlencoding::encode(&identity.language),
    );
    if let Some(p) = provider {
        url.push_str(&format!("&provider={}", urlencoding::encode(p)));
    }
    url
}

/// Signs a child playlist/segment URL for `/strm/proxy?u=...` (§4.7.2).
#[must_use]
pub fn sign_proxy_url(base_url: &str, secret: &str, ttl_seconds: i64, target_url: &str) -> String {
    let exp = Utc::now().timestamp() + ttl_seconds;
    let params = SignableParams {
        site: "",
        slug: "",
        season: 0,
        episode: 0,
        language: "",
        provider: None,
        target_url: Some(target_url),
        exp,
    };
    let sig = hmac_sign(secret, &params);
    format!(
        "{base_url}/strm/proxy?u={}&exp={exp}&sig={sig}",
        urlencoding::encode(target_url)
    )
}

#[must_use]
pub fn mode_requires_signature(mode: StrmProxyAuthMode) -> bool {
    matches!(mode, StrmProxyAuthMode::Token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params(exp: i64) -> SignableParams<'static> {
        SignableParams {
            site: "s_to",
            slug: "9-1-1",
            season: 1,
            episode: 3,
            language: "German Dub",
            provider: Some("VOE"),
            target_url: None,
            exp,
        }
    }

    #[test]
    fn verifies_a_freshly_signed_token() {
        let secret = "top-secret";
        let exp = Utc::now().timestamp() + 900;
        let params = sample_params(exp);
        let sig = hmac_sign(secret, &params);
        assert!(verify_token(secret, &params, &sig).is_ok());
    }

    #[test]
    fn rejects_expired_token() {
        let secret = "top-secret";
        let exp = Utc::now().timestamp() - 3600;
        let params = sample_params(exp);
        let sig = hmac_sign(secret, &params);
        assert_eq!(verify_token(secret, &params, &sig), Err(AuthError::Expired));
    }

    #[test]
    fn rejects_tampered_signature() {
        let secret = "top-secret";
        let exp = Utc::now().timestamp() + 900;
        let params = sample_params(exp);
        let mut sig = hmac_sign(secret, &params);
        sig.replace_range(0..2, "00");
        assert_eq!(verify_token(secret, &params, &sig), Err(AuthError::BadSignature));
    }
}
