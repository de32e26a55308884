use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

use crate::content_client::ContentClientError;

/// Token lifetime accepted by the Ghost Admin API (max 5 minutes).
const TOKEN_TTL: Duration = Duration::minutes(5);

/// A parsed Ghost Admin API key.
///
/// Admin keys are issued as `{id}:{secret}` where the secret is hex-encoded.
/// The key signs short-lived HS256 JWTs that authenticate every Admin API
/// request (`Authorization: Ghost <jwt>`).
#[derive(Clone)]
pub struct AdminApiKey {
    key_id: String,
    secret: Vec<u8>,
}

impl AdminApiKey {
    pub fn parse(raw: &str) -> Result<Self, ContentClientError> {
        let (key_id, secret_hex) = raw.split_once(':').ok_or_else(|| {
            ContentClientError::InvalidApiKey("expected 'id:secret' format".to_string())
        })?;

        if key_id.is_empty() {
            return Err(ContentClientError::InvalidApiKey(
                "key id is empty".to_string(),
            ));
        }

        let secret = hex::decode(secret_hex)
            .map_err(|e| ContentClientError::InvalidApiKey(format!("secret is not hex: {}", e)))?;

        Ok(Self {
            key_id: key_id.to_string(),
            secret,
        })
    }

    /// Generate a fresh JWT for the Admin API.
    ///
    /// Tokens are minted per request rather than cached; they expire after
    /// five minutes and minting is a pair of base64 encodes plus one HMAC.
    pub fn generate_token(&self) -> Result<String, ContentClientError> {
        let iat = OffsetDateTime::now_utc();
        let exp = iat + TOKEN_TTL;

        let header = json!({
            "alg": "HS256",
            "typ": "JWT",
            "kid": self.key_id,
        });
        let payload = json!({
            "iat": iat.unix_timestamp(),
            "exp": exp.unix_timestamp(),
            "aud": "/admin/",
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{}.{}", header_b64, payload_b64);

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| ContentClientError::InvalidApiKey(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(AdminApiKey::parse("abcdef0123").is_err());
    }

    #[test]
    fn parse_rejects_non_hex_secret() {
        assert!(AdminApiKey::parse("keyid:nothex!").is_err());
    }

    #[test]
    fn generated_token_has_three_segments() {
        let key = AdminApiKey::parse("6270eee:0123456789abcdef").unwrap();
        let token = key.generate_token().unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn token_payload_carries_admin_audience() {
        let key = AdminApiKey::parse("6270eee:0123456789abcdef").unwrap();
        let token = key.generate_token().unwrap();

        let payload_b64 = token.split('.').nth(1).unwrap();
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(payload["aud"], "/admin/");
        assert!(payload["exp"].as_i64().unwrap() > payload["iat"].as_i64().unwrap());
    }

    #[test]
    fn token_header_carries_key_id() {
        let key = AdminApiKey::parse("6270eee:0123456789abcdef").unwrap();
        let token = key.generate_token().unwrap();

        let header_b64 = token.split('.').next().unwrap();
        let header = URL_SAFE_NO_PAD.decode(header_b64).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header).unwrap();

        assert_eq!(header["kid"], "6270eee");
        assert_eq!(header["alg"], "HS256");
    }
}
