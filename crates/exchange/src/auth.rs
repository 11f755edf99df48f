//! RSA-PSS request signing for the Kalshi v2 API.
//!
//! Signature format: `RSA-PSS(SHA256, timestamp + METHOD + path + body)`,
//! base64-encoded. The path must not include query parameters; the body is
//! empty for GET requests.

use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;

use common::{Error, Result};

/// API key id plus the parsed RSA private key.
#[derive(Clone)]
pub struct KalshiAuth {
    api_key_id: String,
    signing_key: BlindedSigningKey<Sha256>,
}

impl std::fmt::Debug for KalshiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiAuth")
            .field("api_key_id", &self.api_key_id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl KalshiAuth {
    /// Parse a PEM private key (pkcs1 or pkcs8). The PEM may contain literal
    /// `\n` escapes instead of real newlines; both forms are accepted.
    pub fn new(api_key_id: &str, pem: &str) -> Result<Self> {
        let pem = pem.replace("\\n", "\n");
        let pem = pem.trim();

        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| Error::Auth(format!("Failed to parse RSA private key: {e}")))?;

        Ok(Self {
            api_key_id: api_key_id.to_string(),
            signing_key: BlindedSigningKey::<Sha256>::new(private_key),
        })
    }

    /// Sign one request, returning `(timestamp_ms, base64_signature)`.
    pub fn sign(&self, method: &str, path: &str, body: &str) -> (String, String) {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let path_clean = path.split('?').next().unwrap_or(path);

        let message = format!("{timestamp}{}{path_clean}{body}", method.to_uppercase());
        let mut rng = rand::thread_rng();
        let signature = self.signing_key.sign_with_rng(&mut rng, message.as_bytes());

        let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());
        (timestamp, sig_b64)
    }

    /// Build the authenticated header triple for one request.
    pub fn headers(&self, method: &str, path: &str, body: &str) -> Result<reqwest::header::HeaderMap> {
        let (timestamp, signature) = self.sign(method, path, body);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "KALSHI-ACCESS-KEY",
            self.api_key_id
                .parse()
                .map_err(|_| Error::Auth("API key id is not a valid header value".into()))?,
        );
        headers.insert(
            "KALSHI-ACCESS-TIMESTAMP",
            timestamp
                .parse()
                .map_err(|_| Error::Auth("timestamp is not a valid header value".into()))?,
        );
        headers.insert(
            "KALSHI-ACCESS-SIGNATURE",
            signature
                .parse()
                .map_err(|_| Error::Auth("signature is not a valid header value".into()))?,
        );
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth() -> KalshiAuth {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen failed");
        let pem = rsa::pkcs1::EncodeRsaPrivateKey::to_pkcs1_pem(
            &private_key,
            rsa::pkcs1::LineEnding::LF,
        )
        .expect("pem encode failed");
        KalshiAuth::new("test-key-id", &pem).expect("auth init failed")
    }

    #[test]
    fn sign_produces_numeric_timestamp_and_valid_base64() {
        let auth = test_auth();
        let (ts, sig) = auth.sign("GET", "/trade-api/v2/portfolio/balance", "");

        assert!(ts.parse::<i64>().is_ok(), "timestamp should be numeric");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&sig)
            .expect("signature should be valid base64");
        // RSA-2048 PSS signatures are 256 bytes.
        assert_eq!(decoded.len(), 256);
    }

    #[test]
    fn sign_strips_query_params() {
        let auth = test_auth();
        // Both sign the same base path; each decodes to a 256-byte signature.
        let (_, sig1) = auth.sign("GET", "/trade-api/v2/markets", "");
        let (_, sig2) = auth.sign("GET", "/trade-api/v2/markets?limit=5", "");

        let d1 = base64::engine::general_purpose::STANDARD.decode(&sig1).unwrap();
        let d2 = base64::engine::general_purpose::STANDARD.decode(&sig2).unwrap();
        assert_eq!(d1.len(), 256);
        assert_eq!(d2.len(), 256);
    }

    #[test]
    fn accepts_escaped_newlines_in_pem() {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen failed");
        let pem = rsa::pkcs1::EncodeRsaPrivateKey::to_pkcs1_pem(
            &private_key,
            rsa::pkcs1::LineEnding::LF,
        )
        .expect("pem encode failed");
        let escaped = pem.replace('\n', "\\n");
        assert!(KalshiAuth::new("k", &escaped).is_ok());
    }
}
