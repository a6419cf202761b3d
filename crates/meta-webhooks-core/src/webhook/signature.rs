//! HMAC-SHA256 signature verification of the raw request body.

use crate::error::VerificationError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature unless configured otherwise.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Length of the `sha256=` algorithm prefix that precedes the hex digest.
const SIGNATURE_PREFIX_LEN: usize = 7;
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies `sha256=<hex>` signatures against a shared app secret.
///
/// An empty secret disables verification.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Zeroizing<Vec<u8>>,
    header_name: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            header_name: DEFAULT_SIGNATURE_HEADER.to_string(),
        }
    }

    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Check `signature` (the header value, if any) against `body`.
    ///
    /// Only the part after the first seven bytes is compared; the algorithm
    /// prefix itself is not inspected.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), VerificationError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let signature = match signature {
            Some(value) if !value.is_empty() => value.as_bytes(),
            _ => {
                return Err(VerificationError::MissingSignature {
                    header: self.header_name.clone(),
                })
            }
        };

        if signature.len() <= SIGNATURE_PREFIX_LEN {
            return Err(VerificationError::SignatureMismatch);
        }

        let expected = hex::encode(self.digest(body));
        let provided = &signature[SIGNATURE_PREFIX_LEN..];

        if provided.ct_eq(expected.as_bytes()).into() {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }

    /// Header value the platform would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        format!("{}{}", SIGNATURE_PREFIX, hex::encode(self.digest(body)))
    }

    fn digest(&self, body: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<REDACTED>")
            .field("header_name", &self.header_name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
