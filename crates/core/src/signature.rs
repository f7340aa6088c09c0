//! Request body signing and verification.
//!
//! A request is authentic iff the caller-supplied tag equals the base64
//! HMAC-SHA1 of the raw body keyed by the host's shared secret. Existing
//! clients compute exactly this tag, so the algorithm is fixed. Only the body
//! is covered, so URL decoration never changes the outcome.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{INVALID_SIGNATURE, MISSING_SIGNATURE};

type HmacSha1 = Hmac<Sha1>;

/// The process-wide signing secret.
///
/// `Debug` is redacted so the value cannot leak through structured logs.
#[derive(Clone)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Why a request failed the authenticity gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("No signature.")]
    Missing,

    #[error("Invalid Signature.")]
    Mismatch,
}

impl SignatureError {
    /// Stable JSON-RPC code reported to the caller.
    pub fn code(self) -> i64 {
        match self {
            Self::Missing => MISSING_SIGNATURE,
            Self::Mismatch => INVALID_SIGNATURE,
        }
    }
}

/// Verifies request signatures against a fixed secret.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SharedSecret,
}

impl Authenticator {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    fn mac(&self, body: &[u8]) -> HmacSha1 {
        let mut mac =
            HmacSha1::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        mac
    }

    /// Compute the base64 tag a trusted caller would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        STANDARD.encode(self.mac(body).finalize().into_bytes())
    }

    /// Check `supplied` against the tag for `body`.
    ///
    /// A tag that is not valid base64 is a mismatch, not a missing tag.
    pub fn verify(&self, body: &[u8], supplied: Option<&str>) -> Result<(), SignatureError> {
        let supplied = supplied.ok_or(SignatureError::Missing)?;
        let tag = STANDARD
            .decode(supplied.trim())
            .map_err(|_| SignatureError::Mismatch)?;
        self.mac(body)
            .verify_slice(&tag)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// One-shot form of [`Authenticator::verify`].
pub fn verify(raw_body: &[u8], supplied_tag: &str, secret: &SharedSecret) -> bool {
    Authenticator::new(secret.clone())
        .verify(raw_body, Some(supplied_tag))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn auth() -> Authenticator {
        Authenticator::new(SharedSecret::new("ip-10-0-0-12.ec2.internal"))
    }

    #[test]
    fn signed_body_verifies() {
        let body = br#"{"jsonrpc":"2.0","id":0,"method":"ping"}"#;
        let tag = auth().sign(body);
        assert_eq!(auth().verify(body, Some(&tag)), Ok(()));
        assert!(verify(body, &tag, &SharedSecret::new("ip-10-0-0-12.ec2.internal")));
    }

    #[test]
    fn missing_tag_is_distinct_from_mismatch() {
        assert_eq!(auth().verify(b"{}", None), Err(SignatureError::Missing));
        assert_eq!(
            auth().verify(b"{}", Some("garbage")),
            Err(SignatureError::Mismatch)
        );
        assert_ne!(SignatureError::Missing.code(), SignatureError::Mismatch.code());
    }

    #[test]
    fn other_secret_does_not_verify() {
        let body = b"payload";
        let tag = Authenticator::new(SharedSecret::new("other-host")).sign(body);
        assert_eq!(auth().verify(body, Some(&tag)), Err(SignatureError::Mismatch));
    }

    #[test]
    fn tag_is_base64_of_sha1_mac() {
        let tag = auth().sign(b"x");
        assert_eq!(STANDARD.decode(&tag).unwrap().len(), 20);
    }

    #[test]
    fn matches_tag_from_existing_clients() {
        // hmac.new(key, body, hashlib.sha1), base64-encoded.
        let body = br#"{"jsonrpc":"2.0","id":1,"method":"ping","params":[]}"#;
        let a = Authenticator::new(SharedSecret::new("ip-10-0-0-1.ec2.internal"));
        assert_eq!(a.sign(body), "eRoYXb9cklAvJ4e2gFEdL34aI4I=");
        assert_eq!(a.verify(body, Some("eRoYXb9cklAvJ4e2gFEdL34aI4I=")), Ok(()));
    }

    #[test]
    fn debug_redacts_secret() {
        let secret = SharedSecret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{:?}", Authenticator::new(secret)).contains("hunter2"));
    }

    proptest! {
        #[test]
        fn mutated_body_never_verifies(
            body in proptest::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let a = auth();
            let tag = a.sign(&body);
            let mut mutated = body.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= flip;
            prop_assert_eq!(a.verify(&mutated, Some(&tag)), Err(SignatureError::Mismatch));
        }

        #[test]
        fn appended_bytes_never_verify(
            body in proptest::collection::vec(any::<u8>(), 0..128),
            extra in proptest::collection::vec(any::<u8>(), 1..16),
        ) {
            let a = auth();
            let tag = a.sign(&body);
            let mut longer = body.clone();
            longer.extend_from_slice(&extra);
            prop_assert_eq!(a.verify(&longer, Some(&tag)), Err(SignatureError::Mismatch));
        }
    }
}
