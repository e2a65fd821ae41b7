//! Signing of outgoing replies.
//!
//! [`DigestKeyChain`] implements the keyless DigestSha256 signature: the
//! signature is the SHA-256 of the name URI followed by the content, which
//! lets any receiver check integrity without a certificate.

use sha2::{Digest, Sha256};

use chronochat_proto::packet::Data;

/// Errors that can occur while signing.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// No signing identity is available.
    #[error("no signing identity available")]
    NoIdentity,
}

/// Signs and verifies data packets.
pub trait KeyChain {
    /// Attach a signature to `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] if the packet cannot be signed; `data` is left
    /// unsigned in that case.
    fn sign(&self, data: &mut Data) -> Result<(), SignError>;

    /// Check the signature attached to `data`.
    fn verify(&self, data: &Data) -> bool;
}

/// Keyless SHA-256 digest signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestKeyChain;

impl KeyChain for DigestKeyChain {
    fn sign(&self, data: &mut Data) -> Result<(), SignError> {
        data.signature = digest(data);
        Ok(())
    }

    fn verify(&self, data: &Data) -> bool {
        verify_digest(data)
    }
}

/// Returns `true` if `data` carries a valid DigestSha256 signature.
#[must_use]
pub fn verify_digest(data: &Data) -> bool {
    data.is_signed() && data.signature == digest(data)
}

fn digest(data: &Data) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data.name.to_uri().as_bytes());
    hasher.update(&data.content);
    hasher.finalize().to_vec()
}
