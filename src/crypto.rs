//! Cryptographic primitives, wrapped as an external collaborator.
//!
//! The validation core never hashes or verifies a signature itself; it
//! calls out to a [`CryptoProvider`]. [`DefaultCryptoProvider`] is a real
//! implementation built on the RustCrypto stack (`rsa`, `p256`/`ecdsa`,
//! `sha2`), the same family of crates the rest of this codebase's
//! cryptographic code is built on, but the trait keeps the core free of a
//! hard dependency on any one backend.

use std::fmt;

use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::Verifier;

use crate::packet::{Data, Interest, SignatureType};

/// Errors a [`CryptoProvider`] may report.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CryptoError {
    /// The DER-encoded public key could not be decoded.
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    /// The signature bytes were not even well-formed for the claimed
    /// algorithm (distinct from a well-formed signature that fails to
    /// verify).
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Opaque capability to hash, verify signatures, and match packets.
///
/// An external collaborator the validation core depends on only through
/// this trait, never hashing or verifying a signature itself.
pub trait CryptoProvider: fmt::Debug {
    /// SHA-256 of `data`.
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// Verifies `signature` over `signed_bytes`, using `sig_type` and the
    /// DER-encoded (SubjectPublicKeyInfo) `public_key_der`.
    ///
    /// Returns `Ok(false)` for a well-formed signature that simply does
    /// not verify (the common "bad signature" case, mapped by the caller
    /// to `INVALID_SIGNATURE`); returns `Err` only when the inputs
    /// themselves are malformed.
    fn verify_signature(
        &self,
        signed_bytes: &[u8],
        signature: &[u8],
        sig_type: SignatureType,
        public_key_der: &[u8],
    ) -> Result<bool, CryptoError>;

    /// Whether `data` satisfies `interest`'s name and selectors.
    fn matches_interest(&self, interest: &Interest, data: &Data) -> bool;
}

/// The default [`CryptoProvider`], backed by RustCrypto.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCryptoProvider;

impl CryptoProvider for DefaultCryptoProvider {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    fn verify_signature(
        &self,
        signed_bytes: &[u8],
        sig: &[u8],
        sig_type: SignatureType,
        public_key_der: &[u8],
    ) -> Result<bool, CryptoError> {
        match sig_type {
            SignatureType::Sha256WithRsa => {
                let public_key = RsaPublicKey::from_public_key_der(public_key_der)
                    .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
                let verifying_key: RsaVerifyingKey<Sha256> = RsaVerifyingKey::new(public_key);
                let signature = RsaSignature::try_from(sig)
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                Ok(verifying_key.verify(signed_bytes, &signature).is_ok())
            }
            SignatureType::Sha256WithEcdsa => {
                use p256::ecdsa::{signature::Verifier as _, Signature as P256Signature, VerifyingKey};
                use p256::pkcs8::DecodePublicKey as _;

                let verifying_key = VerifyingKey::from_public_key_der(public_key_der)
                    .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
                let signature = P256Signature::from_der(sig)
                    .or_else(|_| P256Signature::try_from(sig))
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                Ok(verifying_key.verify(signed_bytes, &signature).is_ok())
            }
        }
    }

    fn matches_interest(&self, interest: &Interest, data: &Data) -> bool {
        // ChildSelector is explicitly not honored; a name-prefix
        // match is all this crate implements for selector matching.
        interest.name.is_prefix_of(&data.name)
    }
}
