//! The subset of NDN Data and Interest packets the validation core needs.
//!
//! TLV encoding/decoding is out of scope here: these types model the
//! *decoded* packet fields validation reasons about, not the wire format.

use crate::name::Name;
use crate::time::Millis;

/// `MetaInfo.ContentType` values relevant to validation.
///
/// The NDN base spec defines other content types; only `Key` is meaningful
/// to this crate, everything else is folded into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// A certificate (public key) -- the only content type a
    /// [`crate::cert::CertificateV2`] may have.
    Key,
    /// Any other content type.
    Other(u32),
}

/// `SignatureInfo.SignatureType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    Sha256WithRsa,
    Sha256WithEcdsa,
}

/// A `[notBefore, notAfter]` window, in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub not_before: Millis,
    pub not_after: Millis,
}

impl ValidityPeriod {
    /// Constructs a validity period, requiring `not_before <= not_after`.
    pub fn new(not_before: Millis, not_after: Millis) -> crate::error::Result<Self> {
        if not_before > not_after {
            return Err(crate::error::Error::ArgumentError(format!(
                "validity period notBefore ({}) > notAfter ({})", not_before, not_after)));
        }
        Ok(ValidityPeriod { not_before, not_after })
    }

    /// Whether `t` falls within `[not_before, not_after]`.
    pub fn covers(&self, t: Millis) -> bool {
        self.not_before <= t && t <= self.not_after
    }
}

/// A reference to a signer's key, embedded in a `SignatureInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocator {
    /// A name reference -- the only kind this crate's policies accept.
    KeyName(Name),
    /// A raw key digest reference, which every policy in this crate
    /// rejects with `INVALID_KEY_LOCATOR`: a trust policy needs a name it
    /// can resolve to a certificate, not just a hash of one.
    KeyDigest(Vec<u8>),
}

impl KeyLocator {
    /// The referenced name, if this is a `KeyName` locator.
    pub fn name(&self) -> Option<&Name> {
        match self {
            KeyLocator::KeyName(n) => Some(n),
            KeyLocator::KeyDigest(_) => None,
        }
    }
}

/// A packet's `SignatureInfo`: how it claims to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    pub key_locator: Option<KeyLocator>,
    pub validity_period: Option<ValidityPeriod>,
}

/// `MetaInfo`: non-Name, non-content Data packet fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub content_type: ContentType,
    /// Milliseconds; `None` means unset (distinct from zero).
    pub freshness_period_ms: Option<i64>,
}

impl Default for MetaInfo {
    fn default() -> Self {
        MetaInfo { content_type: ContentType::Other(0), freshness_period_ms: None }
    }
}

/// A decoded Data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Vec<u8>,
    pub signature_info: SignatureInfo,
    pub signature_value: Vec<u8>,
}

impl Data {
    /// The bytes that were actually signed: everything but the signature
    /// value itself. In a real TLV codec this is the wire encoding of
    /// Name..SignatureInfo; here it is a deterministic stand-in built from
    /// the decoded fields, which is all `CryptoProvider` needs to verify
    /// and re-verify consistently.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.name.to_string().as_bytes());
        buf.push(0);
        buf.extend_from_slice(&self.content);
        buf
    }
}

/// Interest selectors relevant to certificate/name matching.
///
/// `ChildSelector` is modeled (so that [`crate::cache::CertificateCache`]
/// can document ignoring it) but never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selectors {
    pub child_selector: Option<ChildSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSelector {
    LeftmostChild,
    RightmostChild,
}

/// A decoded Interest, possibly a signed command Interest.
///
/// For a signed Interest, the last two name components are the encoded
/// `SignatureInfo` and `SignatureValue`, per the NDN signed-Interest naming
/// convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub selectors: Selectors,
    pub signature_info: Option<SignatureInfo>,
    pub signature_value: Option<Vec<u8>>,
}

impl Interest {
    /// Builds an unsigned Interest for the given name.
    pub fn unsigned(name: Name) -> Self {
        Interest { name, selectors: Selectors::default(), signature_info: None, signature_value: None }
    }

    /// Whether this Interest carries an embedded signature.
    pub fn is_signed(&self) -> bool {
        self.signature_info.is_some() && self.signature_value.is_some()
    }

    /// The bytes that were signed: the name up to (but not including) the
    /// `SignatureValue` component, matching [`Data::signed_bytes`]'s role.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let up_to = self.name.prefix(-1);
        up_to.to_string().into_bytes()
    }

    /// Whether a `Data` packet satisfies this Interest's name and
    /// selectors, delegating the selector check to the crypto provider.
    pub fn matches(&self, data: &Data, crypto: &dyn crate::crypto::CryptoProvider) -> bool {
        crypto.matches_interest(self, data)
    }
}
