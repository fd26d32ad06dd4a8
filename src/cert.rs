//! NDN certificate-format v2.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::packet::{ContentType, Data, KeyLocator, ValidityPeriod};
use crate::time::Millis;

/// A typed view over a [`Data`] packet conforming to the NDN certificate
/// naming convention `/{identity}/KEY/{keyId}/{issuerId}/{version}`.
///
/// `CertificateV2` is immutable once constructed; [`CertificateV2::decode`]
/// is the only way to build one, and it validates the naming and structural
/// invariants up front so that every other component can treat a
/// `CertificateV2` as already well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateV2 {
    data: Data,
}

/// The reserved name component marking the `KEY` boundary.
pub const KEY_COMPONENT: &str = "KEY";

impl CertificateV2 {
    /// Decodes and validates `data` as a v2 certificate.
    ///
    /// Fails with [`Error::MalformedCertificate`] for a wrong name shape,
    /// `ContentType != KEY`, a negative freshness period, empty content, or
    /// a `SignatureInfo` lacking a `ValidityPeriod`.
    pub fn decode(data: Data) -> Result<Self> {
        let name = &data.name;
        // At least four components after an explicit KEY marker:
        // identity.../KEY/keyId/issuerId/version.
        if name.len() < 4 {
            return Err(Error::MalformedCertificate(format!(
                "name {} has fewer than 4 components", name)));
        }
        let key_marker = name.at(-4).map(|c| c.to_string());
        if key_marker.as_deref() != Some(KEY_COMPONENT) {
            return Err(Error::MalformedCertificate(format!(
                "name {} does not have a KEY component at position -4", name)));
        }
        if data.meta_info.content_type != ContentType::Key {
            return Err(Error::MalformedCertificate(
                "ContentType is not KEY".to_string()));
        }
        if let Some(fp) = data.meta_info.freshness_period_ms {
            if fp < 0 {
                return Err(Error::MalformedCertificate(
                    "FreshnessPeriod is negative".to_string()));
            }
        }
        if data.content.is_empty() {
            return Err(Error::MalformedCertificate(
                "Content (public key) is empty".to_string()));
        }
        if data.signature_info.validity_period.is_none() {
            return Err(Error::MalformedCertificate(
                "SignatureInfo is missing a ValidityPeriod".to_string()));
        }
        Ok(CertificateV2 { data })
    }

    /// The full certificate name.
    pub fn name(&self) -> &Name {
        &self.data.name
    }

    /// The identity this certificate names a key for: everything before
    /// the `KEY` marker.
    pub fn identity(&self) -> Name {
        self.data.name.prefix(-4)
    }

    /// The key name: identity + `KEY` + keyId.
    pub fn key_name(&self) -> Name {
        self.data.name.prefix(-2)
    }

    /// The `keyId` component.
    pub fn key_id(&self) -> String {
        // Name shape was validated in `decode`.
        self.data.name.at(-3).unwrap().to_string()
    }

    /// The `issuerId` component.
    pub fn issuer_id(&self) -> String {
        self.data.name.at(-2).unwrap().to_string()
    }

    /// The `version` component.
    pub fn version(&self) -> String {
        self.data.name.at(-1).unwrap().to_string()
    }

    /// The DER-encoded public key (the Data packet's content).
    pub fn public_key_der(&self) -> &[u8] {
        &self.data.content
    }

    /// The certificate's validity period.
    pub fn validity_period(&self) -> ValidityPeriod {
        self.data.signature_info.validity_period
            .expect("validated by decode()")
    }

    /// Whether `t` falls within this certificate's validity period.
    pub fn is_valid(&self, t: Millis) -> bool {
        self.validity_period().covers(t)
    }

    /// The signer's key locator (the certificate's own issuer), if any.
    pub fn key_locator(&self) -> Option<&KeyLocator> {
        self.data.signature_info.key_locator.as_ref()
    }

    /// The underlying Data packet.
    pub fn data(&self) -> &Data {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{MetaInfo, SignatureInfo, SignatureType};

    fn sample_data(name: &str, content_type: ContentType, content: Vec<u8>,
                    validity: Option<ValidityPeriod>) -> Data {
        Data {
            name: Name::parse(name),
            meta_info: MetaInfo { content_type, freshness_period_ms: Some(3600_000) },
            content,
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/root/KEY/1/self/1"))),
                validity_period: validity,
            },
            signature_value: vec![0; 64],
        }
    }

    #[test]
    fn decodes_well_formed_certificate() {
        let vp = ValidityPeriod::new(0, 1_000_000).unwrap();
        let data = sample_data("/alice/KEY/k1/bob/1", ContentType::Key, vec![1, 2, 3], Some(vp));
        let cert = CertificateV2::decode(data).unwrap();
        assert_eq!(cert.identity().to_string(), "/alice");
        assert_eq!(cert.key_name().to_string(), "/alice/KEY/k1");
        assert_eq!(cert.issuer_id(), "bob");
        assert_eq!(cert.version(), "1");
        assert!(cert.is_valid(500_000));
        assert!(!cert.is_valid(2_000_000));
    }

    #[test]
    fn rejects_missing_key_marker() {
        let vp = ValidityPeriod::new(0, 1).unwrap();
        let data = sample_data("/alice/notkey/k1/bob/1", ContentType::Key, vec![1], Some(vp));
        assert!(CertificateV2::decode(data).is_err());
    }

    #[test]
    fn rejects_wrong_content_type() {
        let vp = ValidityPeriod::new(0, 1).unwrap();
        let data = sample_data("/alice/KEY/k1/bob/1", ContentType::Other(0), vec![1], Some(vp));
        assert!(CertificateV2::decode(data).is_err());
    }

    #[test]
    fn rejects_empty_content() {
        let vp = ValidityPeriod::new(0, 1).unwrap();
        let data = sample_data("/alice/KEY/k1/bob/1", ContentType::Key, vec![], Some(vp));
        assert!(CertificateV2::decode(data).is_err());
    }

    #[test]
    fn rejects_missing_validity_period() {
        let data = sample_data("/alice/KEY/k1/bob/1", ContentType::Key, vec![1], None);
        assert!(CertificateV2::decode(data).is_err());
    }
}
