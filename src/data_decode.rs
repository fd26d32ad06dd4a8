//! Decodes bytes into a [`CertificateV2`].
//!
//! TLV decoding is explicitly out of scope here: dynamic trust anchor
//! groups still need *something* to turn a file's bytes into a
//! certificate, so this module decodes this crate's own self-describing
//! serialization (see [`crate::serialize`]) rather than wire-format TLV.
//! A deployment with a real TLV codec would swap this module out; nothing
//! else in the crate depends on the byte format.

use crate::cert::CertificateV2;
use crate::error::Error;
use crate::serialize::CertificateWireRepr;

/// Decodes `bytes` (as produced by [`crate::serialize::encode_certificate`])
/// into a validated [`CertificateV2`].
pub fn decode_certificate_bytes(bytes: &[u8]) -> Result<CertificateV2, Error> {
    let repr: CertificateWireRepr = serde_json::from_slice(bytes)
        .map_err(|e| Error::MalformedCertificate(e.to_string()))?;
    CertificateV2::decode(repr.into_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::packet::{ContentType, Data, KeyLocator, MetaInfo, SignatureInfo, SignatureType, ValidityPeriod};
    use crate::serialize::encode_certificate_ref;

    #[test]
    fn round_trips_through_the_wire_repr() {
        let data = Data {
            name: Name::parse("/alice/KEY/k1/bob/1"),
            meta_info: MetaInfo { content_type: ContentType::Key, freshness_period_ms: Some(1000) },
            content: vec![1, 2, 3, 4],
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/root/KEY/1/self/1"))),
                validity_period: Some(ValidityPeriod::new(0, 1_000_000).unwrap()),
            },
            signature_value: vec![5, 6, 7],
        };
        let cert = CertificateV2::decode(data).unwrap();
        let bytes = encode_certificate_ref(&cert);
        let decoded = decode_certificate_bytes(&bytes).unwrap();
        assert_eq!(decoded.name(), cert.name());
        assert_eq!(decoded.public_key_der(), cert.public_key_der());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_certificate_bytes(b"not json at all").is_err());
    }
}
