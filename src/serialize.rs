//! This crate's own certificate persistence format.
//!
//! Not a TLV encoder; just enough of a self-describing
//! format to round-trip a [`CertificateV2`] through a file, so that
//! [`crate::trust_anchor`]'s dynamic groups have something concrete to
//! read from disk in tests and examples.

use serde::{Deserialize, Serialize};

use crate::cert::CertificateV2;
use crate::name::{Component, Name};
use crate::packet::{ContentType, Data, KeyLocator, MetaInfo, SignatureInfo, SignatureType, ValidityPeriod};

#[derive(Serialize, Deserialize)]
pub(crate) struct CertificateWireRepr {
    name: Vec<Vec<u8>>,
    content_type_key: bool,
    freshness_period_ms: Option<i64>,
    content: Vec<u8>,
    signature_type_rsa: bool,
    key_locator_name: Option<Vec<Vec<u8>>>,
    not_before: i64,
    not_after: i64,
    signature_value: Vec<u8>,
}

impl CertificateWireRepr {
    pub(crate) fn into_data(self) -> Data {
        let name = Name::from_components(self.name);
        let key_locator = self.key_locator_name.map(|comps| {
            KeyLocator::KeyName(Name::from_components(comps))
        });
        Data {
            name,
            meta_info: MetaInfo {
                content_type: if self.content_type_key { ContentType::Key } else { ContentType::Other(0) },
                freshness_period_ms: self.freshness_period_ms,
            },
            content: self.content,
            signature_info: SignatureInfo {
                signature_type: if self.signature_type_rsa {
                    SignatureType::Sha256WithRsa
                } else {
                    SignatureType::Sha256WithEcdsa
                },
                key_locator,
                validity_period: Some(ValidityPeriod { not_before: self.not_before, not_after: self.not_after }),
            },
            signature_value: self.signature_value,
        }
    }
}

fn name_to_components(name: &Name) -> Vec<Vec<u8>> {
    name.iter().map(|c| c.as_bytes().to_vec()).collect()
}

/// Serializes `cert` into this crate's wire representation.
pub fn encode_certificate(cert: CertificateV2) -> Vec<u8> {
    encode_certificate_ref(&cert)
}

/// Serializes a certificate by reference.
pub fn encode_certificate_ref(cert: &CertificateV2) -> Vec<u8> {
    let data = cert.data();
    let vp = cert.validity_period();
    let repr = CertificateWireRepr {
        name: name_to_components(&data.name),
        content_type_key: matches!(data.meta_info.content_type, ContentType::Key),
        freshness_period_ms: data.meta_info.freshness_period_ms,
        content: data.content.clone(),
        signature_type_rsa: matches!(data.signature_info.signature_type, SignatureType::Sha256WithRsa),
        key_locator_name: data.signature_info.key_locator.as_ref()
            .and_then(KeyLocator::name)
            .map(name_to_components),
        not_before: vp.not_before,
        not_after: vp.not_after,
        signature_value: data.signature_value.clone(),
    };
    serde_json::to_vec(&repr).expect("CertificateWireRepr always serializes")
}

impl Name {
    pub(crate) fn from_components(comps: Vec<Vec<u8>>) -> Name {
        comps.into_iter().fold(Name::root(), |n, c| n.append(Component::new(c)))
    }
}
