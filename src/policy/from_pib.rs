use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ValidationError, ValidationErrorCode};
use crate::fetcher::CertificateRequest;
use crate::packet::{Data, Interest};
use crate::pib::Pib;
use crate::state::ValidationState;
use crate::storage::CertificateStorage;

use super::{key_locator_name, ValidationPolicy};

const TEMPORARY_GROUP: &str = "from-pib-temporary";

/// Looks the signer's key up in a [`Pib`], temporarily installs its default
/// certificate as a trust anchor, and requests that exact certificate.
/// The installed anchor is removed again once the validator has
/// consulted it for this request (see [`CertificateRequest::after_issued`]).
#[derive(Debug)]
pub struct FromPib {
    pib: Rc<dyn Pib>,
    storage: Rc<RefCell<CertificateStorage>>,
}

impl FromPib {
    /// Creates a policy that resolves against `pib`, installing anchors
    /// into the same `storage` the owning [`crate::validator::Validator`]
    /// uses.
    pub fn new(pib: Rc<dyn Pib>, storage: Rc<RefCell<CertificateStorage>>) -> Self {
        FromPib { pib, storage }
    }

    fn check(&self, packet_name: &crate::name::Name, sig_info: Option<&crate::packet::SignatureInfo>, state: &ValidationState) -> Option<CertificateRequest> {
        let key_name = key_locator_name(sig_info, state)?;
        let cert = match self.pib.default_certificate_for(&key_name) {
            Some(cert) => cert,
            None => {
                state.fail(ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!("PIB has no default certificate for key {} (packet {})", key_name, packet_name),
                ));
                return None;
            }
        };
        let cert_name = cert.name().clone();
        if let Err(e) = self.storage.borrow_mut().load_anchor_certificate(TEMPORARY_GROUP, cert) {
            state.fail(ValidationError::new(ValidationErrorCode::ImplementationError, e.to_string()));
            return None;
        }

        let storage = self.storage.clone();
        let restore = Box::new(move || {
            storage.borrow_mut().anchors_mut().remove_from_group(TEMPORARY_GROUP, &cert_name);
        });
        Some(CertificateRequest::with_after_issued(Interest::unsigned(key_name), restore))
    }
}

impl ValidationPolicy for FromPib {
    fn check_policy_data(&self, data: &Data, state: &ValidationState) -> Option<CertificateRequest> {
        self.check(&data.name, Some(&data.signature_info), state)
    }

    fn check_policy_interest(&self, interest: &Interest, state: &ValidationState) -> Option<CertificateRequest> {
        self.check(&interest.name, interest.signature_info.as_ref(), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::packet::{ContentType, KeyLocator, MetaInfo, SignatureInfo, SignatureType, ValidityPeriod};
    use crate::pib::MemoryPib;
    use crate::state::Packet;
    use crate::time::OffsetClock;

    fn cert(name: &str) -> crate::cert::CertificateV2 {
        let data = Data {
            name: Name::parse(name),
            meta_info: MetaInfo { content_type: ContentType::Key, freshness_period_ms: Some(0) },
            content: vec![9],
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/root/KEY/1/self/1"))),
                validity_period: Some(ValidityPeriod::new(0, i64::MAX / 2).unwrap()),
            },
            signature_value: vec![0; 64],
        };
        crate::cert::CertificateV2::decode(data).unwrap()
    }

    #[test]
    fn installs_and_restores_temporary_anchor() {
        let storage = Rc::new(RefCell::new(CertificateStorage::new(Rc::new(OffsetClock::new()))));
        let mut pib = MemoryPib::new();
        pib.add_default_certificate(cert("/alice/KEY/k1/bob/1"));
        let policy = FromPib::new(Rc::new(pib), storage.clone());

        let d = Data {
            name: Name::parse("/alice/hello"),
            meta_info: MetaInfo::default(),
            content: b"x".to_vec(),
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/alice/KEY/k1"))),
                validity_period: None,
            },
            signature_value: vec![0; 64],
        };
        let state = ValidationState::new(Packet::Data(d.clone()), Box::new(|_| {}), Box::new(|_, _| {}));
        let req = policy.check_policy_data(&d, &state).unwrap();
        assert_eq!(req.interest.name.to_string(), "/alice/KEY/k1");
        assert_eq!(storage.borrow_mut().anchors_mut().len(), 1);

        req.fire_after_issued();
        assert_eq!(storage.borrow_mut().anchors_mut().len(), 0);
    }
}
