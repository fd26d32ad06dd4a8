use crate::error::{ValidationError, ValidationErrorCode};
use crate::fetcher::CertificateRequest;
use crate::packet::{Data, Interest};
use crate::state::ValidationState;

use super::{key_locator_name, request_for, ValidationPolicy};

/// The textbook NDN hierarchical trust model: a packet's name must
/// live under the identity named by its signer's key locator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleHierarchy;

impl SimpleHierarchy {
    fn check(&self, packet_name: &crate::name::Name, sig_info: Option<&crate::packet::SignatureInfo>, state: &ValidationState) -> Option<CertificateRequest> {
        let locator = key_locator_name(sig_info, state)?;
        let identity = locator.prefix(-2);
        if !identity.is_prefix_of(packet_name) {
            state.fail(ValidationError::new(
                ValidationErrorCode::InvalidKeyLocator,
                format!("key locator {} does not cover packet name {}", locator, packet_name),
            ));
            return None;
        }
        Some(request_for(locator))
    }
}

impl ValidationPolicy for SimpleHierarchy {
    fn check_policy_data(&self, data: &Data, state: &ValidationState) -> Option<CertificateRequest> {
        self.check(&data.name, Some(&data.signature_info), state)
    }

    fn check_policy_interest(&self, interest: &Interest, state: &ValidationState) -> Option<CertificateRequest> {
        self.check(&interest.name, interest.signature_info.as_ref(), state)
    }
}
