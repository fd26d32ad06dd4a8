use crate::fetcher::CertificateRequest;
use crate::packet::{Data, Interest};
use crate::state::ValidationState;

use super::ValidationPolicy;

/// Accepts every packet without inspecting it. Intended for tests
/// and for embedding applications that trust their whole local network --
/// `Validator` never caches a bypassed packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ValidationPolicy for AcceptAll {
    fn check_policy_data(&self, _data: &Data, _state: &ValidationState) -> Option<CertificateRequest> {
        None
    }

    fn check_policy_interest(&self, _interest: &Interest, _state: &ValidationState) -> Option<CertificateRequest> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    #[test]
    fn never_requests_a_certificate() {
        let policy = AcceptAll;
        let state = ValidationState::new(
            crate::state::Packet::Interest(Interest::unsigned(Name::parse("/a/b"))),
            Box::new(|_| {}),
            Box::new(|_, _| {}),
        );
        let interest = Interest::unsigned(Name::parse("/a/b"));
        assert!(policy.check_policy_interest(&interest, &state).is_none());
        assert!(!state.has_outcome());
    }
}
