//! Composable trust policies.
//!
//! A `ValidationPolicy` decides, for one packet, whether it already
//! conforms (bypass), needs a certificate fetched to decide (a
//! [`CertificateRequest`]), or is outright rejected (a direct call to
//! [`ValidationState::fail`]). Policies compose by wrapping an inner policy
//! rather than through a separate chain type -- `CommandInterest` and
//! `FromPib` each hold their inner policy directly, the way the source
//! material's single-inheritance-style delegation works out in Rust as
//! plain field composition.

mod accept_all;
mod command_interest;
mod config;
mod from_pib;
mod hierarchy;

pub use accept_all::AcceptAll;
pub use command_interest::CommandInterest;
pub use config::{ConfigAnchor, ConfigAnchorKind, ConfigDirection, ConfigPolicy, ConfigRule, KeyLocatorCheck, NameRelation};
pub use from_pib::FromPib;
pub use hierarchy::SimpleHierarchy;

use std::fmt;

use crate::cert::CertificateV2;
use crate::error::{ValidationError, ValidationErrorCode};
use crate::fetcher::CertificateRequest;
use crate::name::Name;
use crate::packet::{Data, Interest, SignatureInfo};
use crate::state::ValidationState;

/// A trust policy, invoked synchronously by the
/// [`crate::validator::Validator`] at each step of chain resolution.
///
/// `None` means either "no key fetch needed, bypass" or "already failed";
/// callers distinguish the two via [`ValidationState::has_outcome`], the
/// same way the caller of an async `continuation(null, state)` would check
/// whether `fail` had already been invoked. This crate's policies never
/// suspend, so a synchronous return value replaces the boxed continuation
/// the async fetch path needs.
pub trait ValidationPolicy: fmt::Debug {
    /// Checks a Data packet.
    fn check_policy_data(&self, data: &Data, state: &ValidationState) -> Option<CertificateRequest>;

    /// Checks a (possibly signed) Interest.
    fn check_policy_interest(&self, interest: &Interest, state: &ValidationState) -> Option<CertificateRequest>;

    /// Checks a certificate encountered while resolving a chain. Defaults
    /// to treating the certificate's underlying Data packet as an ordinary
    /// Data packet.
    fn check_certificate_policy(&self, cert: &CertificateV2, state: &ValidationState) -> Option<CertificateRequest> {
        self.check_policy_data(cert.data(), state)
    }
}

/// Extracts the Interest for the certificate named by `key_name`.
pub(crate) fn request_for(key_name: Name) -> CertificateRequest {
    CertificateRequest::new(Interest::unsigned(key_name))
}

/// Pulls the signer's key name out of `sig_info`, failing `state` and
/// returning `None` if there is no signature at all, or `INVALID_KEY_LOCATOR`
/// if the locator is not a `KEYNAME`.
pub(crate) fn key_locator_name(sig_info: Option<&SignatureInfo>, state: &ValidationState) -> Option<Name> {
    let info = match sig_info {
        Some(info) => info,
        None => {
            state.fail(ValidationError::new(ValidationErrorCode::NoSignature, "packet carries no signature"));
            return None;
        }
    };
    match info.key_locator.as_ref().and_then(|kl| kl.name()) {
        Some(name) => Some(name.clone()),
        None => {
            state.fail(ValidationError::new(
                ValidationErrorCode::InvalidKeyLocator,
                "key locator is missing or not a KEYNAME",
            ));
            None
        }
    }
}
