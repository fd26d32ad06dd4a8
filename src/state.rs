//! Per-request validation state.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::{instrument, trace, warn};

use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::error::{Error, ValidationError, ValidationErrorCode};
use crate::name::Name;
use crate::packet::{Data, Interest, SignatureInfo};

/// The packet a [`ValidationState`] is resolving a trust chain for.
#[derive(Debug, Clone)]
pub enum Packet {
    Data(Data),
    Interest(Interest),
}

impl Packet {
    fn signed_bytes(&self) -> Vec<u8> {
        match self {
            Packet::Data(d) => d.signed_bytes(),
            Packet::Interest(i) => i.signed_bytes(),
        }
    }

    fn signature_info(&self) -> Option<&SignatureInfo> {
        match self {
            Packet::Data(d) => Some(&d.signature_info),
            Packet::Interest(i) => i.signature_info.as_ref(),
        }
    }

    fn signature_value(&self) -> Option<&[u8]> {
        match self {
            Packet::Data(d) => Some(&d.signature_value),
            Packet::Interest(i) => i.signature_value.as_deref(),
        }
    }
}

/// The terminal outcome of a validation, once decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending,
    Success,
    Failure(ValidationError),
}

/// Called once, when a validation succeeds.
pub type SuccessCallback = Box<dyn FnOnce(&Packet)>;
/// Called once, when a validation fails.
pub type FailureCallback = Box<dyn FnOnce(&Packet, &ValidationError)>;
/// An internal hook a policy can register to run only once the
/// cryptographic validation of the *original* packet ultimately succeeds
/// (used by `CommandInterest` to commit a replay record only on real
/// success).
pub type SuccessHook = Box<dyn FnOnce(&Packet)>;

struct Inner {
    packet: Packet,
    chain: Vec<CertificateV2>,
    seen: HashSet<Name>,
    outcome: Outcome,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    success_hooks: Vec<SuccessHook>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ValidationState")
            .field("chain_len", &self.chain.len())
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// The per-request state machine: terminates in success or failure exactly
/// once, no matter how many late continuations arrive afterward.
///
/// Cheaply cloneable (an `Rc` handle) so that it can be captured by the
/// `'static` boxed continuations handed to a
/// [`crate::fetcher::CertificateFetcher`].
#[derive(Clone)]
pub struct ValidationState(Rc<RefCell<Inner>>);

impl fmt::Debug for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.borrow().fmt(f)
    }
}

impl ValidationState {
    /// Creates a new, pending state for `packet`.
    pub fn new(
        packet: Packet,
        on_success: SuccessCallback,
        on_failure: FailureCallback,
    ) -> Self {
        ValidationState(Rc::new(RefCell::new(Inner {
            packet,
            chain: Vec::new(),
            seen: HashSet::new(),
            outcome: Outcome::Pending,
            on_success: Some(on_success),
            on_failure: Some(on_failure),
            success_hooks: Vec::new(),
        })))
    }

    /// The packet under validation.
    pub fn packet(&self) -> Packet {
        self.0.borrow().packet.clone()
    }

    /// The current chain depth.
    pub fn depth(&self) -> usize {
        self.0.borrow().chain.len()
    }

    /// A snapshot of the resolved chain, e.g. for the validator to cache
    /// every certificate in it once verification succeeds.
    pub fn chain(&self) -> Vec<CertificateV2> {
        self.0.borrow().chain.clone()
    }

    /// Whether an outcome has already been decided. A still-pending fetch
    /// continuation that fires after cancellation must check this and
    /// no-op.
    pub fn has_outcome(&self) -> bool {
        !matches!(self.0.borrow().outcome, Outcome::Pending)
    }

    /// The decided outcome, if any.
    pub fn outcome(&self) -> Outcome {
        self.0.borrow().outcome.clone()
    }

    /// Appends `cert` to the resolved chain. Resolution proceeds from the
    /// original packet's direct signer outward; since each newly resolved
    /// certificate is signed by the *next* one still to be resolved,
    /// appending keeps `chain[0]` as the direct signer and `chain[i+1]` as
    /// `chain[i]`'s issuer.
    pub fn add_certificate(&self, cert: CertificateV2) {
        self.0.borrow_mut().chain.push(cert);
    }

    /// Registers `name` as seen; returns whether it had already been seen
    /// (a repeat means a certificate loop).
    pub fn has_seen_certificate_name(&self, name: &Name) -> bool {
        let mut inner = self.0.borrow_mut();
        !inner.seen.insert(name.clone())
    }

    /// Registers a hook to run (with the now-verified original packet)
    /// only if and when the validation ultimately succeeds; used by
    /// [`crate::policy::command_interest::CommandInterest`] to update the
    /// replay tracker exactly once, only on real success.
    pub fn add_success_hook(&self, hook: SuccessHook) {
        self.0.borrow_mut().success_hooks.push(hook);
    }

    /// Verifies the resolved chain against `trusted`, walking from the
    /// certificate closest to the anchor down to the direct signer of the
    /// original packet. Returns the bottom-most verified certificate -- the
    /// one that will verify the original packet -- or `None` after calling
    /// `fail` if any link does not verify.
    #[instrument(skip(self, trusted, crypto))]
    pub fn verify_certificate_chain(
        &self,
        trusted: &CertificateV2,
        crypto: &dyn CryptoProvider,
    ) -> Option<CertificateV2> {
        let chain_len = self.0.borrow().chain.len();
        let mut verifier = trusted.clone();
        for i in (0..chain_len).rev() {
            let cert = self.0.borrow().chain[i].clone();
            if !certificate_signed_by(&cert, &verifier, crypto) {
                trace!(name = %cert.name(), "chain link failed to verify");
                self.fail(ValidationError::new(
                    ValidationErrorCode::InvalidSignature,
                    format!("certificate {} does not verify under {}", cert.name(), verifier.name()),
                ));
                self.0.borrow_mut().chain.drain(0..=i);
                return None;
            }
            verifier = cert;
        }
        self.0.borrow().chain.first().cloned()
    }

    /// Verifies the original packet's own signature under `trusted`. On
    /// success, invokes every registered success hook (in registration
    /// order) followed by the primary success callback, and sets the
    /// outcome to success; on failure, calls `fail(INVALID_SIGNATURE)`.
    pub fn verify_original_packet(&self, trusted: &CertificateV2, crypto: &dyn CryptoProvider) {
        let (signed_bytes, sig_info, sig_value) = {
            let inner = self.0.borrow();
            (inner.packet.signed_bytes(),
             inner.packet.signature_info().cloned(),
             inner.packet.signature_value().map(|s| s.to_vec()))
        };
        let ok = match (sig_info, sig_value) {
            (Some(info), Some(value)) => {
                crypto.verify_signature(&signed_bytes, &value, info.signature_type, trusted.public_key_der())
                    .unwrap_or(false)
            }
            _ => false,
        };
        if ok {
            self.succeed();
        } else {
            self.fail(ValidationError::new(
                ValidationErrorCode::InvalidSignature,
                "original packet signature does not verify",
            ));
        }
    }

    /// Accepts the packet without any cryptographic check (used by
    /// `AcceptAll`). The caller must never pair this with a verified-cache
    /// insert, since nothing here was actually verified.
    pub fn bypass_validation(&self) {
        self.succeed();
    }

    fn succeed(&self) {
        let (hooks, on_success, packet) = {
            let mut inner = self.0.borrow_mut();
            if !matches!(inner.outcome, Outcome::Pending) {
                return;
            }
            inner.outcome = Outcome::Success;
            (std::mem::take(&mut inner.success_hooks), inner.on_success.take(), inner.packet.clone())
        };
        for hook in hooks {
            run_guarded(|| hook(&packet));
        }
        if let Some(cb) = on_success {
            run_guarded(move || cb(&packet));
        }
    }

    /// Fails the validation with `error`. The first call wins; every
    /// subsequent call (a late continuation after the outcome was already
    /// decided) is silently ignored.
    pub fn fail(&self, error: ValidationError) {
        let (on_failure, packet) = {
            let mut inner = self.0.borrow_mut();
            if !matches!(inner.outcome, Outcome::Pending) {
                return;
            }
            inner.outcome = Outcome::Failure(error.clone());
            (inner.on_failure.take(), inner.packet.clone())
        };
        if let Some(cb) = on_failure {
            run_guarded(move || cb(&packet, &error));
        }
    }

    /// Attempts to force a terminal outcome from outside the normal
    /// resolution flow (e.g. an external watchdog cancelling a
    /// validation). Unlike [`Self::fail`], this reports
    /// [`Error::AlreadyDecided`] rather than silently ignoring a
    /// redundant call, since an external caller deciding twice is a
    /// programmer error rather than an expected race between
    /// continuations.
    pub fn cancel(&self, error: ValidationError) -> Result<(), Error> {
        if self.has_outcome() {
            return Err(Error::AlreadyDecided);
        }
        self.fail(error);
        Ok(())
    }
}

fn certificate_signed_by(cert: &CertificateV2, issuer: &CertificateV2, crypto: &dyn CryptoProvider) -> bool {
    let locator_name = match cert.key_locator().and_then(|kl| kl.name()) {
        Some(n) => n,
        None => return false,
    };
    if locator_name != &issuer.key_name() {
        return false;
    }
    let signed_bytes = cert.data().signed_bytes();
    crypto.verify_signature(
        &signed_bytes,
        &cert.data().signature_value,
        cert.data().signature_info.signature_type,
        issuer.public_key_der(),
    ).unwrap_or(false)
}

/// Runs `f`, catching and logging a panic instead of letting it unwind
/// through the validator: a misbehaving success/failure callback must not
/// take down whatever called into validation.
fn run_guarded(f: impl FnOnce()) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let message = payload.downcast_ref::<&str>().copied()
            .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        warn!(panic = message, "validation callback panicked; swallowing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::packet::{ContentType, KeyLocator, MetaInfo, SignatureType, ValidityPeriod};
    use std::cell::Cell;
    use std::rc::Rc;

    fn data(name: &str) -> Data {
        Data {
            name: Name::parse(name),
            meta_info: MetaInfo::default(),
            content: b"hello".to_vec(),
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/root/KEY/1/self/1"))),
                validity_period: None,
            },
            signature_value: vec![0; 64],
        }
    }

    #[test]
    fn terminates_exactly_once() {
        let success_count = Rc::new(Cell::new(0));
        let failure_count = Rc::new(Cell::new(0));
        let sc = success_count.clone();
        let fc = failure_count.clone();
        let state = ValidationState::new(
            Packet::Data(data("/a/b")),
            Box::new(move |_| sc.set(sc.get() + 1)),
            Box::new(move |_, _| fc.set(fc.get() + 1)),
        );
        state.fail(ValidationError::new(ValidationErrorCode::PolicyError, "first"));
        state.fail(ValidationError::new(ValidationErrorCode::PolicyError, "second"));
        state.bypass_validation();
        assert_eq!(failure_count.get(), 1);
        assert_eq!(success_count.get(), 0);
    }

    #[test]
    fn loop_detection_tracks_seen_names() {
        let state = ValidationState::new(
            Packet::Data(data("/a/b")),
            Box::new(|_| {}),
            Box::new(|_, _| {}),
        );
        let n = Name::parse("/a/KEY/1/issuer/1");
        assert!(!state.has_seen_certificate_name(&n));
        assert!(state.has_seen_certificate_name(&n));
    }

    #[test]
    fn panicking_callback_is_swallowed() {
        let state = ValidationState::new(
            Packet::Data(data("/a/b")),
            Box::new(|_| panic!("boom")),
            Box::new(|_, _| {}),
        );
        state.bypass_validation();
        assert!(state.has_outcome());
    }

    #[test]
    fn cancel_reports_already_decided() {
        let state = ValidationState::new(
            Packet::Data(data("/a/b")),
            Box::new(|_| {}),
            Box::new(|_, _| {}),
        );
        state.bypass_validation();
        let err = state.cancel(ValidationError::new(ValidationErrorCode::PolicyError, "late")).unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided));
    }
}
