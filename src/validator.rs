//! The orchestrator tying policy, fetcher, storage, and state together.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::instrument;

use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::error::{ValidationError, ValidationErrorCode};
use crate::fetcher::{CertificateFetcher, CertificateRequest, OfflineFetcher};
use crate::packet::{Data, Interest};
use crate::policy::ValidationPolicy;
use crate::state::{Packet, ValidationState};
use crate::storage::CertificateStorage;
use crate::time::Clock;

/// Default bound on certificate chain depth.
pub const DEFAULT_MAX_DEPTH: usize = 25;

/// Ties a [`ValidationPolicy`], a [`CertificateFetcher`], and
/// [`CertificateStorage`] together into the single entry point applications
/// call to validate a Data packet or signed command Interest.
///
/// A `Validator` owns its policy, fetcher, and storage exclusively; the
/// storage and crypto handles are `Rc`-shared only because the recursive
/// resolution steps below need to be captured by `'static` continuations
/// handed to the fetcher.
pub struct Validator {
    policy: Rc<dyn ValidationPolicy>,
    fetcher: Rc<RefCell<dyn CertificateFetcher>>,
    storage: Rc<RefCell<CertificateStorage>>,
    crypto: Rc<dyn CryptoProvider>,
    clock: Rc<dyn Clock>,
    max_depth: usize,
}

impl Validator {
    /// Creates a validator with `fetcher`, an explicit `policy`, and the
    /// given storage/crypto/clock collaborators.
    pub fn new(
        policy: impl ValidationPolicy + 'static,
        fetcher: impl CertificateFetcher + 'static,
        storage: Rc<RefCell<CertificateStorage>>,
        crypto: Rc<dyn CryptoProvider>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Validator {
            policy: Rc::new(policy),
            fetcher: Rc::new(RefCell::new(fetcher)),
            storage,
            crypto,
            clock,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a validator with no fetcher at all: `Validator(policy)`
    /// implies an [`OfflineFetcher`].
    pub fn offline(
        policy: impl ValidationPolicy + 'static,
        storage: Rc<RefCell<CertificateStorage>>,
        crypto: Rc<dyn CryptoProvider>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Validator::new(policy, OfflineFetcher, storage, crypto, clock)
    }

    /// The configured maximum chain depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets the maximum chain depth.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// The bound storage, e.g. to load trust anchors.
    pub fn storage(&self) -> &Rc<RefCell<CertificateStorage>> {
        &self.storage
    }

    /// The bound policy.
    pub fn policy(&self) -> &Rc<dyn ValidationPolicy> {
        &self.policy
    }

    /// Validates `data`, invoking exactly one of `on_success`/`on_failure`
    /// once an outcome is decided (possibly synchronously, possibly after a
    /// fetch completes later).
    #[instrument(skip_all, fields(name = %data.name))]
    pub fn validate_data(
        &self,
        data: Data,
        on_success: impl FnOnce(&Packet) + 'static,
        on_failure: impl FnOnce(&Packet, &ValidationError) + 'static,
    ) {
        let state = ValidationState::new(Packet::Data(data.clone()), Box::new(on_success), Box::new(on_failure));
        let request = self.policy.check_policy_data(&data, &state);
        self.dispatch(request, state);
    }

    /// Validates a signed command `interest`, the Interest counterpart of
    /// [`Self::validate_data`].
    #[instrument(skip_all, fields(name = %interest.name))]
    pub fn validate_interest(
        &self,
        interest: Interest,
        on_success: impl FnOnce(&Packet) + 'static,
        on_failure: impl FnOnce(&Packet, &ValidationError) + 'static,
    ) {
        let state = ValidationState::new(Packet::Interest(interest.clone()), Box::new(on_success), Box::new(on_failure));
        let request = self.policy.check_policy_interest(&interest, &state);
        self.dispatch(request, state);
    }

    fn dispatch(&self, request: Option<CertificateRequest>, state: ValidationState) {
        if state.has_outcome() {
            // The top-level policy check already failed the packet.
            return;
        }
        match request {
            None => state.bypass_validation(),
            Some(req) => self.request_certificate(req, state),
        }
    }

    /// Resolves one `CertificateRequest`,
    /// either terminating synchronously against a trusted certificate
    /// already in storage or handing off to the fetcher.
    fn request_certificate(&self, request: CertificateRequest, state: ValidationState) {
        request_certificate(&self.policy, &self.fetcher, &self.storage, &self.crypto, &self.clock, self.max_depth, request, state);
    }
}

/// Verifies `state`'s resolved chain against `trusted` and, on success,
/// caches every certificate in the now-verified chain to the verified
/// cache.
fn verify_and_cache(
    trusted: &CertificateV2,
    state: &ValidationState,
    crypto: &dyn CryptoProvider,
    storage: &Rc<RefCell<CertificateStorage>>,
) {
    let bottom = match state.verify_certificate_chain(trusted, crypto) {
        Some(bottom) => bottom,
        None => return, // verify_certificate_chain already failed state.
    };
    state.verify_original_packet(&bottom, crypto);
    if matches!(state.outcome(), crate::state::Outcome::Success) {
        let mut storage = storage.borrow_mut();
        for cert in state.chain() {
            storage.cache_verified_certificate(cert);
        }
    }
}

/// Validates one certificate encountered while resolving a chain, lifted
/// to a free function so it can be
/// captured by a `'static` fetch continuation without borrowing a
/// `Validator` across the suspension point.
fn validate_certificate(
    policy: &Rc<dyn ValidationPolicy>,
    fetcher: &Rc<RefCell<dyn CertificateFetcher>>,
    storage: &Rc<RefCell<CertificateStorage>>,
    crypto: &Rc<dyn CryptoProvider>,
    clock: &Rc<dyn Clock>,
    max_depth: usize,
    cert: CertificateV2,
    state: ValidationState,
) {
    if state.has_outcome() {
        return; // Cancelled while a fetch was in flight.
    }
    if !cert.is_valid(clock.now_millis()) {
        state.fail(ValidationError::new(
            ValidationErrorCode::ExpiredCertificate,
            format!("certificate {} is not valid at the current time", cert.name()),
        ));
        return;
    }

    let request = policy.check_certificate_policy(&cert, &state);
    if state.has_outcome() {
        return;
    }
    match request {
        None => {
            state.fail(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!("cannot designate {} as a trust anchor", cert.name()),
            ));
        }
        Some(req) => {
            state.add_certificate(cert);
            request_certificate(policy, fetcher, storage, crypto, clock, max_depth, req, state);
        }
    }
}

/// Resolves one `CertificateRequest`, lifted to a free function so it can
/// be called both from [`Validator::request_certificate`] and recursively from
/// [`validate_certificate`] across a suspension point.
fn request_certificate(
    policy: &Rc<dyn ValidationPolicy>,
    fetcher: &Rc<RefCell<dyn CertificateFetcher>>,
    storage: &Rc<RefCell<CertificateStorage>>,
    crypto: &Rc<dyn CryptoProvider>,
    clock: &Rc<dyn Clock>,
    max_depth: usize,
    request: CertificateRequest,
    state: ValidationState,
) {
    if state.depth() >= max_depth {
        state.fail(ValidationError::exceeded_depth_limit(max_depth));
        return;
    }
    if state.has_seen_certificate_name(&request.interest.name) {
        state.fail(ValidationError::loop_detected(&request.interest.name));
        return;
    }

    let hit = storage.borrow_mut().find_trusted_certificate(&request.interest, crypto.as_ref());
    request.fire_after_issued();

    match hit {
        Some(trusted) => verify_and_cache(&trusted, &state, crypto.as_ref(), storage),
        None => {
            let policy = policy.clone();
            let fetcher2 = fetcher.clone();
            let storage2 = storage.clone();
            let crypto2 = crypto.clone();
            let clock2 = clock.clone();
            let continuation = Box::new(move |cert: CertificateV2, state: ValidationState| {
                validate_certificate(&policy, &fetcher2, &storage2, &crypto2, &clock2, max_depth, cert, state);
            });
            fetcher.borrow_mut().fetch(storage.clone(), crypto.clone(), request, state, continuation);
        }
    }
}
