//! Pluggable, asynchronous certificate retrieval.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::error::{ValidationError, ValidationErrorCode};
use crate::packet::{Data, Interest};
use crate::state::ValidationState;
use crate::storage::CertificateStorage;

/// Default number of retries a [`CertificateFetcherFromNetwork`] allows
/// before giving up.
pub const DEFAULT_RETRIES: u32 = 3;

/// An Interest naming a missing certificate, plus how many more times the
/// network fetcher may retry it.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub interest: Interest,
    pub retries_left: u32,
    /// Run exactly once by the validator, right after it performs the
    /// synchronous trust-store lookup for this request (hit or miss) --
    /// used by [`crate::policy::FromPib`] to restore trust-anchor state
    /// once its temporarily installed anchor has actually been consulted,
    /// restoring prior trust-anchor state once the request has been issued.
    pub after_issued: Option<Rc<RefCell<Option<Box<dyn FnOnce()>>>>>,
}

impl CertificateRequest {
    /// A request with the default retry budget and no post-issue hook.
    pub fn new(interest: Interest) -> Self {
        CertificateRequest { interest, retries_left: DEFAULT_RETRIES, after_issued: None }
    }

    /// A request that runs `hook` once the validator has looked it up in
    /// the trust store.
    pub fn with_after_issued(interest: Interest, hook: Box<dyn FnOnce()>) -> Self {
        CertificateRequest {
            interest,
            retries_left: DEFAULT_RETRIES,
            after_issued: Some(Rc::new(RefCell::new(Some(hook)))),
        }
    }

    /// Invoked by the validator once, regardless of whether the lookup hit
    /// or missed. A no-op if there is no hook, or if it already ran.
    pub(crate) fn fire_after_issued(&self) {
        if let Some(cell) = &self.after_issued {
            if let Some(hook) = cell.borrow_mut().take() {
                hook();
            }
        }
    }
}

/// Invoked once `fetch` has a certificate (already cached as unverified)
/// or has given up.
pub type FetchContinuation = Box<dyn FnOnce(CertificateV2, ValidationState)>;

type DoFetchResult = Result<CertificateV2, ValidationError>;
/// Invoked by a [`CertificateFetcher`] implementation's `do_fetch` once it
/// has an answer (success or permanent failure) for one request.
pub type DoFetchContinuation = Box<dyn FnOnce(DoFetchResult, ValidationState)>;

/// An asynchronous source for certificates not already in
/// [`CertificateStorage`].
///
/// Implementations provide [`CertificateFetcher::do_fetch`] only; the
/// unverified-cache check, the unverified-cache insert on success, and the
/// `CANNOT_RETRIEVE_CERTIFICATE` failure path are common to every
/// implementation and live in the provided [`CertificateFetcher::fetch`].
pub trait CertificateFetcher {
    /// Implementation-specific retrieval, invoked only on an unverified-
    /// cache miss.
    fn do_fetch(
        &mut self,
        storage: &Rc<RefCell<CertificateStorage>>,
        crypto: &Rc<dyn CryptoProvider>,
        request: CertificateRequest,
        state: ValidationState,
        on_fetched: DoFetchContinuation,
    );

    /// The full contract: check the unverified cache, fall back to
    /// `do_fetch`, cache what it returns, and forward failures to `state`.
    #[instrument(skip_all)]
    fn fetch(
        &mut self,
        storage: Rc<RefCell<CertificateStorage>>,
        crypto: Rc<dyn CryptoProvider>,
        request: CertificateRequest,
        state: ValidationState,
        continuation: FetchContinuation,
    ) {
        let hit = storage.borrow_mut().find_unverified_certificate(&request.interest, crypto.as_ref());
        if let Some(cert) = hit {
            debug!(name = %cert.name(), "unverified cache hit");
            continuation(cert, state);
            return;
        }

        let storage_for_insert = storage.clone();
        self.do_fetch(&storage, &crypto, request, state, Box::new(move |result, state| {
            if state.has_outcome() {
                // Cancelled while the fetch was in flight.
                return;
            }
            match result {
                Ok(cert) => {
                    storage_for_insert.borrow_mut().cache_unverified_certificate(cert.clone());
                    continuation(cert, state);
                }
                Err(err) => state.fail(err),
            }
        }));
    }
}

/// Always fails; a validator with no fetcher at all is given this by
/// default.
#[derive(Debug, Default)]
pub struct OfflineFetcher;

impl CertificateFetcher for OfflineFetcher {
    fn do_fetch(
        &mut self,
        _storage: &Rc<RefCell<CertificateStorage>>,
        _crypto: &Rc<dyn CryptoProvider>,
        request: CertificateRequest,
        state: ValidationState,
        on_fetched: DoFetchContinuation,
    ) {
        on_fetched(Err(ValidationError::new(
            ValidationErrorCode::CannotRetrieveCertificate,
            format!("offline fetcher cannot retrieve {}", request.interest.name),
        )), state);
    }
}

/// Resolves only from the bound storage's trust anchors and verified
/// cache -- never touches the network.
#[derive(Debug, Default)]
pub struct CertificateFetcherFromStorage;

impl CertificateFetcher for CertificateFetcherFromStorage {
    fn do_fetch(
        &mut self,
        storage: &Rc<RefCell<CertificateStorage>>,
        crypto: &Rc<dyn CryptoProvider>,
        request: CertificateRequest,
        state: ValidationState,
        on_fetched: DoFetchContinuation,
    ) {
        let found = storage.borrow_mut().find_trusted_certificate(&request.interest, crypto.as_ref());
        match found {
            Some(cert) => on_fetched(Ok(cert), state),
            None => on_fetched(Err(ValidationError::new(
                ValidationErrorCode::CannotRetrieveCertificate,
                format!("{} is not present in storage", request.interest.name),
            )), state),
        }
    }
}

/// The external network capability a [`CertificateFetcherFromNetwork`]
/// depends on. A real implementation would drive an NDN Face; the
/// wire protocol itself is out of scope here.
pub trait Face {
    /// Expresses `interest`, arranging for exactly one of `on_data`,
    /// `on_timeout`, or `on_nack` to be invoked once (possibly
    /// synchronously, possibly later).
    fn express_interest(
        &mut self,
        interest: Interest,
        on_data: Box<dyn FnOnce(Data)>,
        on_timeout: Box<dyn FnOnce()>,
        on_nack: Box<dyn FnOnce()>,
    );
}

/// Retrieves certificates over the network via a [`Face`], retrying
/// timeouts and NACKs up to `request.retries_left` times.
pub struct CertificateFetcherFromNetwork<F> {
    face: Rc<RefCell<F>>,
}

impl<F: Face + 'static> CertificateFetcherFromNetwork<F> {
    /// Creates a fetcher driven by `face`.
    pub fn new(face: Rc<RefCell<F>>) -> Self {
        CertificateFetcherFromNetwork { face }
    }

    fn express(
        face: Rc<RefCell<F>>,
        request: CertificateRequest,
        state: ValidationState,
        on_fetched: Rc<RefCell<Option<DoFetchContinuation>>>,
    ) {
        let interest = request.interest.clone();
        let retries_left = request.retries_left;

        let data_face = face.clone();
        let data_state = state.clone();
        let data_request = request.clone();
        let data_cont = on_fetched.clone();
        let on_data = Box::new(move |data: Data| {
            match CertificateV2::decode(data) {
                Ok(cert) => finish(&data_cont, Ok(cert), data_state),
                Err(e) => finish(&data_cont, Err(ValidationError::new(
                    ValidationErrorCode::MalformedCertificate, e.to_string())), data_state),
            }
            let _ = (data_face, data_request);
        });

        let timeout_face = face.clone();
        let timeout_state = state.clone();
        let mut timeout_request = request.clone();
        let timeout_cont = on_fetched.clone();
        let on_timeout = Box::new(move || {
            retry_or_give_up(timeout_face, &mut timeout_request, timeout_state, timeout_cont);
        });

        let nack_face = face.clone();
        let nack_state = state.clone();
        let mut nack_request = request.clone();
        let nack_cont = on_fetched.clone();
        let on_nack = Box::new(move || {
            retry_or_give_up(nack_face, &mut nack_request, nack_state, nack_cont);
        });

        debug!(name = %interest.name, retries_left, "expressing certificate interest");
        face.borrow_mut().express_interest(interest, on_data, on_timeout, on_nack);
    }
}

fn retry_or_give_up<F: Face + 'static>(
    face: Rc<RefCell<F>>,
    request: &mut CertificateRequest,
    state: ValidationState,
    on_fetched: Rc<RefCell<Option<DoFetchContinuation>>>,
) {
    if request.retries_left == 0 {
        finish(&on_fetched, Err(ValidationError::new(
            ValidationErrorCode::CannotRetrieveCertificate,
            format!("exhausted retries fetching {}", request.interest.name),
        )), state);
        return;
    }
    request.retries_left -= 1;
    CertificateFetcherFromNetwork::express(face, request.clone(), state, on_fetched);
}

fn finish(
    on_fetched: &Rc<RefCell<Option<DoFetchContinuation>>>,
    result: DoFetchResult,
    state: ValidationState,
) {
    if let Some(cont) = on_fetched.borrow_mut().take() {
        cont(result, state);
    }
}

impl<F: Face + 'static> CertificateFetcher for CertificateFetcherFromNetwork<F> {
    fn do_fetch(
        &mut self,
        _storage: &Rc<RefCell<CertificateStorage>>,
        _crypto: &Rc<dyn CryptoProvider>,
        request: CertificateRequest,
        state: ValidationState,
        on_fetched: DoFetchContinuation,
    ) {
        Self::express(self.face.clone(), request, state, Rc::new(RefCell::new(Some(on_fetched))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DefaultCryptoProvider;
    use crate::name::Name;
    use crate::state::Packet;
    use crate::time::OffsetClock;
    use std::cell::Cell;

    /// A `Face` test double that always times out, counting attempts.
    #[derive(Default)]
    struct AlwaysTimeout {
        attempts: usize,
    }

    impl Face for AlwaysTimeout {
        fn express_interest(
            &mut self,
            _interest: Interest,
            _on_data: Box<dyn FnOnce(Data)>,
            on_timeout: Box<dyn FnOnce()>,
            _on_nack: Box<dyn FnOnce()>,
        ) {
            self.attempts += 1;
            on_timeout();
        }
    }

    #[test]
    fn network_fetcher_gives_up_after_configured_retries() {
        // Single certificate name requested; 4 timeouts total (initial
        // + 3 retries) -> CANNOT_RETRIEVE_CERTIFICATE.
        let face = Rc::new(RefCell::new(AlwaysTimeout::default()));
        let mut fetcher = CertificateFetcherFromNetwork::new(face.clone());
        let storage = Rc::new(RefCell::new(CertificateStorage::new(Rc::new(OffsetClock::new()))));
        let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);

        let failed = Rc::new(Cell::new(false));
        let failed2 = failed.clone();
        let state = ValidationState::new(
            Packet::Interest(Interest::unsigned(Name::parse("/a/b"))),
            Box::new(|_| {}),
            Box::new(move |_, _| failed2.set(true)),
        );

        let request = CertificateRequest::new(Interest::unsigned(Name::parse("/alice/KEY/k1")));
        fetcher.fetch(storage, crypto, request, state.clone(), Box::new(|_, _| {
            panic!("should not succeed");
        }));

        assert!(failed.get());
        assert_eq!(face.borrow().attempts, DEFAULT_RETRIES as usize + 1);
    }

    #[test]
    fn offline_fetcher_always_fails() {
        let mut fetcher = OfflineFetcher;
        let storage = Rc::new(RefCell::new(CertificateStorage::new(Rc::new(OffsetClock::new()))));
        let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
        let failed = Rc::new(Cell::new(false));
        let failed2 = failed.clone();
        let state = ValidationState::new(
            Packet::Interest(Interest::unsigned(Name::parse("/a/b"))),
            Box::new(|_| {}),
            Box::new(move |_, _| failed2.set(true)),
        );
        let request = CertificateRequest::new(Interest::unsigned(Name::parse("/alice/KEY/k1")));
        fetcher.fetch(storage, crypto, request, state, Box::new(|_, _| panic!("no")));
        assert!(failed.get());
    }
}
