//! End-to-end `Validator` scenarios not already exercised by a module's own
//! unit tests: wrong-hierarchy rejection, certificate loops, a full-length
//! chain hitting the depth limit, and command-Interest replay defense
//! wired through a live `Validator` rather than the tracker in isolation.
//!
//! Accept-all bypass, a two-hop hierarchy success, network-fetch retry
//! exhaustion, cache eviction, and dynamic trust-anchor directories each
//! already have a focused unit test next to the code they exercise
//! (`validator.rs`, `fetcher.rs`, `cache.rs`, `trust_anchor.rs`); this file
//! does not repeat them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ndn_security::error::ValidationErrorCode;
use ndn_security::fetcher::{CertificateRequest, Face};
use ndn_security::policy::{CommandInterest, SimpleHierarchy, ValidationPolicy};
use ndn_security::replay::{CommandInterestReplayTracker, Options};
use ndn_security::time::OffsetClock;
use ndn_security::{CertificateV2, Clock, CryptoProvider, Data, DefaultCryptoProvider, Interest, Validator};
use ndn_security::packet::{ContentType, KeyLocator, MetaInfo, SignatureInfo, SignatureType, ValidityPeriod};
use ndn_security::name::Name;
use ndn_security::storage::CertificateStorage;
use ndn_security::fetcher::CertificateFetcherFromNetwork;

fn unsigned_cert(name: &str, locator: &str) -> CertificateV2 {
    let data = Data {
        name: Name::parse(name),
        meta_info: MetaInfo { content_type: ContentType::Key, freshness_period_ms: Some(3_600_000) },
        content: vec![1, 2, 3],
        signature_info: SignatureInfo {
            signature_type: SignatureType::Sha256WithEcdsa,
            key_locator: Some(KeyLocator::KeyName(Name::parse(locator))),
            validity_period: Some(ValidityPeriod::new(0, 9_999_999_999_999).unwrap()),
        },
        signature_value: vec![0; 64],
    };
    CertificateV2::decode(data).unwrap()
}

fn unsigned_data(name: &str, locator: &str) -> Data {
    Data {
        name: Name::parse(name),
        meta_info: MetaInfo::default(),
        content: b"payload".to_vec(),
        signature_info: SignatureInfo {
            signature_type: SignatureType::Sha256WithEcdsa,
            key_locator: Some(KeyLocator::KeyName(Name::parse(locator))),
            validity_period: None,
        },
        signature_value: vec![0; 64],
    }
}

#[test]
fn s3_wrong_hierarchy_fails_with_invalid_key_locator() {
    // Data named outside the signer's namespace is rejected before any
    // certificate is ever fetched.
    let clock: Rc<dyn Clock> = Rc::new(OffsetClock::new());
    let storage = Rc::new(RefCell::new(CertificateStorage::new(clock.clone())));
    let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
    let validator = Validator::offline(SimpleHierarchy, storage, crypto, clock);

    let data = unsigned_data("/evil/hello", "/root/user/KEY/b");

    let failure_code = Rc::new(Cell::new(None));
    let failure_code2 = failure_code.clone();
    validator.validate_data(
        data,
        |_| panic!("should not succeed"),
        move |_, e| failure_code2.set(Some(e.code())),
    );
    assert_eq!(failure_code.get(), Some(ValidationErrorCode::InvalidKeyLocator));
}

/// A `ValidationPolicy` that trusts whoever a packet's `KeyLocator` names,
/// with no namespace restriction -- used here only to force a certificate
/// loop regardless of hierarchy, the way a permissive test deployment might
/// configure trust.
#[derive(Debug)]
struct AnyKeyPolicy;

impl ValidationPolicy for AnyKeyPolicy {
    fn check_policy_data(&self, data: &Data, state: &ndn_security::ValidationState) -> Option<CertificateRequest> {
        match data.signature_info.key_locator.as_ref().and_then(|kl| kl.name()) {
            Some(name) => Some(CertificateRequest::new(Interest::unsigned(name.clone()))),
            None => {
                state.fail(ndn_security::ValidationError::new(
                    ValidationErrorCode::InvalidKeyLocator, "no KEYNAME locator"));
                None
            }
        }
    }

    fn check_policy_interest(&self, interest: &Interest, state: &ndn_security::ValidationState) -> Option<CertificateRequest> {
        match interest.signature_info.as_ref().and_then(|si| si.key_locator.as_ref()).and_then(|kl| kl.name()) {
            Some(name) => Some(CertificateRequest::new(Interest::unsigned(name.clone()))),
            None => {
                state.fail(ndn_security::ValidationError::new(
                    ValidationErrorCode::InvalidKeyLocator, "no KEYNAME locator"));
                None
            }
        }
    }
}

/// A `Face` double backed by a fixed set of certificates, found by
/// `KeyLocator` prefix match the way `CertificateCache::find_by_interest`
/// would find them in a real network.
struct MapFace {
    certs: HashMap<String, Data>,
}

impl Face for MapFace {
    fn express_interest(
        &mut self,
        interest: Interest,
        on_data: Box<dyn FnOnce(Data)>,
        on_timeout: Box<dyn FnOnce()>,
        _on_nack: Box<dyn FnOnce()>,
    ) {
        let hit = self.certs.values().find(|d| interest.name.is_prefix_of(&d.name)).cloned();
        match hit {
            Some(data) => on_data(data),
            None => on_timeout(),
        }
    }
}

#[test]
fn s5_certificate_loop_is_detected() {
    // Cert A is signed by B's key and cert B is signed by A's key;
    // resolving either one forever chases the other until the second visit
    // to an already-seen key name is caught.
    let cert_a = unsigned_cert("/groupA/KEY/ka/groupB/1", "/groupB/KEY/kb");
    let cert_b = unsigned_cert("/groupB/KEY/kb/groupA/1", "/groupA/KEY/ka");

    let mut certs = HashMap::new();
    certs.insert("a".to_string(), cert_a.data().clone());
    certs.insert("b".to_string(), cert_b.data().clone());
    let face = Rc::new(RefCell::new(MapFace { certs }));

    let clock: Rc<dyn Clock> = Rc::new(OffsetClock::new());
    let storage = Rc::new(RefCell::new(CertificateStorage::new(clock.clone())));
    let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
    let validator = Validator::new(
        AnyKeyPolicy,
        CertificateFetcherFromNetwork::new(face),
        storage,
        crypto,
        clock,
    );

    let data = unsigned_data("/groupA/hello", "/groupA/KEY/ka");
    let failure_code = Rc::new(Cell::new(None));
    let failure_code2 = failure_code.clone();
    validator.validate_data(
        data,
        |_| panic!("should not succeed"),
        move |_, e| failure_code2.set(Some(e.code())),
    );
    assert_eq!(failure_code.get(), Some(ValidationErrorCode::LoopDetected));
}

#[test]
fn s6_chain_of_26_certificates_exceeds_default_depth_limit() {
    // A straight chain 26 links deep, under the default maxDepth of 25,
    // fails once the 25th resolved link still needs to fetch a 26th.
    let mut certs = HashMap::new();
    for i in 0..26 {
        let name = format!("/c{i}/KEY/k{i}/issuer/1");
        let issuer_locator = format!("/c{}/KEY/k{}", i + 1, i + 1);
        certs.insert(i.to_string(), unsigned_cert(&name, &issuer_locator).data().clone());
    }
    let face = Rc::new(RefCell::new(MapFace { certs }));

    let clock: Rc<dyn Clock> = Rc::new(OffsetClock::new());
    let storage = Rc::new(RefCell::new(CertificateStorage::new(clock.clone())));
    let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
    let validator = Validator::new(
        AnyKeyPolicy,
        CertificateFetcherFromNetwork::new(face),
        storage,
        crypto,
        clock,
    );

    let data = unsigned_data("/c0/hello", "/c0/KEY/k0");
    let failure_code = Rc::new(Cell::new(None));
    let failure_code2 = failure_code.clone();
    validator.validate_data(
        data,
        |_| panic!("should not succeed"),
        move |_, e| failure_code2.set(Some(e.code())),
    );
    assert_eq!(failure_code.get(), Some(ValidationErrorCode::ExceededDepthLimit));
}

fn signed_command(name: &str, timestamp: i64) -> Interest {
    Interest {
        name: Name::parse(name).append(timestamp.to_string().as_str()).append("siginfo").append("sigvalue"),
        selectors: Default::default(),
        signature_info: Some(SignatureInfo {
            signature_type: SignatureType::Sha256WithEcdsa,
            key_locator: Some(KeyLocator::KeyName(Name::parse("/alice/KEY/k1"))),
            validity_period: None,
        }),
        signature_value: Some(vec![0; 64]),
    }
}

#[test]
fn s7_command_interest_monotonicity_through_a_live_validator() {
    // grace=2000, recordLifetime=3_600_000; submitting T=now,
    // T=now-100, T=now+1 from the same key accepts, rejects, accepts.
    let clock = Rc::new(OffsetClock::new());
    let now = clock.now_millis();
    let tracker = Rc::new(RefCell::new(CommandInterestReplayTracker::new(
        clock.clone(),
        Options { grace_period_ms: 2_000, max_records: 1000, record_lifetime_ms: 3_600_000 },
    )));
    let clock_dyn: Rc<dyn Clock> = clock.clone();
    let storage = Rc::new(RefCell::new(CertificateStorage::new(clock_dyn.clone())));
    let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
    let policy = CommandInterest::new(Box::new(ndn_security::policy::AcceptAll), tracker.clone());
    let validator = Validator::offline(policy, storage, crypto, clock_dyn);

    let outcome = |interest: Interest| -> bool {
        let ok = Rc::new(Cell::new(None));
        let on_success = ok.clone();
        let on_failure = ok.clone();
        validator.validate_interest(interest, move |_| on_success.set(Some(true)), move |_, _| on_failure.set(Some(false)));
        ok.get().expect("callback ran synchronously")
    };

    assert!(outcome(signed_command("/alice/cmd", now)));
    assert!(!outcome(signed_command("/alice/cmd", now - 100)));
    assert!(outcome(signed_command("/alice/cmd", now + 1)));
}

#[test]
fn s8_replay_after_record_expiry_is_treated_as_initial() {
    // Same setup as the test above, but the clock advances past recordLifetime
    // before the second Interest, so a smaller timestamp than the first
    // succeeds again instead of being rejected as a replay.
    let clock = Rc::new(OffsetClock::new());
    let now = clock.now_millis();
    let tracker = Rc::new(RefCell::new(CommandInterestReplayTracker::new(
        clock.clone(),
        Options { grace_period_ms: 2_000, max_records: 1000, record_lifetime_ms: 3_600_000 },
    )));
    let clock_dyn: Rc<dyn Clock> = clock.clone();
    let storage = Rc::new(RefCell::new(CertificateStorage::new(clock_dyn.clone())));
    let crypto: Rc<dyn CryptoProvider> = Rc::new(DefaultCryptoProvider);
    let policy = CommandInterest::new(Box::new(ndn_security::policy::AcceptAll), tracker.clone());
    let validator = Validator::offline(policy, storage, crypto, clock_dyn);

    let outcome = |interest: Interest| -> bool {
        let ok = Rc::new(Cell::new(None));
        let on_success = ok.clone();
        let on_failure = ok.clone();
        validator.validate_interest(interest, move |_| on_success.set(Some(true)), move |_, _| on_failure.set(Some(false)));
        ok.get().expect("callback ran synchronously")
    };

    assert!(outcome(signed_command("/alice/cmd", now)));
    assert_eq!(tracker.borrow().len(), 1);

    clock.advance(3_600_001);
    let later_now = clock.now_millis();
    assert!(outcome(signed_command("/alice/cmd", later_now)));
    // The stale record was evicted, not accumulated alongside a new one:
    // the key is tracked exactly as if this were its first command ever.
    assert_eq!(tracker.borrow().len(), 1);
}
