//! Named Data Networking security v2: trust-policy driven certificate
//! chain validation.
//!
//! This crate implements the certificate-chain validator, trust store, and
//! command-Interest replay defense of NDN's "security v2" subsystem: given
//! a signed Data packet or command Interest, a [`Validator`] walks the
//! `KeyLocator` chain back to a configured trust anchor, verifying every
//! link, and reports the outcome through `onSuccess`/`onFailure`
//! callbacks rather than a blocking return value.
//!
//! A non-goal of this crate is the NDN wire format itself: [`packet`] and
//! [`cert`] model already-decoded packets and certificates, and TLV
//! encoding/decoding is left to a real NDN client library. What this crate
//! owns is everything downstream of that: [`policy`] (what counts as a
//! valid signer for a given packet), [`fetcher`] (how a missing
//! certificate gets retrieved), [`storage`] (trust anchors plus the
//! verified/unverified certificate caches), and [`replay`] (command-Interest
//! timestamp tracking).
//!
//! The crate is built around single-threaded cooperative continuations
//! rather than an async runtime or a task-queue executor: every suspension
//! point (a [`fetcher::CertificateFetcher`] or a [`fetcher::Face`] call)
//! takes a boxed `FnOnce` continuation, and chain resolution is bounded by
//! [`validator::Validator`]'s configured `max_depth`, so plain (bounded)
//! recursion replaces a scheduler. See [`validator`] for the orchestration.

#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod cache;
pub mod cert;
pub mod crypto;
pub mod data_decode;
pub mod error;
pub mod fetcher;
pub mod name;
pub mod packet;
pub mod pib;
pub mod policy;
pub mod replay;
pub mod serialize;
pub mod state;
pub mod storage;
pub mod time;
pub mod trust_anchor;
pub mod validator;

pub use cert::CertificateV2;
pub use crypto::{CryptoProvider, DefaultCryptoProvider};
pub use error::{Error, Result, ValidationError, ValidationErrorCode};
pub use fetcher::{CertificateFetcher, CertificateRequest};
pub use name::Name;
pub use packet::{Data, Interest};
pub use policy::ValidationPolicy;
pub use state::{Packet, ValidationState};
pub use storage::CertificateStorage;
pub use time::{Clock, Millis, SystemClock};
pub use validator::Validator;
