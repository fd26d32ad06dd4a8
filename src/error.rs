//! The two-tier error model used throughout this crate.
//!
//! Programmer errors (bad arguments, duplicate group ids, re-deciding an
//! already-decided [`crate::state::ValidationState`]) are reported
//! synchronously via [`Error`] and the crate-wide [`Result`] alias.
//! Validation failures discovered while resolving a certificate chain are a
//! different animal: they are delivered through a callback, long after the
//! call that triggered them returned, so they are carried by
//! [`ValidationError`] instead.

use std::fmt;

use crate::name::Name;

/// Crate result specialization for synchronous, programmer-facing errors.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors reported synchronously to the caller.
///
/// These are never delivered through a validation failure callback; they
/// indicate a misuse of the API (a duplicate trust anchor group, a
/// non-positive refresh period, attempting to decide an already-decided
/// `ValidationState`) rather than something untrustworthy about a packet.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// An argument violated a documented precondition.
    #[error("invalid argument: {0}")]
    ArgumentError(String),

    /// A trust anchor group with this id already exists.
    #[error("trust anchor group {0:?} already exists")]
    GroupExists(String),

    /// Attempted a static insert into a dynamic group, or vice versa.
    #[error("group {0:?} kind mismatch: {1}")]
    GroupKindMismatch(String, &'static str),

    /// A certificate's bytes do not conform to the NDN certificate v2
    /// naming and structure convention.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// A [`crate::state::ValidationState`] outcome was already decided.
    #[error("validation outcome was already decided")]
    AlreadyDecided,

    /// The configuration source could not be parsed.
    #[error("invalid trust configuration: {0}")]
    Config(String),

    /// An I/O error surfaced while loading a certificate or directory.
    #[error("I/O error: {0}")]
    Io(String),
}

/// The error taxonomy shared across validation success/failure callbacks.
///
/// Numeric codes `< 256` are reserved by this crate; user code extending the
/// system with its own policies may use codes `>= 256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    /// The packet carries no signature at all.
    NoSignature,
    /// Cryptographic verification of a signature failed.
    InvalidSignature,
    /// Every avenue for retrieving a missing certificate was exhausted.
    CannotRetrieveCertificate,
    /// A certificate's validity period does not cover the current time.
    ExpiredCertificate,
    /// A certificate name was encountered twice while resolving one chain.
    LoopDetected,
    /// A certificate's bytes do not conform to the v2 certificate format.
    MalformedCertificate,
    /// The chain grew beyond the validator's configured `maxDepth`.
    ExceededDepthLimit,
    /// A `KeyLocator` was missing, of the wrong type, or inconsistent.
    InvalidKeyLocator,
    /// A `ValidationPolicy` rejected the packet for a policy-specific reason.
    PolicyError,
    /// An internal invariant was violated; see the attached message.
    ImplementationError,
    /// A code reserved for embedding applications, `>= 256`.
    User(u32),
}

impl ValidationErrorCode {
    /// The numeric code, within this crate's reserved range.
    pub fn code(self) -> u32 {
        match self {
            ValidationErrorCode::NoSignature => 1,
            ValidationErrorCode::InvalidSignature => 2,
            ValidationErrorCode::CannotRetrieveCertificate => 3,
            ValidationErrorCode::ExpiredCertificate => 4,
            ValidationErrorCode::LoopDetected => 5,
            ValidationErrorCode::MalformedCertificate => 6,
            ValidationErrorCode::ExceededDepthLimit => 7,
            ValidationErrorCode::InvalidKeyLocator => 8,
            ValidationErrorCode::PolicyError => 9,
            ValidationErrorCode::ImplementationError => 10,
            ValidationErrorCode::User(code) => code,
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationErrorCode::NoSignature => write!(f, "NO_SIGNATURE"),
            ValidationErrorCode::InvalidSignature => write!(f, "INVALID_SIGNATURE"),
            ValidationErrorCode::CannotRetrieveCertificate =>
                write!(f, "CANNOT_RETRIEVE_CERTIFICATE"),
            ValidationErrorCode::ExpiredCertificate => write!(f, "EXPIRED_CERTIFICATE"),
            ValidationErrorCode::LoopDetected => write!(f, "LOOP_DETECTED"),
            ValidationErrorCode::MalformedCertificate => write!(f, "MALFORMED_CERTIFICATE"),
            ValidationErrorCode::ExceededDepthLimit => write!(f, "EXCEEDED_DEPTH_LIMIT"),
            ValidationErrorCode::InvalidKeyLocator => write!(f, "INVALID_KEY_LOCATOR"),
            ValidationErrorCode::PolicyError => write!(f, "POLICY_ERROR"),
            ValidationErrorCode::ImplementationError => write!(f, "IMPLEMENTATION_ERROR"),
            ValidationErrorCode::User(code) => write!(f, "USER_ERROR({})", code),
        }
    }
}

/// A validation failure, delivered to a caller's failure callback.
///
/// Unlike [`Error`], this is never returned from a function call; it only
/// ever reaches application code through the `onFailure` callback passed to
/// [`crate::validator::Validator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    code: ValidationErrorCode,
    info: String,
}

impl ValidationError {
    /// Creates a new validation error with the given code and message.
    pub fn new(code: ValidationErrorCode, info: impl Into<String>) -> Self {
        ValidationError { code, info: info.into() }
    }

    /// The error's taxonomy code.
    pub fn code(&self) -> ValidationErrorCode {
        self.code
    }

    /// A human-readable description of the failure.
    pub fn info(&self) -> &str {
        &self.info
    }

    pub(crate) fn loop_detected(name: &Name) -> Self {
        Self::new(ValidationErrorCode::LoopDetected,
                  format!("certificate name {} seen twice while resolving chain", name))
    }

    pub(crate) fn exceeded_depth_limit(max_depth: usize) -> Self {
        Self::new(ValidationErrorCode::ExceededDepthLimit,
                  format!("certificate chain exceeded configured max depth {}", max_depth))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.info)
    }
}

impl std::error::Error for ValidationError {}
