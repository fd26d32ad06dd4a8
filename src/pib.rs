//! A minimal stand-in for the NDN Public Information Base.
//!
//! A real PIB is backed by a TPM or platform keystore and is explicitly out
//! of scope here. This module defines only the seam
//! [`crate::policy::FromPib`] is grounded on: a lookup from key name to
//! that key's default certificate.

use std::collections::HashMap;
use std::fmt;

use crate::cert::CertificateV2;
use crate::name::Name;

/// The capability [`crate::policy::FromPib`] depends on.
pub trait Pib: fmt::Debug {
    /// The default certificate for `key_name`, if the PIB has one.
    fn default_certificate_for(&self, key_name: &Name) -> Option<CertificateV2>;
}

/// An in-memory `Pib`, useful for tests and for small embedded deployments
/// that provision keys out of band.
#[derive(Debug, Default)]
pub struct MemoryPib {
    certificates: HashMap<Name, CertificateV2>,
}

impl MemoryPib {
    /// Creates an empty PIB.
    pub fn new() -> Self {
        MemoryPib::default()
    }

    /// Registers `cert` as the default certificate for its own key name.
    pub fn add_default_certificate(&mut self, cert: CertificateV2) {
        self.certificates.insert(cert.key_name(), cert);
    }
}

impl Pib for MemoryPib {
    fn default_certificate_for(&self, key_name: &Name) -> Option<CertificateV2> {
        self.certificates.get(key_name).cloned()
    }
}
