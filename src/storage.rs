//! [`CertificateStorage`]: the façade over trust anchors and the two
//! certificate caches.

use std::path::PathBuf;
use std::rc::Rc;

use crate::cache::CertificateCache;
use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::error::Result;
use crate::name::Name;
use crate::packet::Interest;
use crate::time::Clock;
use crate::trust_anchor::TrustAnchorContainer;

/// Default maximum lifetime for a verified-cache entry: one hour.
pub const DEFAULT_VERIFIED_CERTIFICATE_LIFETIME_MS: i64 = 3_600_000;
/// Default maximum lifetime for an unverified-cache entry: five minutes.
pub const DEFAULT_UNVERIFIED_CERTIFICATE_LIFETIME_MS: i64 = 5 * 60_000;

/// Binds trust anchors, a verified-certificate cache, and an
/// unverified-certificate cache behind one lookup surface.
pub struct CertificateStorage {
    anchors: TrustAnchorContainer,
    verified: CertificateCache,
    unverified: CertificateCache,
}

impl CertificateStorage {
    /// Creates storage with the default cache lifetimes, all clocked by
    /// `clock`.
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        CertificateStorage {
            anchors: TrustAnchorContainer::new(clock.clone()),
            verified: CertificateCache::new(clock.clone(), DEFAULT_VERIFIED_CERTIFICATE_LIFETIME_MS),
            unverified: CertificateCache::new(clock, DEFAULT_UNVERIFIED_CERTIFICATE_LIFETIME_MS),
        }
    }

    /// Trust anchors, then the verified cache -- certificates the
    /// validator may terminate a chain on without further verification
    /// (used by [`crate::validator::Validator::request_certificate`]).
    pub fn find_trusted_certificate(
        &mut self,
        interest: &Interest,
        crypto: &dyn CryptoProvider,
    ) -> Option<CertificateV2> {
        if let Some(c) = self.anchors.find_by_interest(interest, crypto) {
            return Some(c.clone());
        }
        self.verified.find_by_interest(interest, crypto).cloned()
    }

    /// Whether a certificate matching `prefix` is known in any of the
    /// three stores (anchors, verified, unverified).
    pub fn is_certificate_known(&mut self, prefix: &Name) -> bool {
        self.anchors.find_by_prefix(prefix).is_some()
            || self.verified.find_by_prefix(prefix).is_some()
            || self.unverified.find_by_prefix(prefix).is_some()
    }

    /// Looks a certificate up in the unverified cache only (used by
    /// [`crate::fetcher::CertificateFetcher`]'s first step).
    pub fn find_unverified_certificate(
        &mut self,
        interest: &Interest,
        crypto: &dyn CryptoProvider,
    ) -> Option<CertificateV2> {
        self.unverified.find_by_interest(interest, crypto).cloned()
    }

    /// Caches `cert` as verified.
    pub fn cache_verified_certificate(&mut self, cert: CertificateV2) {
        self.verified.insert(cert);
    }

    /// Caches `cert` as unverified (not yet chained to a trust anchor).
    pub fn cache_unverified_certificate(&mut self, cert: CertificateV2) {
        self.unverified.insert(cert);
    }

    /// Loads a static trust anchor certificate into `group_id`.
    pub fn load_anchor_certificate(&mut self, group_id: &str, cert: CertificateV2) -> Result<()> {
        self.anchors.insert_static(group_id, cert)
    }

    /// Loads a dynamic trust anchor group backed by a file or directory.
    pub fn load_anchor_dynamic(
        &mut self,
        group_id: &str,
        path: impl Into<PathBuf>,
        refresh_period_ms: i64,
        is_directory: bool,
    ) -> Result<()> {
        self.anchors.insert_dynamic(group_id, path, refresh_period_ms, is_directory)
    }

    /// Clears every trust anchor and group.
    pub fn reset_anchors(&mut self) {
        self.anchors.clear();
    }

    /// Clears the verified-certificate cache.
    pub fn reset_verified_certificates(&mut self) {
        self.verified.clear();
    }

    /// Read-only access to the trust anchor container, e.g. for
    /// [`crate::policy::from_pib::FromPib`]'s temporary-anchor dance.
    pub fn anchors_mut(&mut self) -> &mut TrustAnchorContainer {
        &mut self.anchors
    }
}
