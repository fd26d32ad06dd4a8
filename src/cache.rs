//! Time-indexed certificate cache with lazy, amortized eviction.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::name::Name;
use crate::packet::Interest;
use crate::time::{Clock, Millis};

struct Entry {
    cert: CertificateV2,
    removal_time: Millis,
}

/// Maps certificate names to certificates, evicting entries whose
/// `removalTime` has passed.
///
/// Eviction is lazy: a full scan only happens when `now` has
/// reached the earliest `removalTime` known to the cache, so a `find`
/// between two expirations costs a `BTreeMap` lookup, not a linear scan.
pub struct CertificateCache {
    clock: Rc<dyn Clock>,
    max_lifetime_ms: i64,
    entries: BTreeMap<Name, Entry>,
    next_refresh_time: Millis,
}

impl CertificateCache {
    /// Creates a cache with the given per-entry maximum lifetime.
    pub fn new(clock: Rc<dyn Clock>, max_lifetime_ms: i64) -> Self {
        CertificateCache {
            clock,
            max_lifetime_ms,
            entries: BTreeMap::new(),
            next_refresh_time: Millis::MAX,
        }
    }

    /// Inserts `cert`, computing `removalTime = min(notAfter, now +
    /// maxLifetime)`. A certificate that has already expired is silently
    /// dropped (never cached as already-invalid).
    pub fn insert(&mut self, cert: CertificateV2) {
        let now = self.clock.now_millis();
        let not_after = cert.validity_period().not_after;
        if not_after <= now {
            debug!(name = %cert.name(), "not caching already-expired certificate");
            return;
        }
        let removal_time = not_after.min(now.saturating_add(self.max_lifetime_ms));
        self.next_refresh_time = self.next_refresh_time.min(removal_time);
        self.entries.insert(cert.name().clone(), Entry { cert, removal_time });
    }

    /// Removes any cached entry for `name`.
    pub fn delete(&mut self, name: &Name) {
        self.entries.remove(name);
    }

    /// Empties the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_refresh_time = Millis::MAX;
    }

    /// The number of live entries (after a refresh).
    pub fn len(&mut self) -> usize {
        self.refresh();
        self.entries.len()
    }

    /// Finds the certificate whose name equals, or is the immediate
    /// descendant of, `prefix` (a ceiling lookup followed by a prefix check).
    pub fn find_by_prefix(&mut self, prefix: &Name) -> Option<&CertificateV2> {
        self.refresh();
        if prefix.ends_in_implicit_digest() {
            debug!(%prefix, "prefix ends in an implicit digest component");
        }
        let (name, entry) = self.entries.range(prefix.clone()..).next()?;
        if prefix.is_prefix_of(name) {
            Some(&entry.cert)
        } else {
            None
        }
    }

    /// Finds the first certificate under `interest`'s name that also
    /// matches its selectors. `ChildSelector` is intentionally
    /// ignored.
    pub fn find_by_interest(
        &mut self,
        interest: &Interest,
        crypto: &dyn CryptoProvider,
    ) -> Option<&CertificateV2> {
        self.refresh();
        if interest.selectors.child_selector.is_some() {
            debug!(name = %interest.name, "ChildSelector is not honored by CertificateCache");
        }
        for (name, entry) in self.entries.range(interest.name.clone()..) {
            if !interest.name.is_prefix_of(name) {
                break;
            }
            if interest.matches(entry.cert.data(), crypto) {
                return Some(&entry.cert);
            }
        }
        None
    }

    /// Evicts every entry whose `removalTime` has passed, if `now` has
    /// reached the previously recorded earliest expiry.
    pub fn refresh(&mut self) {
        let now = self.clock.now_millis();
        if now < self.next_refresh_time {
            return;
        }
        self.entries.retain(|_, entry| entry.removal_time > now);
        self.next_refresh_time = self.entries.values()
            .map(|e| e.removal_time)
            .min()
            .unwrap_or(Millis::MAX);
    }
}
