//! Trust anchor groups and the container that holds them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::warn;

use crate::cert::CertificateV2;
use crate::crypto::CryptoProvider;
use crate::data_decode::decode_certificate_bytes;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::packet::Interest;
use crate::time::{Clock, Millis};

/// How a [`TrustAnchorGroup`] obtains its certificates.
enum GroupKind {
    /// Anchors added explicitly via [`TrustAnchorContainer::insert_static`].
    Static,
    /// A single file, reread on refresh.
    DynamicFile { path: PathBuf, refresh_period_ms: i64, expire_time: Millis },
    /// All files in a directory, re-enumerated on refresh.
    DynamicDirectory { path: PathBuf, refresh_period_ms: i64, expire_time: Millis },
}

/// A named group of trust anchors.
pub struct TrustAnchorGroup {
    id: String,
    kind: GroupKind,
    /// Names of anchors owned by this group, tracked so that a dynamic
    /// refresh can tell which anchors it should evict.
    owned: BTreeSet<Name>,
}

impl TrustAnchorGroup {
    fn new_static(id: impl Into<String>) -> Self {
        TrustAnchorGroup { id: id.into(), kind: GroupKind::Static, owned: BTreeSet::new() }
    }

    fn is_dynamic(&self) -> bool {
        !matches!(self.kind, GroupKind::Static)
    }

    /// The group's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The anchor names currently owned by this group.
    pub fn anchor_names(&self) -> impl Iterator<Item = &Name> {
        self.owned.iter()
    }

    /// Number of anchors currently owned by this group.
    pub fn len(&self) -> usize {
        self.owned.len()
    }
}

/// Holds all trust anchors, layered into named groups.
///
/// Dynamic groups don't hold a pointer back to the container; the
/// container iterates its own groups and refreshes each one, avoiding an
/// `Rc` cycle.
pub struct TrustAnchorContainer {
    clock: Rc<dyn Clock>,
    anchors: BTreeMap<Name, CertificateV2>,
    /// Which group owns each anchor name, so eviction can update the
    /// right group's `owned` set.
    owner: HashMap<Name, String>,
    groups: HashMap<String, TrustAnchorGroup>,
}

impl TrustAnchorContainer {
    /// Creates an empty container.
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        TrustAnchorContainer {
            clock,
            anchors: BTreeMap::new(),
            owner: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    /// Inserts `cert` into the static group `group_id`, creating the group
    /// if needed. Idempotent for the same name within a group.
    ///
    /// Fails with [`Error::GroupKindMismatch`] if `group_id` already names
    /// a dynamic group.
    pub fn insert_static(&mut self, group_id: &str, cert: CertificateV2) -> Result<()> {
        let group = self.groups.entry(group_id.to_string())
            .or_insert_with(|| TrustAnchorGroup::new_static(group_id));
        if group.is_dynamic() {
            return Err(Error::GroupKindMismatch(
                group_id.to_string(), "expected static, group is dynamic"));
        }
        let name = cert.name().clone();
        group.owned.insert(name.clone());
        self.owner.insert(name.clone(), group_id.to_string());
        self.anchors.insert(name, cert);
        Ok(())
    }

    /// Registers a dynamic group backed by a single file or a directory of
    /// files, refreshing it once immediately.
    ///
    /// Fails with [`Error::GroupExists`] if `group_id` is already taken,
    /// or [`Error::ArgumentError`] if `refresh_period_ms <= 0`.
    pub fn insert_dynamic(
        &mut self,
        group_id: &str,
        path: impl Into<PathBuf>,
        refresh_period_ms: i64,
        is_directory: bool,
    ) -> Result<()> {
        if self.groups.contains_key(group_id) {
            return Err(Error::GroupExists(group_id.to_string()));
        }
        if refresh_period_ms <= 0 {
            return Err(Error::ArgumentError(
                "refreshPeriod must be > 0 for a dynamic trust anchor group".to_string()));
        }
        let path = path.into();
        let kind = if is_directory {
            GroupKind::DynamicDirectory { path, refresh_period_ms, expire_time: Millis::MIN }
        } else {
            GroupKind::DynamicFile { path, refresh_period_ms, expire_time: Millis::MIN }
        };
        self.groups.insert(group_id.to_string(), TrustAnchorGroup {
            id: group_id.to_string(),
            kind,
            owned: BTreeSet::new(),
        });
        self.refresh_group(group_id);
        Ok(())
    }

    /// Removes every anchor and every group.
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.owner.clear();
        self.groups.clear();
    }

    /// The number of anchors across all groups.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// A named group, if it exists.
    pub fn group(&self, group_id: &str) -> Option<&TrustAnchorGroup> {
        self.groups.get(group_id)
    }

    /// Removes a single anchor previously inserted into `group_id`, e.g.
    /// to undo [`crate::policy::FromPib`]'s temporary installation. A
    /// no-op if `name` is not owned by `group_id`.
    pub fn remove_from_group(&mut self, group_id: &str, name: &Name) {
        if let Some(group) = self.groups.get_mut(group_id) {
            if group.owned.remove(name) {
                self.anchors.remove(name);
                self.owner.remove(name);
            }
        }
    }

    /// Refreshes every dynamic group, then finds the anchor whose name
    /// equals, or is the immediate descendant of, `prefix`.
    pub fn find_by_prefix(&mut self, prefix: &Name) -> Option<&CertificateV2> {
        self.refresh_all();
        let (name, cert) = self.anchors.range(prefix.clone()..).next()?;
        if prefix.is_prefix_of(name) { Some(cert) } else { None }
    }

    /// Refreshes every dynamic group, then finds the anchor matching
    /// `interest`.
    pub fn find_by_interest(
        &mut self,
        interest: &Interest,
        crypto: &dyn CryptoProvider,
    ) -> Option<&CertificateV2> {
        self.refresh_all();
        for (name, cert) in self.anchors.range(interest.name.clone()..) {
            if !interest.name.is_prefix_of(name) {
                break;
            }
            if interest.matches(cert.data(), crypto) {
                return Some(cert);
            }
        }
        None
    }

    fn refresh_all(&mut self) {
        let ids: Vec<String> = self.groups.keys().cloned().collect();
        for id in ids {
            self.refresh_group(&id);
        }
    }

    /// Runs one refresh pass of a dynamic group. No-op for static
    /// groups and for dynamic groups whose `expireTime` hasn't passed.
    fn refresh_group(&mut self, group_id: &str) {
        let now = self.clock.now_millis();
        let (path, refresh_period_ms, expire_time, is_directory) = {
            let group = match self.groups.get(group_id) {
                Some(g) => g,
                None => return,
            };
            match &group.kind {
                GroupKind::Static => return,
                GroupKind::DynamicFile { path, refresh_period_ms, expire_time } =>
                    (path.clone(), *refresh_period_ms, *expire_time, false),
                GroupKind::DynamicDirectory { path, refresh_period_ms, expire_time } =>
                    (path.clone(), *refresh_period_ms, *expire_time, true),
            }
        };
        if now < expire_time {
            return;
        }

        let files: Vec<PathBuf> = if is_directory {
            match fs::read_dir(&path) {
                Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
                Err(_) => Vec::new(),
            }
        } else if path.exists() {
            vec![path.clone()]
        } else {
            Vec::new()
        };

        let mut old: BTreeSet<Name> = self.groups.get(group_id)
            .map(|g| g.owned.clone())
            .unwrap_or_default();

        for file in &files {
            let bytes = match fs::read(file) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "failed to read trust anchor file");
                    continue;
                }
            };
            let cert = match decode_certificate_bytes(&bytes) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "failed to decode trust anchor file");
                    continue;
                }
            };
            let name = cert.name().clone();
            if old.remove(&name) {
                // Already owned by this group; leave the cached copy in
                // place instead of a spurious remove-then-insert.
                continue;
            }
            self.anchors.insert(name.clone(), cert);
            self.owner.insert(name.clone(), group_id.to_string());
            if let Some(group) = self.groups.get_mut(group_id) {
                group.owned.insert(name);
            }
        }

        // Anything still in `old` disappeared from disk; evict it.
        for stale in &old {
            self.anchors.remove(stale);
            self.owner.remove(stale);
        }
        if let Some(group) = self.groups.get_mut(group_id) {
            for stale in &old {
                group.owned.remove(stale);
            }
            let new_expire = now + refresh_period_ms;
            match &mut group.kind {
                GroupKind::DynamicFile { expire_time, .. } => *expire_time = new_expire,
                GroupKind::DynamicDirectory { expire_time, .. } => *expire_time = new_expire,
                GroupKind::Static => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ContentType, Data, KeyLocator, MetaInfo, SignatureInfo, SignatureType, ValidityPeriod};
    use crate::time::OffsetClock;
    use crate::serialize::encode_certificate;

    fn cert(name: &str) -> CertificateV2 {
        let data = Data {
            name: Name::parse(name),
            meta_info: MetaInfo { content_type: ContentType::Key, freshness_period_ms: Some(0) },
            content: vec![7, 7],
            signature_info: SignatureInfo {
                signature_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator::KeyName(Name::parse("/root/KEY/1/self/1"))),
                validity_period: Some(ValidityPeriod::new(0, i64::MAX / 2).unwrap()),
            },
            signature_value: vec![0; 64],
        };
        CertificateV2::decode(data).unwrap()
    }

    #[test]
    fn static_group_insert_is_idempotent() {
        let clock = Rc::new(OffsetClock::new());
        let mut container = TrustAnchorContainer::new(clock);
        container.insert_static("g1", cert("/alice/KEY/k1/bob/1")).unwrap();
        container.insert_static("g1", cert("/alice/KEY/k1/bob/1")).unwrap();
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn dynamic_requires_positive_refresh_period() {
        let clock = Rc::new(OffsetClock::new());
        let mut container = TrustAnchorContainer::new(clock);
        let err = container.insert_dynamic("g1", "/nonexistent", 0, false).unwrap_err();
        assert!(matches!(err, Error::ArgumentError(_)));
    }

    #[test]
    fn duplicate_group_id_fails() {
        let clock = Rc::new(OffsetClock::new());
        let mut container = TrustAnchorContainer::new(clock);
        container.insert_static("g1", cert("/alice/KEY/k1/bob/1")).unwrap();
        let err = container.insert_dynamic("g1", "/tmp/whatever", 1000, false).unwrap_err();
        assert!(matches!(err, Error::GroupExists(_)));
    }

    #[test]
    fn dynamic_directory_tracks_filesystem_changes() {
        // Empty dir -> size 0; add a cert file -> size 1; remove it -> size 0.
        let dir = tempdir();
        let clock = Rc::new(OffsetClock::new());
        let mut container = TrustAnchorContainer::new(clock.clone());
        container.insert_dynamic("g1", dir.clone(), 1, true).unwrap();
        assert_eq!(container.len(), 0);

        let cert_path = dir.join("alice.cert");
        fs::write(&cert_path, encode_certificate(cert("/alice/KEY/k1/bob/1"))).unwrap();
        clock.advance(2);
        container.refresh_all();
        assert_eq!(container.len(), 1);

        fs::remove_file(&cert_path).unwrap();
        clock.advance(2);
        container.refresh_all();
        assert_eq!(container.len(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ndn-security-test-{}-{}", std::process::id(),
                        std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()));
        fs::create_dir_all(&p).unwrap();
        p
    }
}
