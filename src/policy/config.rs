//! The `validator { ... }` configuration schema and its loader.
//!
//! This is deliberately not a general INFO-format parser -- only a small
//! fixed grammar of `rule`/`trust-anchor` blocks is accepted. A hand-rolled tokenizer
//! feeds a small recursive-descent parser; `regex` does the filter and
//! hyper-relation matching the grammar asks for.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::cert::CertificateV2;
use crate::data_decode::decode_certificate_bytes;
use crate::error::{Error, Result, ValidationError, ValidationErrorCode};
use crate::fetcher::CertificateRequest;
use crate::name::Name;
use crate::packet::{Data, Interest, SignatureType};
use crate::state::ValidationState;
use crate::storage::CertificateStorage;

use super::{request_for, ValidationPolicy};

/// Which packet kind a [`ConfigRule`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDirection {
    Data,
    Interest,
}

/// A name comparison relation, as used by both filters and hyper-relation
/// checkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRelation {
    Equal,
    IsPrefixOf,
    IsStrictPrefixOf,
}

impl NameRelation {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "equal" => Ok(NameRelation::Equal),
            "is-prefix-of" => Ok(NameRelation::IsPrefixOf),
            "is-strict-prefix-of" => Ok(NameRelation::IsStrictPrefixOf),
            other => Err(Error::Config(format!("unknown relation {:?}", other))),
        }
    }

    fn holds(self, a: &Name, b: &Name) -> bool {
        match self {
            NameRelation::Equal => a == b,
            NameRelation::IsPrefixOf => a.is_prefix_of(b),
            NameRelation::IsStrictPrefixOf => a.is_strict_prefix_of(b),
        }
    }
}

/// A rule's `filter` clause.
#[derive(Debug, Clone)]
pub enum NameFilter {
    Name { name: Name, relation: NameRelation },
    Regex(String),
}

/// A rule's `checker { key-locator { hyper-relation { ... } } }` clause:
/// match a regex against the key locator name and against the packet
/// name, expand each match, then compare the expansions under `h_relation`.
///
/// `k_expand`/`p_expand` use this crate's regex engine's own replacement
/// syntax (`$1`, `${name}`), not Boost's `\1` convention.
#[derive(Debug, Clone)]
pub struct KeyLocatorCheck {
    pub k_regex: String,
    pub k_expand: String,
    pub h_relation: NameRelation,
    pub p_regex: String,
    pub p_expand: String,
}

/// One `rule { ... }` block.
#[derive(Debug, Clone)]
pub struct ConfigRule {
    pub id: String,
    pub direction: ConfigDirection,
    pub filter: NameFilter,
    pub sig_type: SignatureType,
    pub key_locator: KeyLocatorCheck,
}

/// A `trust-anchor { ... }` block's `type`.
#[derive(Debug, Clone)]
pub enum ConfigAnchorKind {
    File(PathBuf),
    Base64(String),
    Dir(PathBuf),
    Any,
}

/// One `trust-anchor { ... }` block.
#[derive(Debug, Clone)]
pub struct ConfigAnchor {
    pub kind: ConfigAnchorKind,
    pub refresh_ms: i64,
}

/// A rule-driven policy loaded from the configuration grammar.
///
/// Must be a terminal inner policy: it never delegates to a further
/// inner policy of its own.
#[derive(Debug, Clone)]
pub struct ConfigPolicy {
    rules: Vec<ConfigRule>,
    /// Set when the configuration declared `trust-anchor { type any; }`:
    /// every decision bypasses cryptographic validation entirely.
    bypass: bool,
}

impl ConfigPolicy {
    /// Parses `source`, loading any `trust-anchor` blocks
    /// into `storage` as a side effect.
    pub fn load_str(source: &str, storage: &mut CertificateStorage) -> Result<Self> {
        let tokens = tokenize(source);
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let (rules, anchors) = parser.parse_validator()?;

        let mut bypass = false;
        for (i, anchor) in anchors.into_iter().enumerate() {
            let group_id = format!("config-anchor-{}", i);
            match anchor.kind {
                ConfigAnchorKind::Any => bypass = true,
                ConfigAnchorKind::File(path) => {
                    let bytes = fs::read(&path).map_err(|e| Error::Io(e.to_string()))?;
                    let cert = decode_certificate_bytes(&bytes)?;
                    storage.load_anchor_certificate(&group_id, cert)?;
                }
                ConfigAnchorKind::Base64(s) => {
                    use base64::Engine;
                    let bytes = base64::engine::general_purpose::STANDARD.decode(s.trim())
                        .map_err(|e| Error::Config(format!("invalid base64 trust anchor: {}", e)))?;
                    let cert = decode_certificate_bytes(&bytes)?;
                    storage.load_anchor_certificate(&group_id, cert)?;
                }
                ConfigAnchorKind::Dir(path) => {
                    storage.load_anchor_dynamic(&group_id, path, anchor.refresh_ms, true)?;
                }
            }
        }

        Ok(ConfigPolicy { rules, bypass })
    }

    /// Loads configuration from a file on disk.
    pub fn load_file(path: impl AsRef<Path>, storage: &mut CertificateStorage) -> Result<Self> {
        let source = fs::read_to_string(path.as_ref()).map_err(|e| Error::Io(e.to_string()))?;
        Self::load_str(&source, storage)
    }

    fn matching_rule(&self, direction: ConfigDirection, name: &Name) -> Option<&ConfigRule> {
        self.rules.iter()
            .filter(|r| r.direction == direction)
            .find(|r| filter_matches(&r.filter, name))
    }

    fn check(
        &self,
        direction: ConfigDirection,
        name: &Name,
        sig_type: SignatureType,
        key_locator: Option<Name>,
        state: &ValidationState,
    ) -> Option<CertificateRequest> {
        if self.bypass {
            return None;
        }
        let rule = match self.matching_rule(direction, name) {
            Some(r) => r,
            None => {
                state.fail(ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!("no configured rule matches name {}", name),
                ));
                return None;
            }
        };
        if sig_type != rule.sig_type {
            state.fail(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!("rule {:?} requires a different signature type", rule.id),
            ));
            return None;
        }
        let locator = match key_locator {
            Some(l) => l,
            None => {
                state.fail(ValidationError::new(ValidationErrorCode::InvalidKeyLocator, "missing KEYNAME locator"));
                return None;
            }
        };
        if !hyper_relation_holds(&rule.key_locator, &locator, name) {
            state.fail(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!("rule {:?} rejected key locator {} for packet {}", rule.id, locator, name),
            ));
            return None;
        }
        Some(request_for(locator))
    }
}

impl ValidationPolicy for ConfigPolicy {
    fn check_policy_data(&self, data: &Data, state: &ValidationState) -> Option<CertificateRequest> {
        let locator = data.signature_info.key_locator.as_ref().and_then(|l| l.name()).cloned();
        self.check(ConfigDirection::Data, &data.name, data.signature_info.signature_type, locator, state)
    }

    fn check_policy_interest(&self, interest: &Interest, state: &ValidationState) -> Option<CertificateRequest> {
        let sig_info = match interest.signature_info.as_ref() {
            Some(s) => s,
            None => {
                state.fail(ValidationError::new(ValidationErrorCode::NoSignature, "interest carries no signature"));
                return None;
            }
        };
        let locator = sig_info.key_locator.as_ref().and_then(|l| l.name()).cloned();
        self.check(ConfigDirection::Interest, &interest.name, sig_info.signature_type, locator, state)
    }
}

fn filter_matches(filter: &NameFilter, name: &Name) -> bool {
    match filter {
        NameFilter::Name { name: fname, relation } => relation.holds(fname, name),
        NameFilter::Regex(pattern) => Regex::new(pattern).map(|re| re.is_match(&name.to_string())).unwrap_or(false),
    }
}

fn hyper_relation_holds(check: &KeyLocatorCheck, key_locator: &Name, packet_name: &Name) -> bool {
    let expand = |pattern: &str, template: &str, haystack: &str| -> Option<String> {
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(haystack)?;
        let mut out = String::new();
        caps.expand(template, &mut out);
        Some(out)
    };
    let k = match expand(&check.k_regex, &check.k_expand, &key_locator.to_string()) {
        Some(k) => k,
        None => return false,
    };
    let p = match expand(&check.p_regex, &check.p_expand, &packet_name.to_string()) {
        Some(p) => p,
        None => return false,
    };
    check.h_relation.holds(&Name::parse(&k), &Name::parse(&p))
}

fn parse_sig_type(s: &str) -> Result<SignatureType> {
    match s {
        "rsa-sha256" => Ok(SignatureType::Sha256WithRsa),
        "ecdsa-sha256" => Ok(SignatureType::Sha256WithEcdsa),
        other => Err(Error::Config(format!("unknown sig-type {:?}", other))),
    }
}

/// Normalizes a `refresh <digits>(s|m|h)?` value; zero or unit-less
/// collapses to the one-hour default.
fn parse_refresh(s: &str) -> Result<i64> {
    let (digits, unit) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - 1], Some(c)),
        _ => (s, None),
    };
    let n: i64 = digits.parse().map_err(|_| Error::Config(format!("invalid refresh value {:?}", s)))?;
    if n == 0 {
        return Ok(3_600_000);
    }
    let ms = match unit {
        Some('s') | None => n * 1_000,
        Some('m') => n * 60_000,
        Some('h') => n * 3_600_000,
        Some(other) => return Err(Error::Config(format!("unknown refresh unit {:?}", other))),
    };
    Ok(ms)
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '{' {
            tokens.push("{".to_string());
            chars.next();
        } else if c == '}' {
            tokens.push("}".to_string());
            chars.next();
        } else if c == ';' {
            tokens.push(";".to_string());
            chars.next();
        } else if c == '"' {
            chars.next();
            let start = i + 1;
            let mut end = start;
            while let Some(&(j, cc)) = chars.peek() {
                if cc == '"' {
                    end = j;
                    chars.next();
                    break;
                }
                chars.next();
                end = j + cc.len_utf8();
            }
            tokens.push(source[start..end].to_string());
        } else if c == '#' {
            while let Some(&(_, cc)) = chars.peek() {
                if cc == '\n' {
                    break;
                }
                chars.next();
            }
        } else {
            let start = i;
            let mut end = i;
            while let Some(&(j, cc)) = chars.peek() {
                if cc.is_whitespace() || matches!(cc, '{' | '}' | ';' | '"') {
                    break;
                }
                chars.next();
                end = j + cc.len_utf8();
            }
            tokens.push(source[start..end].to_string());
        }
    }
    tokens
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|s| s.as_str())
    }

    fn next(&mut self) -> Result<&'a str> {
        let tok = self.tokens.get(self.pos).ok_or_else(|| Error::Config("unexpected end of configuration".to_string()))?;
        self.pos += 1;
        Ok(tok.as_str())
    }

    fn expect(&mut self, expected: &str) -> Result<()> {
        let tok = self.next()?;
        if tok != expected {
            return Err(Error::Config(format!("expected {:?}, found {:?}", expected, tok)));
        }
        Ok(())
    }

    fn skip_semis(&mut self) {
        while self.peek() == Some(";") {
            self.pos += 1;
        }
    }

    fn parse_validator(&mut self) -> Result<(Vec<ConfigRule>, Vec<ConfigAnchor>)> {
        self.expect("validator")?;
        self.expect("{")?;
        let mut rules = Vec::new();
        let mut anchors = Vec::new();
        loop {
            self.skip_semis();
            match self.peek() {
                Some("rule") => rules.push(self.parse_rule()?),
                Some("trust-anchor") => anchors.push(self.parse_anchor()?),
                Some("}") => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in validator block", other))),
                None => return Err(Error::Config("unterminated validator block".to_string())),
            }
        }
        Ok((rules, anchors))
    }

    fn parse_rule(&mut self) -> Result<ConfigRule> {
        self.expect("rule")?;
        self.expect("{")?;
        let mut id = None;
        let mut direction = None;
        let mut filter = None;
        let mut sig_type = None;
        let mut key_locator = None;
        loop {
            self.skip_semis();
            match self.peek() {
                Some("id") => {
                    self.pos += 1;
                    id = Some(self.next()?.to_string());
                }
                Some("for") => {
                    self.pos += 1;
                    direction = Some(match self.next()? {
                        "data" => ConfigDirection::Data,
                        "interest" => ConfigDirection::Interest,
                        other => return Err(Error::Config(format!("unknown direction {:?}", other))),
                    });
                }
                Some("filter") => {
                    self.pos += 1;
                    filter = Some(self.parse_filter()?);
                }
                Some("checker") => {
                    self.pos += 1;
                    let (st, kl) = self.parse_checker()?;
                    sig_type = Some(st);
                    key_locator = Some(kl);
                }
                Some("}") => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in rule block", other))),
                None => return Err(Error::Config("unterminated rule block".to_string())),
            }
        }
        Ok(ConfigRule {
            id: id.ok_or_else(|| Error::Config("rule missing id".to_string()))?,
            direction: direction.ok_or_else(|| Error::Config("rule missing for data|interest".to_string()))?,
            filter: filter.ok_or_else(|| Error::Config("rule missing filter".to_string()))?,
            sig_type: sig_type.ok_or_else(|| Error::Config("rule missing checker sig-type".to_string()))?,
            key_locator: key_locator.ok_or_else(|| Error::Config("rule missing checker key-locator".to_string()))?,
        })
    }

    fn parse_filter(&mut self) -> Result<NameFilter> {
        self.expect("{")?;
        self.expect("type")?;
        self.expect("name")?;
        let mut name = None;
        let mut is_regex = false;
        let mut relation = NameRelation::IsPrefixOf;
        loop {
            self.skip_semis();
            match self.peek() {
                Some("name") => {
                    self.pos += 1;
                    name = Some(Name::parse(self.next()?));
                }
                Some("regex") => {
                    self.pos += 1;
                    name = Some(Name::parse(self.next()?));
                    is_regex = true;
                }
                Some("relation") => {
                    self.pos += 1;
                    relation = NameRelation::parse(self.next()?)?;
                }
                Some("}") => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in filter block", other))),
                None => return Err(Error::Config("unterminated filter block".to_string())),
            }
        }
        let name = name.ok_or_else(|| Error::Config("filter missing name|regex".to_string()))?;
        if is_regex {
            Ok(NameFilter::Regex(name.to_string()))
        } else {
            Ok(NameFilter::Name { name, relation })
        }
    }

    fn parse_checker(&mut self) -> Result<(SignatureType, KeyLocatorCheck)> {
        self.expect("{")?;
        self.expect("type")?;
        self.expect("customized")?;
        let mut sig_type = None;
        let mut key_locator = None;
        loop {
            self.skip_semis();
            match self.peek() {
                Some("sig-type") => {
                    self.pos += 1;
                    sig_type = Some(parse_sig_type(self.next()?)?);
                }
                Some("key-locator") => {
                    self.pos += 1;
                    key_locator = Some(self.parse_key_locator()?);
                }
                Some("}") => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in checker block", other))),
                None => return Err(Error::Config("unterminated checker block".to_string())),
            }
        }
        Ok((
            sig_type.ok_or_else(|| Error::Config("checker missing sig-type".to_string()))?,
            key_locator.ok_or_else(|| Error::Config("checker missing key-locator".to_string()))?,
        ))
    }

    fn parse_key_locator(&mut self) -> Result<KeyLocatorCheck> {
        self.expect("{")?;
        self.expect("type")?;
        self.expect("name")?;
        self.expect("hyper-relation")?;
        self.expect("{")?;
        let mut k_regex = None;
        let mut k_expand = None;
        let mut h_relation = None;
        let mut p_regex = None;
        let mut p_expand = None;
        loop {
            self.skip_semis();
            match self.peek() {
                Some("k-regex") => { self.pos += 1; k_regex = Some(self.next()?.to_string()); }
                Some("k-expand") => { self.pos += 1; k_expand = Some(self.next()?.to_string()); }
                Some("h-relation") => { self.pos += 1; h_relation = Some(NameRelation::parse(self.next()?)?); }
                Some("p-regex") => { self.pos += 1; p_regex = Some(self.next()?.to_string()); }
                Some("p-expand") => { self.pos += 1; p_expand = Some(self.next()?.to_string()); }
                Some("}") => { self.pos += 1; break; }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in hyper-relation block", other))),
                None => return Err(Error::Config("unterminated hyper-relation block".to_string())),
            }
        }
        self.expect("}")?; // closes key-locator
        Ok(KeyLocatorCheck {
            k_regex: k_regex.ok_or_else(|| Error::Config("hyper-relation missing k-regex".to_string()))?,
            k_expand: k_expand.ok_or_else(|| Error::Config("hyper-relation missing k-expand".to_string()))?,
            h_relation: h_relation.ok_or_else(|| Error::Config("hyper-relation missing h-relation".to_string()))?,
            p_regex: p_regex.ok_or_else(|| Error::Config("hyper-relation missing p-regex".to_string()))?,
            p_expand: p_expand.ok_or_else(|| Error::Config("hyper-relation missing p-expand".to_string()))?,
        })
    }

    fn parse_anchor(&mut self) -> Result<ConfigAnchor> {
        self.expect("trust-anchor")?;
        self.expect("{")?;
        self.expect("type")?;
        let kind_word = self.next()?.to_string();
        let mut path_or_value = None;
        let mut refresh_ms = 0;
        loop {
            self.skip_semis();
            match self.peek() {
                Some("file-name") | Some("base64-string") | Some("dir") => {
                    self.pos += 1;
                    path_or_value = Some(self.next()?.to_string());
                }
                Some("refresh") => {
                    self.pos += 1;
                    refresh_ms = parse_refresh(self.next()?)?;
                }
                Some("}") => {
                    self.pos += 1;
                    break;
                }
                Some(other) => return Err(Error::Config(format!("unexpected token {:?} in trust-anchor block", other))),
                None => return Err(Error::Config("unterminated trust-anchor block".to_string())),
            }
        }
        let kind = match kind_word.as_str() {
            "any" => ConfigAnchorKind::Any,
            "file" => ConfigAnchorKind::File(PathBuf::from(
                path_or_value.ok_or_else(|| Error::Config("trust-anchor type file missing file-name".to_string()))?,
            )),
            "base64" => ConfigAnchorKind::Base64(
                path_or_value.ok_or_else(|| Error::Config("trust-anchor type base64 missing base64-string".to_string()))?,
            ),
            "dir" => ConfigAnchorKind::Dir(PathBuf::from(
                path_or_value.ok_or_else(|| Error::Config("trust-anchor type dir missing dir".to_string()))?,
            )),
            other => return Err(Error::Config(format!("unknown trust-anchor type {:?}", other))),
        };
        if refresh_ms == 0 {
            refresh_ms = 3_600_000;
        }
        Ok(ConfigAnchor { kind, refresh_ms })
    }
}
