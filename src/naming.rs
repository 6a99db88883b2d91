//! Naming resolver: (family, generation, subname) -> physical collection name.
//!
//! Формат:
//!   <ns>.<family>.g<N>            default (unnamed) subcollection
//!   <ns>.<family>.g<N>.<subname>  named subcollection
//!   <ns>.$catalog                 generation catalog (reserved)
//!
//! `family` and `subname` are escaped: every byte outside `[A-Za-z0-9_-]` is
//! written as `%XX`, so `.` only ever appears as the separator and `$` never
//! appears in an escaped component. This keeps the mapping injective and lets
//! `parse` recover the triple from a storage listing.

use crate::consts::{
    CATALOG_COMPONENT, COUNTER_KEY_PREFIX, DEFAULT_NAMESPACE, GEN_MARKER, NAME_SEP,
    POINTER_KEY_PREFIX,
};
use crate::errors::{Result, SnapError};

/// Decoded physical collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalName {
    pub family: String,
    pub generation: u64,
    /// None = the default subcollection.
    pub subname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolver {
    namespace: String,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl NameResolver {
    /// Namespace must be non-empty `[A-Za-z0-9_-]+`.
    pub fn new(namespace: &str) -> Result<Self> {
        if namespace.is_empty() || !namespace.bytes().all(is_plain) {
            return Err(SnapError::invalid(format!(
                "namespace '{}' must be non-empty [A-Za-z0-9_-]",
                namespace
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn physical_name(
        &self,
        family: &str,
        generation: u64,
        subname: Option<&str>,
    ) -> Result<String> {
        let mut name = self.generation_prefix(family, generation)?;
        if let Some(sub) = subname {
            if sub.is_empty() {
                return Err(SnapError::invalid("subcollection name must not be empty"));
            }
            name.push(NAME_SEP);
            name.push_str(&escape(sub));
        }
        Ok(name)
    }

    /// `<ns>.<family>.g<N>`, the name of the default subcollection.
    pub fn generation_prefix(&self, family: &str, generation: u64) -> Result<String> {
        if generation == 0 {
            return Err(SnapError::invalid("generation ids start at 1"));
        }
        Ok(format!(
            "{}{}{}",
            self.family_prefix(family)?,
            GEN_MARKER,
            generation
        ))
    }

    /// `<ns>.<family>.`: every physical name of `family` starts with it.
    pub fn family_prefix(&self, family: &str) -> Result<String> {
        check_family(family)?;
        Ok(format!(
            "{}{}{}",
            self.namespace_prefix(),
            escape(family),
            NAME_SEP
        ))
    }

    pub fn namespace_prefix(&self) -> String {
        format!("{}{}", self.namespace, NAME_SEP)
    }

    pub fn catalog_collection(&self) -> String {
        format!("{}{}", self.namespace_prefix(), CATALOG_COMPONENT)
    }

    pub fn counter_key(&self, family: &str) -> Result<String> {
        check_family(family)?;
        Ok(format!("{}:{}:{}", COUNTER_KEY_PREFIX, self.namespace, escape(family)))
    }

    pub fn pointer_key(&self, family: &str) -> Result<String> {
        check_family(family)?;
        Ok(format!("{}:{}:{}", POINTER_KEY_PREFIX, self.namespace, escape(family)))
    }

    /// Inverse of `physical_name`; None for names outside this namespace or non-canonical ones.
    pub fn parse(&self, name: &str) -> Option<PhysicalName> {
        let rest = name.strip_prefix(&self.namespace_prefix())?;
        let mut parts = rest.split(NAME_SEP);
        let fam = parts.next()?;
        let gen_part = parts.next()?;
        let sub = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let family = unescape(fam)?;
        let generation: u64 = gen_part.strip_prefix(GEN_MARKER)?.parse().ok()?;
        if generation == 0 || format!("{}{}", GEN_MARKER, generation) != gen_part {
            return None;
        }
        let subname = match sub {
            Some(s) => Some(unescape(s)?),
            None => None,
        };
        if family.is_empty() || subname.as_deref() == Some("") {
            return None;
        }
        // только каноническая форма, иначе два имени могли бы дать одну тройку
        let canonical = self
            .physical_name(&family, generation, subname.as_deref())
            .ok()?;
        if canonical != name {
            return None;
        }
        Some(PhysicalName {
            family,
            generation,
            subname,
        })
    }
}

fn check_family(family: &str) -> Result<()> {
    if family.is_empty() {
        return Err(SnapError::invalid("family name must not be empty"));
    }
    Ok(())
}

#[inline]
fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if is_plain(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn unescape(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = s.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if is_plain(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_deterministic() {
        let r = NameResolver::default();
        assert_eq!(r.physical_name("daily", 3, None).unwrap(), "snap.daily.g3");
        assert_eq!(
            r.physical_name("daily", 3, Some("by_region")).unwrap(),
            "snap.daily.g3.by_region"
        );
        assert_eq!(
            r.physical_name("daily", 3, None).unwrap(),
            r.physical_name("daily", 3, None).unwrap()
        );
    }

    #[test]
    fn invalid_arguments() {
        let r = NameResolver::default();
        assert!(r.physical_name("", 1, None).is_err());
        assert!(r.physical_name("f", 0, None).is_err());
        assert!(r.physical_name("f", 1, Some("")).is_err());
        assert!(NameResolver::new("").is_err());
        assert!(NameResolver::new("a.b").is_err());
    }

    #[test]
    fn injective_over_tricky_inputs() {
        let r = NameResolver::new("ns").unwrap();
        let families = ["a", "a.g1", "a.b", "a%2E", "$catalog", "a b", "g1", "x.g2.y"];
        let subs = [None, Some("a"), Some("g1"), Some("x.y"), Some("%")];
        let mut seen = HashSet::new();
        for f in families {
            for g in [1u64, 2, 10, 11] {
                for s in subs {
                    let name = r.physical_name(f, g, s).unwrap();
                    assert!(seen.insert(name.clone()), "collision on {name}");
                    let p = r.parse(&name).expect("must parse back");
                    assert_eq!(p.family, f);
                    assert_eq!(p.generation, g);
                    assert_eq!(p.subname.as_deref(), s);
                }
            }
        }
        assert!(!seen.contains(&r.catalog_collection()));
    }

    #[test]
    fn parse_rejects_foreign_and_non_canonical() {
        let r = NameResolver::default();
        assert_eq!(r.parse("other.daily.g1"), None);
        assert_eq!(r.parse("snap.$catalog"), None);
        assert_eq!(r.parse("snap.daily.g01"), None);
        assert_eq!(r.parse("snap.daily.g0"), None);
        assert_eq!(r.parse("snap.daily.x1"), None);
        assert_eq!(r.parse("snap.daily.g1.a.b"), None);
        assert_eq!(r.parse("snap.d%2e.g1"), None); // lowercase hex is not canonical
        assert!(r.parse("snap.d%2E.g1").is_some());
    }

    #[test]
    fn family_prefix_does_not_match_other_families() {
        let r = NameResolver::default();
        let p = r.family_prefix("a").unwrap();
        let other = r.physical_name("ab", 1, None).unwrap();
        assert!(!other.starts_with(&p));
        let own = r.physical_name("a", 1, Some("s")).unwrap();
        assert!(own.starts_with(&p));
    }

    #[test]
    fn record_keys_are_distinct() {
        let r = NameResolver::default();
        assert_ne!(r.counter_key("f").unwrap(), r.pointer_key("f").unwrap());
        assert_ne!(r.counter_key("f").unwrap(), r.counter_key("g").unwrap());
        assert!(r.counter_key("").is_err());
    }
}
