// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-zone owner index and the owner-name locator.

use std::collections::HashMap;

use hickory_proto::rr::Name;

use crate::record::APEX_LABEL;

/// The set of owner labels present in one zone, without record bodies.
///
/// Built per query from the backend's hash-field listing. Matching is
/// case-insensitive, but located labels are handed back exactly as stored
/// so follow-up field reads hit.
#[derive(Clone, Debug)]
pub struct ZoneIndex {
    origin: Name,
    origin_str: String,
    // lower-cased label -> label as stored
    owners: HashMap<String, String>,
}

impl ZoneIndex {
    /// Creates an index for the zone at `origin` containing `owners`,
    /// labels relative to the apex with `@` for the apex itself.
    pub fn new(origin: Name, owners: impl IntoIterator<Item = String>) -> Self {
        let origin = origin.to_lowercase();
        let origin_str = origin.to_string();
        Self {
            origin,
            origin_str,
            owners: owners
                .into_iter()
                .map(|o| (o.to_lowercase(), o))
                .collect(),
        }
    }

    /// The apex name of this zone
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// The apex name in string form, with its trailing dot
    pub fn origin_str(&self) -> &str {
        &self.origin_str
    }

    /// True if the owner label is present in the zone
    pub fn contains(&self, label: &str) -> bool {
        self.owners.contains_key(&label.to_lowercase())
    }

    /// Iterates the owner labels of the zone as stored
    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.owners.values().map(String::as_str)
    }

    /// Resolves a query name to the owner label whose records answer it.
    ///
    /// An exact owner match always wins. Otherwise the name walks up label
    /// by label: at each step the remainder is the closest-encloser
    /// candidate and `*.<candidate>` the source of synthesis. When the
    /// encloser exists, the wildcard either answers or the name does not
    /// exist at all; descent through several labels beneath a wildcard is
    /// allowed. `None` means no owner answers the name.
    pub fn locate(&self, qname: &Name) -> Option<String> {
        let qname = qname.to_lowercase().to_string();
        if qname == self.origin_str {
            return Some(APEX_LABEL.to_string());
        }

        let rel = qname.strip_suffix(&self.origin_str)?.strip_suffix('.')?;

        if let Some(stored) = self.owners.get(rel) {
            return Some(stored.clone());
        }

        let mut query = rel;
        loop {
            let (encloser, synthesis) = split_query(query)?;
            if self.encloser_exists(encloser) {
                return self.owners.get(&synthesis).cloned();
            }
            query = encloser;
        }
    }

    /// True when some owner sits at or below the encloser candidate.
    ///
    /// Comparison is on label boundaries; an owner merely sharing a string
    /// suffix with the candidate does not count. The empty candidate is the
    /// apex and always exists.
    fn encloser_exists(&self, encloser: &str) -> bool {
        if encloser.is_empty() {
            return true;
        }
        if self.owners.contains_key(encloser) {
            return true;
        }
        let suffix = format!(".{encloser}");
        self.owners.keys().any(|owner| owner.ends_with(&suffix))
    }
}

/// Splits a relative owner name into its closest-encloser candidate and the
/// matching source of synthesis. Returns `None` once the name is exhausted.
fn split_query(query: &str) -> Option<(&str, String)> {
    if query.is_empty() {
        return None;
    }
    match query.split_once('.') {
        Some((_, encloser)) => Some((encloser, format!("*.{encloser}"))),
        None => Some(("", "*".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn index(origin: &str, owners: &[&str]) -> ZoneIndex {
        ZoneIndex::new(
            Name::from_str(origin).unwrap(),
            owners.iter().map(|o| o.to_string()),
        )
    }

    fn locate(index: &ZoneIndex, qname: &str) -> Option<String> {
        index.locate(&Name::from_str(qname).unwrap())
    }

    #[test]
    fn test_apex() {
        let zone = index("example.com.", &["@", "www"]);
        assert_eq!(locate(&zone, "example.com."), Some("@".to_string()));
    }

    #[test]
    fn test_exact_match() {
        let zone = index("example.com.", &["@", "www", "a.b"]);
        assert_eq!(locate(&zone, "www.example.com."), Some("www".to_string()));
        assert_eq!(locate(&zone, "a.b.example.com."), Some("a.b".to_string()));
    }

    #[test]
    fn test_case_insensitive() {
        // matching ignores case, the located label keeps its stored form
        let zone = index("example.com.", &["@", "WWW"]);
        assert_eq!(locate(&zone, "wWw.EXAMPLE.com."), Some("WWW".to_string()));
    }

    #[test]
    fn test_no_match_is_none() {
        let zone = index("example.com.", &["@", "www"]);
        assert_eq!(locate(&zone, "missing.example.com."), None);
    }

    #[test]
    fn test_outside_zone_is_none() {
        let zone = index("example.com.", &["@", "www"]);
        assert_eq!(locate(&zone, "www.example.org."), None);
    }

    #[test]
    fn test_wildcard_single_label() {
        let zone = index("example.net.", &["@", "*", "host1"]);
        assert_eq!(locate(&zone, "host3.example.net."), Some("*".to_string()));
    }

    #[test]
    fn test_exact_wins_over_wildcard() {
        let zone = index("example.net.", &["@", "*", "host1"]);
        assert_eq!(locate(&zone, "host1.example.net."), Some("host1".to_string()));
    }

    #[test]
    fn test_wildcard_multi_label_descent() {
        let zone = index("example.net.", &["@", "*"]);
        assert_eq!(locate(&zone, "a.b.c.example.net."), Some("*".to_string()));
    }

    #[test]
    fn test_scoped_wildcard() {
        let zone = index("example.net.", &["@", "*.sub", "sub"]);
        assert_eq!(locate(&zone, "x.sub.example.net."), Some("*.sub".to_string()));
        // no wildcard covers names outside of sub
        assert_eq!(locate(&zone, "x.other.example.net."), None);
    }

    #[test]
    fn test_no_wildcard_below_existing_name() {
        // a delegation-like owner exists, but nothing covers names below it
        let zone = index("example.net.", &["@", "*", "subdel"]);
        assert_eq!(locate(&zone, "host.subdel.example.net."), None);
    }

    #[test]
    fn test_encloser_requires_label_boundary() {
        // "del" shares a string suffix with "subdel" but is not an ancestor
        let zone = index("example.net.", &["@", "host.subdel"]);
        assert_eq!(locate(&zone, "x.del.example.net."), None);
    }

    #[test]
    fn test_literal_asterisk_not_a_pattern() {
        let zone = index("example.net.", &["@", "a*b"]);
        assert_eq!(locate(&zone, "a*b.example.net."), Some("a*b".to_string()));
        assert_eq!(locate(&zone, "axb.example.net."), None);
    }

    #[test]
    fn test_deep_owner_makes_encloser_exist() {
        // an owner below the encloser proves the encloser exists, so the
        // absent wildcard there means the name does not exist
        let zone = index("example.net.", &["@", "a.b.c"]);
        assert_eq!(locate(&zone, "x.b.c.example.net."), None);
    }
}
