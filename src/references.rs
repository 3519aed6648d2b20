//! Reference-list resolution for provider place codes
//!
//! The provider keys searches by numeric departure-city and country codes.
//! This module parses its reference lists and resolves free-text place names
//! to entries via an exact pass followed by a substring pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_items;

/// Which reference list a lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Departure,
    Country,
}

impl ReferenceKind {
    /// Value sent as the list endpoint's `type` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Departure => "departure",
            ReferenceKind::Country => "country",
        }
    }

    /// Location of this kind's entry collection in a list response.
    fn entries_pointer(&self) -> &'static str {
        match self {
            ReferenceKind::Departure => "/lists/departures/departure",
            ReferenceKind::Country => "/lists/countries/country",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReferenceKind::Departure => "city",
            ReferenceKind::Country => "country",
        }
    }
}

/// One entry of a provider reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: i64,
    pub name: String,
    /// Declensional form used in "from <city>" phrasing; departures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_from: Option<String>,
}

/// Outcome of resolving a free-text place name against a reference list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<ReferenceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ReferenceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PlaceMatch {
    fn exact(entry: ReferenceEntry) -> Self {
        Self {
            found: true,
            entry: Some(entry),
            alternatives: Vec::new(),
            message: None,
        }
    }

    fn partial(entry: ReferenceEntry, alternatives: Vec<ReferenceEntry>) -> Self {
        Self {
            found: true,
            entry: Some(entry),
            alternatives,
            message: None,
        }
    }

    fn not_found(kind: ReferenceKind, query: &str) -> Self {
        Self {
            found: false,
            entry: None,
            alternatives: Vec::new(),
            message: Some(format!(
                "No {} matching '{}' was found",
                kind.label(),
                query.trim()
            )),
        }
    }
}

/// Extract the entries of the given kind from a raw list response.
///
/// Entries with a missing name or an unusable id are skipped rather than
/// failing the whole lookup.
pub fn parse_entries(kind: ReferenceKind, tree: &Value) -> Vec<ReferenceEntry> {
    let node = match tree.pointer(kind.entries_pointer()) {
        Some(node) => node,
        None => return Vec::new(),
    };

    json_items(node).into_iter().filter_map(parse_entry).collect()
}

fn parse_entry(item: &Value) -> Option<ReferenceEntry> {
    let id = match item.get("id")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let name = item.get("name")?.as_str()?.to_string();
    if name.is_empty() {
        return None;
    }
    let name_from = item
        .get("namefrom")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(ReferenceEntry {
        id,
        name,
        name_from,
    })
}

/// Resolve a free-text name against parsed entries.
///
/// An exact case-insensitive match wins outright with no alternatives, even
/// when other entries would also substring-match. Otherwise the first
/// substring match in provider list order is primary, with up to 4 of the
/// following matches as alternatives.
pub fn match_name(kind: ReferenceKind, entries: &[ReferenceEntry], query: &str) -> PlaceMatch {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return PlaceMatch::not_found(kind, query);
    }

    for entry in entries {
        if entry.name.to_lowercase() == needle {
            return PlaceMatch::exact(entry.clone());
        }
    }

    let mut matches = entries
        .iter()
        .filter(|entry| entry.name.to_lowercase().contains(&needle));
    match matches.next() {
        Some(first) => PlaceMatch::partial(first.clone(), matches.take(4).cloned().collect()),
        None => PlaceMatch::not_found(kind, query),
    }
}
