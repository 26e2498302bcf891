use std::collections::HashMap;

/// What a raw spelling names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Property,
    Status,
}

/// Maps observed spellings of property and status names to canonical forms.
///
/// Whitespace is trimmed and internal runs collapse to one space before the
/// variant table is consulted. Lookup is case-sensitive. Any status holding
/// `cancel` in any case is `Cancelled`. Unknown input maps to itself.
#[derive(Debug, Clone, Default)]
pub struct Canonicaliser {
    property: HashMap<String, String>,
    status: HashMap<String, String>,
}

impl Canonicaliser {
    pub fn new(property: HashMap<String, String>, status: HashMap<String, String>) -> Self {
        let collapse_keys = |table: HashMap<String, String>| {
            table
                .into_iter()
                .map(|(k, v)| (collapse_whitespace(&k), v))
                .collect()
        };
        Self {
            property: collapse_keys(property),
            status: collapse_keys(status),
        }
    }

    pub fn canon(&self, kind: NameKind, raw: &str) -> String {
        let collapsed = collapse_whitespace(raw);
        match kind {
            NameKind::Property => self.property.get(&collapsed).cloned().unwrap_or(collapsed),
            NameKind::Status => {
                if collapsed.to_lowercase().contains("cancel") {
                    return "Cancelled".to_string();
                }
                self.status.get(&collapsed).cloned().unwrap_or(collapsed)
            }
        }
    }

    /// Variant targets that would change again under `canon`.
    /// A non-empty result means canonicalisation would not be idempotent.
    pub fn unstable_targets(&self) -> Vec<(NameKind, String)> {
        let mut bad = Vec::new();
        for (kind, table) in [(NameKind::Property, &self.property), (NameKind::Status, &self.status)] {
            for target in table.values() {
                if self.canon(kind, target) != *target {
                    bad.push((kind, target.clone()));
                }
            }
        }
        bad
    }
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
