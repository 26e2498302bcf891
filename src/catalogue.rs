use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::canon::{Canonicaliser, NameKind};
use crate::engine::EngineError;
use crate::model::{SlotId, SlotKind};

const BUILTIN_DOCUMENT: &str = include_str!("../config/properties.json");

// ── Configuration document ───────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueDocument {
    pub properties: Vec<PropertyConfig>,
    #[serde(default)]
    pub variants: VariantTables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    /// Physical slots, in board order.
    pub slots: Vec<String>,
    #[serde(default)]
    pub day_use: Vec<String>,
    pub no_show: String,
    /// Booking-level token → slots consumed. Physical slots resolve to
    /// themselves unless listed here.
    #[serde(default)]
    pub alias_table: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub special_tokens: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantTables {
    #[serde(default)]
    pub property: HashMap<String, String>,
    #[serde(default)]
    pub status: HashMap<String, String>,
}

#[derive(Debug)]
pub enum CatalogueError {
    Parse(String),
    NotCanonical(String),
    DuplicateProperty(String),
    DuplicateSlot { property: String, slot: String },
    EmptyAlias { property: String, token: String },
    UnknownAliasTarget { property: String, token: String, slot: String },
    PseudoSlotInAlias { property: String, token: String, slot: String },
    UnstableVariant(String),
}

impl std::fmt::Display for CatalogueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogueError::Parse(e) => write!(f, "property document: {e}"),
            CatalogueError::NotCanonical(name) => {
                write!(f, "property name {name:?} is not in canonical form")
            }
            CatalogueError::DuplicateProperty(name) => write!(f, "duplicate property: {name}"),
            CatalogueError::DuplicateSlot { property, slot } => {
                write!(f, "{property}: slot {slot} listed twice")
            }
            CatalogueError::EmptyAlias { property, token } => {
                write!(f, "{property}: token {token:?} maps to no slots")
            }
            CatalogueError::UnknownAliasTarget { property, token, slot } => {
                write!(f, "{property}: token {token:?} maps to unknown slot {slot}")
            }
            CatalogueError::PseudoSlotInAlias { property, token, slot } => {
                write!(f, "{property}: token {token:?} maps to pseudo-slot {slot}")
            }
            CatalogueError::UnstableVariant(target) => {
                write!(f, "variant target {target:?} is itself rewritten")
            }
        }
    }
}

impl std::error::Error for CatalogueError {}

// ── Property ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    physical: Vec<SlotId>,
    day_use: Vec<SlotId>,
    no_show: SlotId,
    kinds: HashMap<SlotId, SlotKind>,
    alias_table: HashMap<String, Vec<SlotId>>,
    special_tokens: HashMap<String, Vec<SlotId>>,
}

impl Property {
    fn from_config(cfg: PropertyConfig) -> Result<Self, CatalogueError> {
        let name = cfg.name;
        let mut kinds = HashMap::new();
        let tagged = cfg
            .slots
            .iter()
            .map(|s| (s, SlotKind::Physical))
            .chain(cfg.day_use.iter().map(|s| (s, SlotKind::DayUse)))
            .chain(std::iter::once((&cfg.no_show, SlotKind::NoShow)));
        for (slot, kind) in tagged {
            if kinds.insert(SlotId::new(slot.as_str()), kind).is_some() {
                return Err(CatalogueError::DuplicateSlot {
                    property: name.clone(),
                    slot: slot.clone(),
                });
            }
        }

        let check_targets = |token: &str, targets: Vec<String>| -> Result<Vec<SlotId>, CatalogueError> {
            if targets.is_empty() {
                return Err(CatalogueError::EmptyAlias {
                    property: name.clone(),
                    token: token.to_string(),
                });
            }
            targets
                .into_iter()
                .map(|slot| match kinds.get(slot.as_str()) {
                    Some(SlotKind::Physical) => Ok(SlotId::new(slot)),
                    Some(_) => Err(CatalogueError::PseudoSlotInAlias {
                        property: name.clone(),
                        token: token.to_string(),
                        slot,
                    }),
                    None => Err(CatalogueError::UnknownAliasTarget {
                        property: name.clone(),
                        token: token.to_string(),
                        slot,
                    }),
                })
                .collect()
        };

        let mut alias_table = HashMap::new();
        for (token, targets) in cfg.alias_table {
            let slots = check_targets(&token, targets)?;
            alias_table.insert(token.trim().to_string(), slots);
        }
        for slot in &cfg.slots {
            alias_table
                .entry(slot.clone())
                .or_insert_with(|| vec![SlotId::new(slot.as_str())]);
        }
        let mut special_tokens = HashMap::new();
        for (token, targets) in cfg.special_tokens {
            let slots = check_targets(&token, targets)?;
            special_tokens.insert(token.trim().to_string(), slots);
        }

        Ok(Self {
            physical: cfg.slots.into_iter().map(SlotId::new).collect(),
            day_use: cfg.day_use.into_iter().map(SlotId::new).collect(),
            no_show: SlotId::new(cfg.no_show),
            name,
            kinds,
            alias_table,
            special_tokens,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical(&self) -> &[SlotId] {
        &self.physical
    }

    pub fn day_use(&self) -> &[SlotId] {
        &self.day_use
    }

    pub fn no_show(&self) -> &SlotId {
        &self.no_show
    }

    /// Every slot in board order: physical, then day-use, then no-show.
    pub fn slots(&self) -> impl Iterator<Item = &SlotId> {
        self.physical
            .iter()
            .chain(self.day_use.iter())
            .chain(std::iter::once(&self.no_show))
    }

    pub fn kind_of(&self, slot: &SlotId) -> Option<SlotKind> {
        self.kinds.get(slot).copied()
    }

    pub fn alias(&self, token: &str) -> Option<&[SlotId]> {
        self.alias_table.get(token).map(Vec::as_slice)
    }

    pub fn special(&self, token: &str) -> Option<&[SlotId]> {
        self.special_tokens.get(token).map(Vec::as_slice)
    }

    pub fn total_physical(&self) -> usize {
        self.physical.len()
    }
}

// ── Catalogue ────────────────────────────────────────────────────

/// Every property the group operates, keyed by canonical name. Immutable
/// once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PropertyCatalogue {
    properties: BTreeMap<String, Property>,
    canon: Canonicaliser,
}

impl PropertyCatalogue {
    pub fn from_document(doc: CatalogueDocument) -> Result<Self, CatalogueError> {
        let canon = Canonicaliser::new(doc.variants.property, doc.variants.status);
        if let Some((_, target)) = canon.unstable_targets().into_iter().next() {
            return Err(CatalogueError::UnstableVariant(target));
        }

        let mut properties = BTreeMap::new();
        for cfg in doc.properties {
            if canon.canon(NameKind::Property, &cfg.name) != cfg.name {
                return Err(CatalogueError::NotCanonical(cfg.name));
            }
            let property = Property::from_config(cfg)?;
            let name = property.name.clone();
            if properties.insert(name.clone(), property).is_some() {
                return Err(CatalogueError::DuplicateProperty(name));
            }
        }
        Ok(Self { properties, canon })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        let doc: CatalogueDocument =
            serde_json::from_str(json).map_err(|e| CatalogueError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// The resort group's own property document, compiled in.
    pub fn builtin() -> Result<Self, CatalogueError> {
        Self::from_json(BUILTIN_DOCUMENT)
    }

    /// Canonicalises `name` before lookup.
    pub fn get(&self, name: &str) -> Result<&Property, EngineError> {
        let canonical = self.canon.canon(NameKind::Property, name);
        self.properties
            .get(&canonical)
            .ok_or(EngineError::UnknownProperty(canonical))
    }

    /// Exact lookup by canonical name.
    pub fn lookup(&self, canonical: &str) -> Option<&Property> {
        self.properties.get(canonical)
    }

    /// Properties in canonical-name order.
    pub fn all(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn total_physical(&self, name: &str) -> Result<usize, EngineError> {
        self.get(name).map(Property::total_physical)
    }

    pub fn canon(&self, kind: NameKind, raw: &str) -> String {
        self.canon.canon(kind, raw)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ids: &[&str]) -> Vec<SlotId> {
        ids.iter().map(|s| SlotId::from(*s)).collect()
    }

    fn minimal(name: &str) -> PropertyConfig {
        PropertyConfig {
            name: name.into(),
            slots: vec!["101".into(), "102".into()],
            day_use: vec!["Day Use 1".into()],
            no_show: "No Show".into(),
            alias_table: HashMap::new(),
            special_tokens: HashMap::new(),
        }
    }

    #[test]
    fn builtin_document_loads() {
        let cat = PropertyCatalogue::builtin().unwrap();
        let names: Vec<_> = cat.all().map(Property::name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"Le Poshe Beach view"));
        assert!(names.contains(&"Le Poshe Luxury"));
    }

    #[test]
    fn get_canonicalises_variants() {
        let cat = PropertyCatalogue::builtin().unwrap();
        let p = cat.get("  Le Poshe   Beach View").unwrap();
        assert_eq!(p.name(), "Le Poshe Beach view");
        assert!(matches!(
            cat.get("Nowhere Inn"),
            Err(EngineError::UnknownProperty(name)) if name == "Nowhere Inn"
        ));
    }

    #[test]
    fn total_physical_excludes_pseudo_slots() {
        let cat = PropertyCatalogue::builtin().unwrap();
        let p = cat.get("Le Poshe Beach view").unwrap();
        assert_eq!(cat.total_physical("Le Poshe Beach view").unwrap(), 12);
        assert_eq!(p.slots().count(), 12 + 2 + 1);
        assert_eq!(p.kind_of(&SlotId::from("No Show")), Some(SlotKind::NoShow));
        assert_eq!(p.kind_of(&SlotId::from("Day Use 2")), Some(SlotKind::DayUse));
    }

    #[test]
    fn alias_and_special_tables() {
        let cat = PropertyCatalogue::builtin().unwrap();
        let p = cat.get("Le Poshe Luxury").unwrap();
        assert_eq!(p.alias("101&102").unwrap(), slots(&["101", "102"]).as_slice());
        assert_eq!(p.alias("203-205").unwrap(), slots(&["203", "204", "205"]).as_slice());
        assert_eq!(p.alias("304").unwrap(), slots(&["304"]).as_slice());
        assert_eq!(p.special("D3").unwrap(), slots(&["205"]).as_slice());
        assert!(p.alias("D3").is_none());
    }

    #[test]
    fn alias_values_stay_within_physical_slots() {
        let cat = PropertyCatalogue::builtin().unwrap();
        for p in cat.all() {
            for (_, targets) in p.alias_table.iter().chain(p.special_tokens.iter()) {
                assert!(!targets.is_empty());
                for slot in targets {
                    assert_eq!(p.kind_of(slot), Some(SlotKind::Physical), "{}: {slot}", p.name());
                }
            }
        }
    }

    #[test]
    fn rejects_alias_to_unknown_slot() {
        let mut cfg = minimal("Test Inn");
        cfg.alias_table.insert("Suite".into(), vec!["101".into(), "999".into()]);
        let doc = CatalogueDocument {
            properties: vec![cfg],
            variants: VariantTables::default(),
        };
        assert!(matches!(
            PropertyCatalogue::from_document(doc),
            Err(CatalogueError::UnknownAliasTarget { slot, .. }) if slot == "999"
        ));
    }

    #[test]
    fn rejects_alias_to_no_show() {
        let mut cfg = minimal("Test Inn");
        cfg.alias_table.insert("NS".into(), vec!["No Show".into()]);
        let doc = CatalogueDocument {
            properties: vec![cfg],
            variants: VariantTables::default(),
        };
        assert!(matches!(
            PropertyCatalogue::from_document(doc),
            Err(CatalogueError::PseudoSlotInAlias { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_slots_and_properties() {
        let mut cfg = minimal("Test Inn");
        cfg.day_use = vec!["101".into()];
        let doc = CatalogueDocument {
            properties: vec![cfg],
            variants: VariantTables::default(),
        };
        assert!(matches!(
            PropertyCatalogue::from_document(doc),
            Err(CatalogueError::DuplicateSlot { .. })
        ));

        let doc = CatalogueDocument {
            properties: vec![minimal("Test Inn"), minimal("Test Inn")],
            variants: VariantTables::default(),
        };
        assert!(matches!(
            PropertyCatalogue::from_document(doc),
            Err(CatalogueError::DuplicateProperty(_))
        ));
    }

    #[test]
    fn rejects_non_canonical_names() {
        let doc = CatalogueDocument {
            properties: vec![minimal("Test  Inn")],
            variants: VariantTables::default(),
        };
        assert!(matches!(
            PropertyCatalogue::from_document(doc),
            Err(CatalogueError::NotCanonical(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = PropertyCatalogue::from_json(r#"{"properties": [{"name": "X"}]}"#).unwrap_err();
        assert!(err.to_string().starts_with("property document"));
    }
}
