//! Index catalogs
//!
//! Each schema declares its indexes once, as data. The same catalog drives
//! the migration binaries and the typed collection handle, so the set of
//! indexes on a collection is never defined anywhere else.

use bson::Document;
use mongodb::{options::IndexOptions, IndexModel};
use serde::{Deserialize, Serialize};

/// Build-order tier. Critical indexes are applied first.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// One named index together with the reason it exists
#[derive(Clone, Debug)]
pub struct IndexSpec {
    /// Index name; createIndexes is keyed by it
    pub name: &'static str,
    pub keys: Document,
    /// Options other than the name
    pub options: IndexOptions,
    /// Human-readable purpose
    pub purpose: &'static str,
    /// Application queries this index serves
    pub queries: &'static [&'static str],
    pub priority: Option<IndexPriority>,
}

impl IndexSpec {
    pub fn new(name: &'static str, keys: Document) -> Self {
        Self {
            name,
            keys,
            options: IndexOptions::default(),
            purpose: "",
            queries: &[],
            priority: None,
        }
    }

    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn purpose(mut self, purpose: &'static str) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn queries(mut self, queries: &'static [&'static str]) -> Self {
        self.queries = queries;
        self
    }

    pub fn priority(mut self, priority: IndexPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_unique(&self) -> bool {
        self.options.unique.unwrap_or(false)
    }

    pub fn is_text(&self) -> bool {
        self.keys
            .values()
            .any(|v| v.as_str() == Some("text"))
    }

    /// Driver model with the catalog name stamped into the options
    pub fn to_index_model(&self) -> IndexModel {
        let mut options = self.options.clone();
        options.name = Some(self.name.to_string());

        IndexModel::builder()
            .keys(self.keys.clone())
            .options(Some(options))
            .build()
    }
}

/// Ordered, immutable list of index specs for one collection
#[derive(Clone, Debug, Default)]
pub struct IndexCatalog {
    entries: Vec<IndexSpec>,
}

impl IndexCatalog {
    pub fn new(entries: Vec<IndexSpec>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexSpec> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&IndexSpec> {
        self.entries.iter().find(|spec| spec.name == name)
    }

    /// Names in declaration order
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|spec| spec.name).collect()
    }

    /// Entries ordered by tier; untiered entries go last and declaration
    /// order is kept within a tier
    pub fn by_priority(&self) -> Vec<&IndexSpec> {
        let mut ordered: Vec<&IndexSpec> = self.entries.iter().collect();
        ordered.sort_by_key(|spec| (spec.priority.is_none(), spec.priority));
        ordered
    }
}

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn index_catalog() -> IndexCatalog;
}
