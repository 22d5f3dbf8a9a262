use serde::{Deserialize, Serialize};
use tracing::debug;

/// One entry of a `list frames` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub name: String,
    pub pgn: String,
}

/// What a new `list frames` response does to frames already in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogPolicy {
    /// Keep earlier entries; repeated listings accumulate duplicates.
    #[default]
    Append,
    /// Drop earlier entries before applying the listing.
    Replace,
}

/// Ordered frame list.  Insertion order is display order and is what
/// positional lookups index into.  Nothing is de-duplicated or sorted; the
/// server is the source of truth.
#[derive(Debug, Clone, Default)]
pub struct FrameCatalog {
    frames: Vec<FrameSummary>,
    policy: CatalogPolicy,
}

impl FrameCatalog {
    pub fn new(policy: CatalogPolicy) -> Self {
        Self {
            frames: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> CatalogPolicy {
        self.policy
    }

    pub fn add(&mut self, name: impl Into<String>, pgn: impl Into<String>) {
        self.frames.push(FrameSummary {
            name: name.into(),
            pgn: pgn.into(),
        });
    }

    pub fn apply_listing(&mut self, listing: Vec<FrameSummary>) {
        if self.policy == CatalogPolicy::Replace {
            self.frames.clear();
        }
        debug!(received = listing.len(), policy = ?self.policy, "applying frame listing");
        self.frames.extend(listing);
    }

    pub fn get(&self, position: usize) -> Option<&FrameSummary> {
        self.frames.get(position)
    }

    /// First frame with this name, in insertion order.
    pub fn find(&self, name: &str) -> Option<&FrameSummary> {
        self.frames.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSummary> {
        self.frames.iter()
    }

    pub fn frames(&self) -> &[FrameSummary] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
