//! Video source abstraction consumed by scene items.
//!
//! A source is shared by reference: every item wrapping it holds one `Arc`, and other owners
//! (a catalog, another scene) hold their own. Its properties are its own business; items only
//! query size and name and ask it to draw.

mod placeholder;

pub use placeholder::PlaceholderSource;

use crate::foundation::sync::lock_unpoisoned;
use crate::render::context::DrawContext;
use crate::scene::container::Scene;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Shared reference to a video source.
pub type SourceRef = Arc<dyn VideoSource>;

/// A producer of frames with a (possibly changing) native size.
pub trait VideoSource: Send + Sync {
    /// Display name, used for lookup and persistence.
    fn name(&self) -> &str;

    /// Current native width in pixels.
    fn width(&self) -> u32;

    /// Current native height in pixels.
    fn height(&self) -> u32;

    /// Draw the current frame at native size under the context's current matrix.
    fn render(&self, ctx: &mut dyn DrawContext);

    /// `true` once the source has been removed upstream and should be evicted from scenes.
    fn is_removed(&self) -> bool {
        false
    }

    /// The scene behind this source, when the source is a nested scene.
    fn nested_scene(&self) -> Option<&Scene> {
        None
    }
}

/// Name-based source lookup used when restoring a layer stack.
pub trait SourceRegistry {
    /// Resolve a live source by display name.
    fn source_by_name(&self, name: &str) -> Option<SourceRef>;
}

/// In-memory [`SourceRegistry`] keyed by source name.
#[derive(Default)]
pub struct SourceCatalog {
    sources: Mutex<BTreeMap<String, SourceRef>>,
}

impl std::fmt::Debug for SourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCatalog")
            .field("names", &self.names())
            .finish()
    }
}

impl SourceCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its own name, returning any source it replaced.
    pub fn insert(&self, source: SourceRef) -> Option<SourceRef> {
        let name = source.name().to_string();
        lock_unpoisoned(&self.sources).insert(name, source)
    }

    /// Drop the catalog's reference to the named source.
    pub fn remove(&self, name: &str) -> Option<SourceRef> {
        lock_unpoisoned(&self.sources).remove(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        lock_unpoisoned(&self.sources).keys().cloned().collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.sources).len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SourceRegistry for SourceCatalog {
    fn source_by_name(&self, name: &str) -> Option<SourceRef> {
        lock_unpoisoned(&self.sources).get(name).cloned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/catalog.rs"]
mod tests;
