//! layerstack is a scene composition engine for live video.
//!
//! A [`Scene`] is an ordered stack of [`SceneItem`]s. Each item wraps a shared
//! [`VideoSource`] and places it on the canvas with a position, rotation, scale, alignment
//! and an optional bounds box. A render pass walks the stack bottom to top and draws each
//! visible item through a [`DrawContext`].
//!
//! - Build a scene with [`Scene::new`] and [`Scene::add`]
//! - Edit placement through the setters on [`SceneItem`]
//! - Observe changes through [`Scene::signals`]
//! - Persist and restore with [`Scene::save`] and [`Scene::load`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Drawing surface abstraction.
pub mod render;
/// Scene items and the container that orders them.
pub mod scene;
/// Video sources consumed by scene items.
pub mod source;

pub use crate::foundation::core::{
    Affine, Alignment, BoundsType, Canvas, OrderMovement, Point, Rect, Size, Vec2,
};
pub use crate::foundation::error::{SceneError, SceneResult};

pub use crate::render::context::{DrawContext, DrawnQuad, RecordingContext};
pub use crate::scene::container::{Scene, SceneOpts};
pub use crate::scene::hotkeys::{
    HotkeyBinding, HotkeyHandler, HotkeyPairId, HotkeyRegistrar, VisibilityHotkeys, hide_item,
    show_item,
};
pub use crate::scene::item::{ItemData, ItemId, SceneItem, WeakItem};
pub use crate::scene::record::{ItemRecord, SceneRecord, Vec2Record};
pub use crate::scene::signals::{ListenerId, SceneEvent, SceneSignals};
pub use crate::scene::transform::{ResolvedTransform, TransformInfo, resolve_transform};
pub use crate::source::{PlaceholderSource, SourceCatalog, SourceRef, SourceRegistry, VideoSource};
