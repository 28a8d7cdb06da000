//! Layer stack: items, their placement math, and the ordered container that draws them.

/// Ordered, thread-safe item container.
pub mod container;
/// Per-item visibility hotkeys.
pub mod hotkeys;
/// Reference-counted scene items.
pub mod item;
/// Persisted form of a layer stack.
pub mod record;
/// Typed scene notifications.
pub mod signals;
/// Item placement math.
pub mod transform;
