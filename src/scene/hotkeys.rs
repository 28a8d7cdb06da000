//! Per-item show/hide hotkey pairs.
//!
//! Hotkey dispatch itself belongs to the host; a scene only registers a pair per item through a
//! [`HotkeyRegistrar`] and keeps the registration alive as the item's parent payload.

use crate::scene::item::{SceneItem, WeakItem};
use std::sync::Arc;

/// Registration handle issued by a [`HotkeyRegistrar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HotkeyPairId(pub u64);

/// Name and user-facing description of one hotkey.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HotkeyBinding {
    /// Stable identifier, used to persist key assignments.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// Hotkey callback; receives `pressed` and returns whether it acted.
pub type HotkeyHandler = Box<dyn Fn(bool) -> bool + Send + Sync>;

/// Host-side hotkey system.
pub trait HotkeyRegistrar: Send + Sync {
    /// Register a pair of complementary hotkeys.
    fn register_pair(
        &self,
        first: HotkeyBinding,
        second: HotkeyBinding,
        on_first: HotkeyHandler,
        on_second: HotkeyHandler,
    ) -> HotkeyPairId;

    /// Drop a registration made by [`HotkeyRegistrar::register_pair`].
    fn unregister_pair(&self, id: HotkeyPairId);
}

/// Show `item` if it is alive, `pressed` and currently hidden.
pub fn show_item(item: &WeakItem, pressed: bool) -> bool {
    toggle(item, pressed, true)
}

/// Hide `item` if it is alive, `pressed` and currently visible.
pub fn hide_item(item: &WeakItem, pressed: bool) -> bool {
    toggle(item, pressed, false)
}

fn toggle(item: &WeakItem, pressed: bool, visible: bool) -> bool {
    let Some(item) = item.upgrade() else {
        return false;
    };
    if pressed && item.visible() != visible {
        item.set_visible(visible);
        return true;
    }
    false
}

/// Registered show/hide pair for one item; unregisters itself when dropped.
pub struct VisibilityHotkeys {
    registrar: Arc<dyn HotkeyRegistrar>,
    id: HotkeyPairId,
}

impl std::fmt::Debug for VisibilityHotkeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityHotkeys")
            .field("id", &self.id)
            .finish()
    }
}

impl VisibilityHotkeys {
    pub(crate) fn register(
        registrar: Arc<dyn HotkeyRegistrar>,
        item: &SceneItem,
        source_name: &str,
    ) -> Self {
        let show = HotkeyBinding {
            name: format!("scene.show_item.{source_name}"),
            description: format!("Show '{source_name}'"),
        };
        let hide = HotkeyBinding {
            name: format!("scene.hide_item.{source_name}"),
            description: format!("Hide '{source_name}'"),
        };

        let show_target = item.downgrade();
        let hide_target = item.downgrade();
        let id = registrar.register_pair(
            show,
            hide,
            Box::new(move |pressed| show_item(&show_target, pressed)),
            Box::new(move |pressed| hide_item(&hide_target, pressed)),
        );
        tracing::debug!(pair = id.0, source = source_name, "registered visibility hotkeys");
        Self { registrar, id }
    }

    /// Registration handle.
    pub fn pair_id(&self) -> HotkeyPairId {
        self.id
    }
}

impl Drop for VisibilityHotkeys {
    fn drop(&mut self) {
        self.registrar.unregister_pair(self.id);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/hotkeys.rs"]
mod tests;
