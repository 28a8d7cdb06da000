use crate::foundation::sync::lock_unpoisoned;
use crate::scene::container::Scene;
use crate::scene::item::SceneItem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Something that happened to a scene or one of its items.
#[derive(Clone, Debug)]
pub enum SceneEvent {
    /// An item was appended.
    ItemAdd(SceneItem),
    /// An item was removed. Delivered after detach: the item no longer reports a scene or
    /// parent payload, but its source, geometry and private payload are unchanged.
    ItemRemove(SceneItem),
    /// The item order changed (or a reorder was requested at a boundary).
    Reorder,
    /// An item's visibility was set.
    ItemVisible(SceneItem, bool),
    /// An item was selected.
    ItemSelect(SceneItem),
    /// An item was deselected.
    ItemDeselect(SceneItem),
    /// An item's transforms were recomputed.
    ItemTransform(SceneItem),
}

impl SceneEvent {
    /// The item the event is about, if any.
    pub fn item(&self) -> Option<&SceneItem> {
        match self {
            Self::ItemAdd(item)
            | Self::ItemRemove(item)
            | Self::ItemVisible(item, _)
            | Self::ItemSelect(item)
            | Self::ItemDeselect(item)
            | Self::ItemTransform(item) => Some(item),
            Self::Reorder => None,
        }
    }

    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemAdd(_) => "item_add",
            Self::ItemRemove(_) => "item_remove",
            Self::Reorder => "reorder",
            Self::ItemVisible(..) => "item_visible",
            Self::ItemSelect(_) => "item_select",
            Self::ItemDeselect(_) => "item_deselect",
            Self::ItemTransform(_) => "item_transform",
        }
    }
}

/// Handle returned by listener registration, used to disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ItemFn = Arc<dyn Fn(&Scene, &SceneItem) + Send + Sync>;
type SceneFn = Arc<dyn Fn(&Scene) + Send + Sync>;
type VisibleFn = Arc<dyn Fn(&Scene, &SceneItem, bool) + Send + Sync>;
type EventFn = Arc<dyn Fn(&Scene, &SceneEvent) + Send + Sync>;

#[derive(Clone)]
enum Listener {
    ItemAdd(ItemFn),
    ItemRemove(ItemFn),
    Reorder(SceneFn),
    ItemVisible(VisibleFn),
    ItemSelect(ItemFn),
    ItemDeselect(ItemFn),
    ItemTransform(ItemFn),
    Any(EventFn),
}

/// Typed listener registry of one scene.
///
/// Listeners are called after the scene's operation lock is released, in the order events were
/// raised, so they may call back into the scene. They run on whichever thread released the lock.
#[derive(Default)]
pub struct SceneSignals {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl std::fmt::Debug for SceneSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneSignals")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SceneSignals {
    fn connect(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock_unpoisoned(&self.listeners).push((id, listener));
        id
    }

    /// Call `f` after an item is added.
    pub fn on_item_add(&self, f: impl Fn(&Scene, &SceneItem) + Send + Sync + 'static) -> ListenerId {
        self.connect(Listener::ItemAdd(Arc::new(f)))
    }

    /// Call `f` when an item is removed.
    ///
    /// `f` runs once the item is detached, with the scene it was removed from.
    pub fn on_item_remove(
        &self,
        f: impl Fn(&Scene, &SceneItem) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connect(Listener::ItemRemove(Arc::new(f)))
    }

    /// Call `f` after the order changes.
    pub fn on_reorder(&self, f: impl Fn(&Scene) + Send + Sync + 'static) -> ListenerId {
        self.connect(Listener::Reorder(Arc::new(f)))
    }

    /// Call `f` when an item's visibility is set.
    pub fn on_item_visible(
        &self,
        f: impl Fn(&Scene, &SceneItem, bool) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connect(Listener::ItemVisible(Arc::new(f)))
    }

    /// Call `f` when an item is selected.
    pub fn on_item_select(
        &self,
        f: impl Fn(&Scene, &SceneItem) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connect(Listener::ItemSelect(Arc::new(f)))
    }

    /// Call `f` when an item is deselected.
    pub fn on_item_deselect(
        &self,
        f: impl Fn(&Scene, &SceneItem) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connect(Listener::ItemDeselect(Arc::new(f)))
    }

    /// Call `f` after an item's transforms are recomputed.
    pub fn on_item_transform(
        &self,
        f: impl Fn(&Scene, &SceneItem) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connect(Listener::ItemTransform(Arc::new(f)))
    }

    /// Call `f` for every event.
    pub fn on_event(&self, f: impl Fn(&Scene, &SceneEvent) + Send + Sync + 'static) -> ListenerId {
        self.connect(Listener::Any(Arc::new(f)))
    }

    /// Remove a listener. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = lock_unpoisoned(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of connected listeners.
    pub fn listener_count(&self) -> usize {
        lock_unpoisoned(&self.listeners).len()
    }

    pub(crate) fn deliver(&self, scene: &Scene, event: &SceneEvent) {
        // Snapshot so listeners may connect or disconnect while being called.
        let snapshot: Vec<Listener> = lock_unpoisoned(&self.listeners)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in &snapshot {
            match (listener, event) {
                (Listener::ItemAdd(f), SceneEvent::ItemAdd(item))
                | (Listener::ItemRemove(f), SceneEvent::ItemRemove(item))
                | (Listener::ItemSelect(f), SceneEvent::ItemSelect(item))
                | (Listener::ItemDeselect(f), SceneEvent::ItemDeselect(item))
                | (Listener::ItemTransform(f), SceneEvent::ItemTransform(item)) => f(scene, item),
                (Listener::Reorder(f), SceneEvent::Reorder) => f(scene),
                (Listener::ItemVisible(f), SceneEvent::ItemVisible(item, visible)) => {
                    f(scene, item, *visible)
                }
                (Listener::Any(f), event) => f(scene, event),
                _ => {}
            }
        }
    }
}
