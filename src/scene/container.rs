use crate::foundation::core::{Canvas, OrderMovement};
use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::sync::{ReentrantGuard, ReentrantLock, lock_unpoisoned};
use crate::render::context::DrawContext;
use crate::scene::hotkeys::{HotkeyRegistrar, VisibilityHotkeys};
use crate::scene::item::SceneItem;
use crate::scene::signals::{SceneEvent, SceneSignals};
use crate::source::{SourceRef, VideoSource};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

thread_local! {
    static RENDERING: RefCell<Vec<*const SceneInner>> = const { RefCell::new(Vec::new()) };
}

/// Marks a scene as being drawn on the current thread until dropped.
struct RenderFrame(*const SceneInner);

impl RenderFrame {
    /// `None` if the scene is already being drawn further up this thread's stack.
    fn enter(scene: &Arc<SceneInner>) -> Option<Self> {
        let ptr = Arc::as_ptr(scene);
        RENDERING.with_borrow_mut(|stack| {
            if stack.contains(&ptr) {
                return None;
            }
            stack.push(ptr);
            Some(Self(ptr))
        })
    }
}

impl Drop for RenderFrame {
    fn drop(&mut self) {
        RENDERING.with_borrow_mut(|stack| {
            if let Some(pos) = stack.iter().rposition(|p| *p == self.0) {
                stack.remove(pos);
            }
        });
    }
}

/// Scene configuration.
#[derive(Clone, Default)]
pub struct SceneOpts {
    /// Size reported when the scene is used as a nested source.
    pub canvas: Canvas,
    /// Hotkey system used to give every item a show/hide pair.
    pub hotkeys: Option<Arc<dyn HotkeyRegistrar>>,
}

impl std::fmt::Debug for SceneOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneOpts")
            .field("canvas", &self.canvas)
            .field("hotkeys", &self.hotkeys.is_some())
            .finish()
    }
}

pub(crate) struct SceneInner {
    name: String,
    opts: SceneOpts,
    op_lock: ReentrantLock,
    items: Mutex<Vec<SceneItem>>,
    pending: Mutex<Vec<SceneEvent>>,
    signals: SceneSignals,
    removed: AtomicBool,
}

impl SceneInner {
    /// Raise `event`; it is delivered once the outermost operation on this scene finishes.
    pub(crate) fn emit(self: &Arc<Self>, event: SceneEvent) {
        let _op = OpGuard::new(self);
        lock_unpoisoned(&self.pending).push(event);
    }
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        let items = std::mem::take(self.items.get_mut().unwrap_or_else(PoisonError::into_inner));
        for item in items {
            item.detach();
        }
    }
}

/// Holds the scene's operation lock; flushes queued events after the outermost release.
struct OpGuard<'a> {
    scene: &'a Arc<SceneInner>,
    lock: Option<ReentrantGuard<'a>>,
}

impl<'a> OpGuard<'a> {
    fn new(scene: &'a Arc<SceneInner>) -> Self {
        let lock = scene.op_lock.lock();
        Self {
            scene,
            lock: Some(lock),
        }
    }
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let events = if lock.is_outermost() {
            std::mem::take(&mut *lock_unpoisoned(&self.scene.pending))
        } else {
            Vec::new()
        };
        drop(lock);

        if events.is_empty() {
            return;
        }
        let scene = Scene::from_inner(Arc::clone(self.scene));
        for event in &events {
            scene.inner.signals.deliver(&scene, event);
        }
    }
}

/// Ordered, thread-safe stack of layers.
///
/// The sequence order is the draw order: the first item is drawn first (bottom), the last item
/// is drawn last (top). Every operation runs under one re-entrant lock, so a render pass never
/// observes a half-applied mutation and callbacks invoked under the lock may call back in.
///
/// `Scene` is a cheap handle; clones share the same scene. When the last handle goes away every
/// item is detached.
#[derive(Clone)]
pub struct Scene {
    inner: Arc<SceneInner>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.inner.name)
            .field("items", &self.item_count())
            .finish()
    }
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>, opts: SceneOpts) -> Self {
        Self {
            inner: Arc::new(SceneInner {
                name: name.into(),
                opts,
                op_lock: ReentrantLock::new(),
                items: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
                signals: SceneSignals::default(),
                removed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SceneInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<SceneInner> {
        &self.inner
    }

    fn op(&self) -> OpGuard<'_> {
        OpGuard::new(&self.inner)
    }

    /// Scene name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Scene configuration.
    pub fn opts(&self) -> &SceneOpts {
        &self.inner.opts
    }

    /// Listener registry.
    pub fn signals(&self) -> &SceneSignals {
        &self.inner.signals
    }

    /// `true` when both handles refer to the same scene.
    pub fn ptr_eq(&self, other: &Scene) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        let _op = self.op();
        lock_unpoisoned(&self.inner.items).len()
    }

    /// Snapshot of the items in draw order.
    pub fn items(&self) -> Vec<SceneItem> {
        let _op = self.op();
        lock_unpoisoned(&self.inner.items).clone()
    }

    /// Wrapped sources in draw order.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut out = Vec::new();
        self.enumerate(|_, item| {
            if let Some(source) = item.source() {
                out.push(source);
            }
            true
        });
        out
    }

    /// `true` if this scene is `target` or draws it, directly or through nested scenes.
    fn nests(&self, target: &Scene) -> bool {
        self.nests_within(target, &mut Vec::new())
    }

    fn nests_within(&self, target: &Scene, visited: &mut Vec<*const SceneInner>) -> bool {
        if self.ptr_eq(target) {
            return true;
        }
        let ptr = Arc::as_ptr(&self.inner);
        if visited.contains(&ptr) {
            return false;
        }
        visited.push(ptr);
        self.sources()
            .iter()
            .filter_map(|s| s.nested_scene())
            .any(|nested| nested.nests_within(target, visited))
    }

    pub(crate) fn validate_source(&self, source: &SourceRef) -> SceneResult<()> {
        if source.is_removed() {
            return Err(SceneError::invalid_source(format!(
                "source '{}' has been removed",
                source.name()
            )));
        }
        if let Some(nested) = source.nested_scene()
            && nested.nests(self)
        {
            return Err(SceneError::invalid_source(format!(
                "adding scene '{}' to '{}' would nest a scene inside itself",
                nested.name(),
                self.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn attach_hotkeys(&self, item: &SceneItem, source_name: &str) {
        if let Some(registrar) = &self.inner.opts.hotkeys {
            let hotkeys = VisibilityHotkeys::register(Arc::clone(registrar), item, source_name);
            drop(item.set_parent_data(Arc::new(hotkeys)));
        }
    }

    /// Append a new item wrapping `source`.
    ///
    /// The returned handle is the caller's reference; the scene holds its own.
    ///
    /// The nesting check runs before this scene's lock is taken. Two threads nesting a pair of
    /// scenes into each other at the same time can both succeed; rendering such a cycle stops
    /// at the first repeated scene.
    pub fn add(&self, source: SourceRef) -> SceneResult<SceneItem> {
        if let Err(err) = self.validate_source(&source) {
            tracing::error!(scene = self.name(), "rejected source: {err}");
            return Err(err);
        }

        let name = source.name().to_string();
        let item = SceneItem::new(&self.inner);
        item.set_source(source);
        self.attach_hotkeys(&item, &name);

        let _op = self.op();
        lock_unpoisoned(&self.inner.items).push(item.clone());
        self.inner.emit(SceneEvent::ItemAdd(item.clone()));
        tracing::debug!(scene = self.name(), source = %name, item = item.id().0, "item added");
        Ok(item)
    }

    fn position_of(&self, item: &SceneItem) -> Option<usize> {
        lock_unpoisoned(&self.inner.items)
            .iter()
            .position(|i| i.ptr_eq(item))
    }

    /// Remove `item`. Returns `false` if it does not belong to this scene.
    ///
    /// `item_remove` is queued before detaching and delivered after the operation lock is
    /// released, so listeners see the item already detached. The item survives for as long as
    /// other handles to it exist.
    pub fn remove(&self, item: &SceneItem) -> bool {
        if !item.has_parent(&self.inner) {
            return false;
        }

        let _op = self.op();
        let Some(idx) = self.position_of(item) else {
            return false;
        };
        self.inner.emit(SceneEvent::ItemRemove(item.clone()));
        let member = lock_unpoisoned(&self.inner.items).remove(idx);
        member.detach();
        tracing::debug!(scene = self.name(), item = item.id().0, "item removed");
        true
    }

    /// Append already-parented items without raising events.
    pub(crate) fn extend_items(&self, items: Vec<SceneItem>) {
        let _op = self.op();
        lock_unpoisoned(&self.inner.items).extend(items);
    }

    /// Detach every item without raising events.
    pub(crate) fn clear(&self) {
        let _op = self.op();
        let items = std::mem::take(&mut *lock_unpoisoned(&self.inner.items));
        for item in items {
            item.detach();
        }
    }

    /// Move `item` one step or to either end of the stack.
    ///
    /// `reorder` is raised even when the item is already at the requested boundary.
    pub fn set_order(&self, item: &SceneItem, movement: OrderMovement) {
        let _op = self.op();
        {
            let mut items = lock_unpoisoned(&self.inner.items);
            let Some(idx) = items.iter().position(|i| i.ptr_eq(item)) else {
                return;
            };
            let last = items.len() - 1;
            match movement {
                OrderMovement::Down if idx != 0 => items.swap(idx, idx - 1),
                OrderMovement::Up if idx != last => items.swap(idx, idx + 1),
                OrderMovement::Top if idx != last => {
                    let moved = items.remove(idx);
                    items.push(moved);
                }
                OrderMovement::Bottom if idx != 0 => {
                    let moved = items.remove(idx);
                    items.insert(0, moved);
                }
                _ => {}
            }
        }
        self.inner.emit(SceneEvent::Reorder);
    }

    /// Move `item` to absolute `index`, clamped to the end of the stack.
    pub fn set_order_position(&self, item: &SceneItem, index: usize) {
        let _op = self.op();
        {
            let mut items = lock_unpoisoned(&self.inner.items);
            let Some(idx) = items.iter().position(|i| i.ptr_eq(item)) else {
                return;
            };
            let moved = items.remove(idx);
            let index = index.min(items.len());
            items.insert(index, moved);
        }
        self.inner.emit(SceneEvent::Reorder);
    }

    /// Replace the whole order with `order`, a permutation of the current items.
    ///
    /// Returns `false` without changing anything when `order` is empty, has a different length,
    /// is not a permutation of the current items, or already matches the current order.
    pub fn reorder_items(&self, order: &[SceneItem]) -> bool {
        if order.is_empty() {
            return false;
        }

        let _op = self.op();
        {
            let mut items = lock_unpoisoned(&self.inner.items);
            if items.len() != order.len() {
                return false;
            }
            if items.iter().zip(order).all(|(a, b)| a.ptr_eq(b)) {
                return false;
            }

            let mut used = vec![false; items.len()];
            let mut indices = Vec::with_capacity(order.len());
            for wanted in order {
                let found = items
                    .iter()
                    .enumerate()
                    .position(|(i, item)| !used[i] && item.ptr_eq(wanted));
                let Some(i) = found else {
                    tracing::warn!(scene = self.name(), "reorder rejected: not a permutation");
                    return false;
                };
                used[i] = true;
                indices.push(i);
            }

            let mut old: Vec<Option<SceneItem>> =
                std::mem::take(&mut *items).into_iter().map(Some).collect();
            *items = indices.iter().filter_map(|&i| old[i].take()).collect();
        }
        self.inner.emit(SceneEvent::Reorder);
        true
    }

    /// Run `f` with exclusive access to the scene.
    ///
    /// Other threads block until `f` returns, so a read-compute-write sequence such as reading
    /// the order and passing a new permutation to [`Scene::reorder_items`] is atomic. Events
    /// raised inside are delivered after `f` returns.
    pub fn atomic_update<R>(&self, f: impl FnOnce(&Scene) -> R) -> R {
        let _op = self.op();
        f(self)
    }

    /// Visit items in order until `f` returns `false`.
    ///
    /// Each item is held by an extra reference while `f` runs. `f` may remove items, including
    /// the one being visited; the walk continues with the item that followed it.
    pub fn enumerate(&self, mut f: impl FnMut(&Scene, &SceneItem) -> bool) {
        let _op = self.op();
        let mut i = 0;
        loop {
            let (item, count_before) = {
                let items = lock_unpoisoned(&self.inner.items);
                match items.get(i) {
                    Some(item) => (item.clone(), items.len()),
                    None => break,
                }
            };

            if !f(self, &item) {
                break;
            }

            let items = lock_unpoisoned(&self.inner.items);
            let still_here = items.get(i).is_some_and(|cur| cur.ptr_eq(&item));
            if still_here || items.len() >= count_before {
                i += 1;
            }
        }
    }

    /// First item whose source has display name `name`.
    pub fn find(&self, name: &str) -> Option<SceneItem> {
        self.items()
            .into_iter()
            .find(|item| item.source().is_some_and(|s| s.name() == name))
    }

    /// Draw every item in order.
    ///
    /// Items whose source was removed upstream are evicted instead of drawn. The pass saves and
    /// restores draw state around the whole stack.
    ///
    /// A scene reached again while it is already being drawn on this thread (a nesting cycle)
    /// draws nothing the second time.
    #[tracing::instrument(level = "trace", skip_all, fields(scene = %self.name()))]
    pub fn render(&self, ctx: &mut dyn DrawContext) {
        let Some(_frame) = RenderFrame::enter(&self.inner) else {
            tracing::warn!(scene = self.name(), "scene reached again while drawing it, skipped");
            return;
        };
        let _op = self.op();
        ctx.push_draw_state();
        ctx.reset_draw_state();

        let mut i = 0;
        loop {
            let item = {
                let items = lock_unpoisoned(&self.inner.items);
                match items.get(i) {
                    Some(item) => item.clone(),
                    None => break,
                }
            };

            if item.source_removed() {
                tracing::debug!(scene = self.name(), item = item.id().0, "evicting removed source");
                self.remove(&item);
                continue;
            }

            item.render(ctx);
            i += 1;
        }

        ctx.pop_draw_state();
    }

    /// Copy this scene under a new name.
    ///
    /// Each copied item shares its source with the original but owns an independent copy of
    /// the geometry. No events are raised.
    #[tracing::instrument(skip_all, fields(from = %self.name()))]
    pub fn duplicate(&self, name: impl Into<String>) -> Scene {
        let copy = Scene::new(name, self.inner.opts.clone());

        let _op = self.op();
        let originals = lock_unpoisoned(&self.inner.items).clone();
        let mut duplicated = Vec::with_capacity(originals.len());
        for item in &originals {
            let dup = item.duplicate_into(&copy.inner);
            if let Some(source) = dup.source() {
                copy.attach_hotkeys(&dup, source.name());
            }
            duplicated.push(dup);
        }
        copy.extend_items(duplicated);
        copy
    }

    /// Flag this scene as removed so scenes nesting it evict it on their next render.
    pub fn mark_removed(&self) {
        self.inner.removed.store(true, Ordering::Release);
    }
}

impl VideoSource for Scene {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn width(&self) -> u32 {
        self.inner.opts.canvas.width
    }

    fn height(&self) -> u32 {
        self.inner.opts.canvas.height
    }

    fn render(&self, ctx: &mut dyn DrawContext) {
        Scene::render(self, ctx);
    }

    fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }

    fn nested_scene(&self) -> Option<&Scene> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/container.rs"]
mod tests;
