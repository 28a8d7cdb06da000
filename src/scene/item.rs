use crate::foundation::core::{Affine, Alignment, BoundsType, Vec2};
use crate::foundation::sync::lock_unpoisoned;
use crate::render::context::DrawContext;
use crate::scene::container::{Scene, SceneInner};
use crate::scene::signals::SceneEvent;
use crate::scene::transform::{ResolvedTransform, TransformInfo, resolve_transform};
use crate::source::SourceRef;
use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique item identity, stable for the item's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ItemId(pub u64);

/// Type-erased payload attached to an item. Dropping the last handle is its teardown.
///
/// Shared so readers can inspect a payload without holding the item's lock.
pub type ItemData = Arc<dyn Any + Send + Sync>;

struct ItemState {
    parent: Weak<SceneInner>,
    source: Option<SourceRef>,
    info: TransformInfo,
    visible: bool,
    selected: bool,
    last_size: (u32, u32),
    resolved: ResolvedTransform,
    parent_data: Option<ItemData>,
    private_data: Option<ItemData>,
}

impl ItemState {
    fn new(parent: Weak<SceneInner>) -> Self {
        Self {
            parent,
            source: None,
            info: TransformInfo::default(),
            visible: true,
            selected: false,
            last_size: (0, 0),
            resolved: ResolvedTransform::default(),
            parent_data: None,
            private_data: None,
        }
    }

    /// Recompute cached geometry for a `size` source, returning the scene to notify.
    fn recompute(&mut self, size: (u32, u32)) -> Option<Arc<SceneInner>> {
        self.resolved = resolve_transform(&self.info, size.0, size.1);
        self.last_size = size;
        self.parent.upgrade()
    }
}

pub(crate) struct ItemInner {
    id: ItemId,
    refs: AtomicUsize,
    state: Mutex<ItemState>,
}

impl ItemInner {
    /// Runs once, when the last strong reference goes away.
    fn destroy(&self) {
        let (source, parent_data, private_data) = {
            let mut st = lock_unpoisoned(&self.state);
            st.parent = Weak::new();
            (
                st.source.take(),
                st.parent_data.take(),
                st.private_data.take(),
            )
        };
        tracing::trace!(item = self.id.0, "destroying scene item");
        drop(parent_data);
        drop(private_data);
        drop(source);
    }
}

/// Strong, reference-counted handle to one layer of a [`Scene`].
///
/// Cloning a handle adds a reference and dropping it releases one. The container's membership
/// is itself one reference, so an item removed from its scene lives on while other handles
/// exist. When the last reference is released the item lets go of its source and tears down
/// any attached payloads, exactly once.
pub struct SceneItem {
    inner: Arc<ItemInner>,
}

impl Clone for SceneItem {
    fn clone(&self) -> Self {
        self.inner.refs.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for SceneItem {
    fn drop(&mut self) {
        if self.inner.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.destroy();
        }
    }
}

impl PartialEq for SceneItem {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SceneItem {}

impl std::hash::Hash for SceneItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl std::fmt::Debug for SceneItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self.source().map(|s| s.name().to_string());
        f.debug_struct("SceneItem")
            .field("id", &self.inner.id)
            .field("refs", &self.ref_count())
            .field("source", &source)
            .finish()
    }
}

/// Non-owning item reference that can be promoted while the item is alive.
#[derive(Clone, Debug)]
pub struct WeakItem {
    inner: Weak<ItemInner>,
}

impl WeakItem {
    /// Promote to a strong handle, or `None` once the item has been destroyed.
    ///
    /// A concurrent final release may race with this call; the count is only ever bumped from a
    /// non-zero value observed atomically, so a destroyed item is never resurrected.
    pub fn upgrade(&self) -> Option<SceneItem> {
        let inner = self.inner.upgrade()?;
        let mut refs = inner.refs.load(Ordering::Acquire);
        while refs > 0 {
            match inner.refs.compare_exchange_weak(
                refs,
                refs + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(SceneItem { inner }),
                Err(current) => refs = current,
            }
        }
        None
    }
}

impl SceneItem {
    pub(crate) fn new(parent: &Arc<SceneInner>) -> Self {
        Self {
            inner: Arc::new(ItemInner {
                id: ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed)),
                refs: AtomicUsize::new(1),
                state: Mutex::new(ItemState::new(Arc::downgrade(parent))),
            }),
        }
    }

    /// Copy of this item for another scene: same source, independent geometry.
    pub(crate) fn duplicate_into(&self, parent: &Arc<SceneInner>) -> Self {
        let copy = Self::new(parent);
        {
            let src = lock_unpoisoned(&self.inner.state);
            let mut dst = lock_unpoisoned(&copy.inner.state);
            dst.source = src.source.clone();
            dst.info = src.info;
            dst.visible = src.visible;
            dst.last_size = src.last_size;
            dst.resolved = src.resolved;
        }
        copy
    }

    /// Identity of this item.
    pub fn id(&self) -> ItemId {
        self.inner.id
    }

    /// `true` when both handles refer to the same item.
    pub fn ptr_eq(&self, other: &SceneItem) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current number of strong references.
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Weak reference for holders that must not keep the item alive.
    pub fn downgrade(&self) -> WeakItem {
        WeakItem {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Owning scene, or `None` once detached (or once the scene is gone).
    pub fn scene(&self) -> Option<Scene> {
        let parent = lock_unpoisoned(&self.inner.state).parent.upgrade();
        parent.map(Scene::from_inner)
    }

    pub(crate) fn has_parent(&self, scene: &Arc<SceneInner>) -> bool {
        let st = lock_unpoisoned(&self.inner.state);
        std::ptr::eq(st.parent.as_ptr(), Arc::as_ptr(scene))
    }

    /// Remove this item from its owning scene. Returns `false` when detached.
    pub fn remove(&self) -> bool {
        match self.scene() {
            Some(scene) => scene.remove(self),
            None => false,
        }
    }

    /// Sever the container link: tear down the parent payload, clear the parent and release the
    /// container's reference. Safe on an already detached item.
    pub(crate) fn detach(self) {
        let payload = {
            let mut st = lock_unpoisoned(&self.inner.state);
            st.parent = Weak::new();
            st.parent_data.take()
        };
        drop(payload);
    }

    /// Wrapped source.
    pub fn source(&self) -> Option<SourceRef> {
        lock_unpoisoned(&self.inner.state).source.clone()
    }

    /// Replace the wrapped source. Geometry catches up on the next render or recompute.
    pub fn set_source(&self, source: SourceRef) {
        let old = {
            let mut st = lock_unpoisoned(&self.inner.state);
            if st
                .source
                .as_ref()
                .is_some_and(|cur| Arc::ptr_eq(cur, &source))
            {
                return;
            }
            st.source.replace(source)
        };
        drop(old);
    }

    /// `true` when the wrapped source has been removed upstream.
    pub fn source_removed(&self) -> bool {
        self.source().is_some_and(|s| s.is_removed())
    }

    /// Native size of the wrapped source, queried without holding the item's lock.
    fn source_size(&self) -> (u32, u32) {
        self.source()
            .map_or((0, 0), |s| (s.width(), s.height()))
    }

    fn modify(&self, f: impl FnOnce(&mut TransformInfo)) {
        let size = self.source_size();
        let parent = {
            let mut st = lock_unpoisoned(&self.inner.state);
            f(&mut st.info);
            st.recompute(size)
        };
        self.notify_transform(parent);
    }

    fn notify_transform(&self, parent: Option<Arc<SceneInner>>) {
        if let Some(scene) = parent {
            scene.emit(SceneEvent::ItemTransform(self.clone()));
        }
    }

    /// Recompute the cached transforms against the source's current size.
    pub fn update_transform(&self) {
        self.modify(|_| {});
    }

    pub(crate) fn restore(&self, source: SourceRef, info: TransformInfo, visible: bool) {
        self.set_source(source);
        {
            let mut st = lock_unpoisoned(&self.inner.state);
            st.visible = visible;
        }
        self.modify(|i| *i = info);
    }

    /// Canvas position of the alignment origin.
    pub fn position(&self) -> Vec2 {
        lock_unpoisoned(&self.inner.state).info.pos
    }

    /// Set the canvas position.
    pub fn set_position(&self, pos: Vec2) {
        self.modify(|i| i.pos = pos);
    }

    /// Rotation in degrees.
    pub fn rotation(&self) -> f64 {
        lock_unpoisoned(&self.inner.state).info.rot
    }

    /// Set the rotation in degrees.
    pub fn set_rotation(&self, degrees: f64) {
        self.modify(|i| i.rot = degrees);
    }

    /// Configured scale (before bounds fitting).
    pub fn scale(&self) -> Vec2 {
        lock_unpoisoned(&self.inner.state).info.scale
    }

    /// Set the configured scale.
    pub fn set_scale(&self, scale: Vec2) {
        self.modify(|i| i.scale = scale);
    }

    /// Origin alignment.
    pub fn alignment(&self) -> Alignment {
        lock_unpoisoned(&self.inner.state).info.alignment
    }

    /// Set the origin alignment.
    pub fn set_alignment(&self, alignment: Alignment) {
        self.modify(|i| i.alignment = alignment);
    }

    /// Bounds fitting mode.
    pub fn bounds_type(&self) -> BoundsType {
        lock_unpoisoned(&self.inner.state).info.bounds_type
    }

    /// Set the bounds fitting mode.
    pub fn set_bounds_type(&self, bounds_type: BoundsType) {
        self.modify(|i| i.bounds_type = bounds_type);
    }

    /// Alignment of fitted content inside the bounds box.
    pub fn bounds_alignment(&self) -> Alignment {
        lock_unpoisoned(&self.inner.state).info.bounds_alignment
    }

    /// Set the alignment of fitted content inside the bounds box.
    pub fn set_bounds_alignment(&self, alignment: Alignment) {
        self.modify(|i| i.bounds_alignment = alignment);
    }

    /// Bounds box size.
    pub fn bounds(&self) -> Vec2 {
        lock_unpoisoned(&self.inner.state).info.bounds
    }

    /// Set the bounds box size.
    pub fn set_bounds(&self, bounds: Vec2) {
        self.modify(|i| i.bounds = bounds);
    }

    /// All placement parameters at once.
    pub fn transform_info(&self) -> TransformInfo {
        lock_unpoisoned(&self.inner.state).info
    }

    /// Replace all placement parameters with a single recompute.
    pub fn set_transform_info(&self, info: TransformInfo) {
        self.modify(|i| *i = info);
    }

    /// Cached geometry from the last recompute.
    pub fn resolved(&self) -> ResolvedTransform {
        lock_unpoisoned(&self.inner.state).resolved
    }

    /// Source-local to canvas transform used for drawing.
    pub fn draw_transform(&self) -> Affine {
        self.resolved().draw
    }

    /// Unit-quad to canvas transform of the selection box.
    pub fn box_transform(&self) -> Affine {
        self.resolved().bounding_box
    }

    /// Source size observed by the last recompute.
    pub fn last_size(&self) -> (u32, u32) {
        lock_unpoisoned(&self.inner.state).last_size
    }

    /// Whether the item is drawn.
    pub fn visible(&self) -> bool {
        lock_unpoisoned(&self.inner.state).visible
    }

    /// Show or hide the item. Notifies the owning scene, if any.
    pub fn set_visible(&self, visible: bool) {
        let parent = {
            let mut st = lock_unpoisoned(&self.inner.state);
            st.visible = visible;
            st.parent.upgrade()
        };
        if let Some(scene) = parent {
            scene.emit(SceneEvent::ItemVisible(self.clone(), visible));
        }
    }

    /// Whether the item is selected in an editor.
    pub fn selected(&self) -> bool {
        lock_unpoisoned(&self.inner.state).selected
    }

    /// Select or deselect. Notifies the owning scene only when the state changes.
    pub fn set_selected(&self, selected: bool) {
        let parent = {
            let mut st = lock_unpoisoned(&self.inner.state);
            if st.selected == selected {
                return;
            }
            st.selected = selected;
            st.parent.upgrade()
        };
        if let Some(scene) = parent {
            let event = if selected {
                SceneEvent::ItemSelect(self.clone())
            } else {
                SceneEvent::ItemDeselect(self.clone())
            };
            scene.emit(event);
        }
    }

    /// Attach container-owned state, returning what it replaced.
    pub(crate) fn set_parent_data(&self, data: ItemData) -> Option<ItemData> {
        lock_unpoisoned(&self.inner.state).parent_data.replace(data)
    }

    /// Borrow the container-owned payload as `T`.
    ///
    /// `f` runs without the item's lock held, so it may call back into the item or its scene.
    pub fn with_parent_data<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = lock_unpoisoned(&self.inner.state).parent_data.clone()?;
        data.downcast_ref::<T>().map(f)
    }

    /// Attach caller-owned state, returning what it replaced.
    ///
    /// The item's handle to the payload is dropped when the item is destroyed.
    pub fn set_private_data(&self, data: ItemData) -> Option<ItemData> {
        lock_unpoisoned(&self.inner.state).private_data.replace(data)
    }

    /// Borrow the caller-owned payload as `T`.
    ///
    /// `f` runs without the item's lock held, so it may call back into the item or its scene.
    pub fn with_private_data<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = lock_unpoisoned(&self.inner.state).private_data.clone()?;
        data.downcast_ref::<T>().map(f)
    }

    /// Detach and return the caller-owned payload.
    pub fn take_private_data(&self) -> Option<ItemData> {
        lock_unpoisoned(&self.inner.state).private_data.take()
    }

    /// Draw the item: recompute if the source was resized since the last recompute, then draw
    /// the source under the draw transform when visible.
    ///
    /// The size check runs for hidden items too, so showing one later uses current geometry.
    pub fn render(&self, ctx: &mut dyn DrawContext) {
        let size = self.source_size();
        let (parent, draw, source) = {
            let mut st = lock_unpoisoned(&self.inner.state);
            let parent = if size != st.last_size {
                st.recompute(size)
            } else {
                None
            };
            let source = if st.visible { st.source.clone() } else { None };
            (parent, st.resolved.draw, source)
        };
        self.notify_transform(parent);

        if let Some(source) = source {
            ctx.push_matrix();
            ctx.mul_matrix(draw);
            source.render(ctx);
            ctx.pop_matrix();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/item.rs"]
mod tests;
