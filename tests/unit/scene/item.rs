use super::*;
use crate::foundation::core::{Point, Size};
use crate::render::context::RecordingContext;
use crate::scene::container::SceneOpts;
use crate::source::PlaceholderSource;
use crate::source::VideoSource;
use std::sync::OnceLock;
use std::sync::atomic::AtomicUsize;

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn scene_with(name: &str, w: u32, h: u32) -> (Scene, Arc<PlaceholderSource>, SceneItem) {
    let scene = Scene::new("main", SceneOpts::default());
    let src = Arc::new(PlaceholderSource::new(name, w, h));
    let item = scene.add(src.clone()).unwrap();
    (scene, src, item)
}

fn record_events(scene: &Scene) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    scene.signals().on_event(move |_, ev| sink.lock().unwrap().push(ev.name()));
    seen
}

#[test]
fn container_membership_is_a_reference() {
    let (scene, _src, item) = scene_with("cam", 640, 480);
    assert_eq!(item.ref_count(), 2);

    let extra = item.clone();
    assert_eq!(item.ref_count(), 3);
    drop(extra);

    assert!(scene.remove(&item));
    assert_eq!(item.ref_count(), 1);
    assert!(item.scene().is_none());
    assert_eq!(scene.item_count(), 0);
}

#[test]
fn removed_item_stays_usable_while_referenced() {
    let (scene, _src, item) = scene_with("cam", 640, 480);
    item.remove();
    item.set_position(Vec2::new(10.0, 20.0));
    assert_eq!(item.position(), Vec2::new(10.0, 20.0));
    assert!(!item.remove());
    assert!(!scene.remove(&item));
}

#[test]
fn private_payload_torn_down_once_on_last_release() {
    let drops = Arc::new(AtomicUsize::new(0));
    let (scene, _src, item) = scene_with("cam", 640, 480);
    assert!(
        item.set_private_data(Arc::new(DropCounter(Arc::clone(&drops))))
            .is_none()
    );

    let other = item.clone();
    scene.remove(&item);
    drop(item);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(other);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn replaced_private_payload_is_returned() {
    let (_scene, _src, item) = scene_with("cam", 1, 1);
    item.set_private_data(Arc::new(7_u32));
    assert_eq!(item.with_private_data(|v: &u32| *v), Some(7));
    assert_eq!(item.with_private_data(|v: &String| v.len()), None);

    let old = item.set_private_data(Arc::new(9_u32)).unwrap();
    assert_eq!(old.downcast_ref::<u32>(), Some(&7));
    let taken = item.take_private_data().unwrap();
    assert_eq!(taken.downcast_ref::<u32>(), Some(&9));
    assert!(item.take_private_data().is_none());
}

#[test]
fn payload_closures_may_call_back_into_item() {
    let (scene, _src, item) = scene_with("cam", 10, 10);
    item.set_private_data(Arc::new(3_u32));
    let seen = record_events(&scene);

    let pos = item.with_private_data(|v: &u32| {
        item.set_position(Vec2::new(f64::from(*v), 0.0));
        item.position()
    });
    assert_eq!(pos, Some(Vec2::new(3.0, 0.0)));
    assert_eq!(*seen.lock().unwrap(), vec!["item_transform"]);

    item.set_parent_data(Arc::new(String::from("parent")));
    let visible = item.with_parent_data(|_: &String| {
        item.set_visible(false);
        item.visible()
    });
    assert_eq!(visible, Some(false));
}

struct SelfQueryingSource {
    item: OnceLock<WeakItem>,
    queries: AtomicUsize,
}

impl VideoSource for SelfQueryingSource {
    fn name(&self) -> &str {
        "self-query"
    }

    fn width(&self) -> u32 {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.item
            .get()
            .and_then(WeakItem::upgrade)
            .map_or(8, |item| item.position().x as u32 + 8)
    }

    fn height(&self) -> u32 {
        4
    }

    fn render(&self, _ctx: &mut dyn DrawContext) {}
}

#[test]
fn source_size_queries_may_read_the_item() {
    let scene = Scene::new("main", SceneOpts::default());
    let src = Arc::new(SelfQueryingSource {
        item: OnceLock::new(),
        queries: AtomicUsize::new(0),
    });
    let item = scene.add(src.clone()).unwrap();
    assert!(src.item.set(item.downgrade()).is_ok());

    item.set_position(Vec2::new(2.0, 0.0));
    assert_eq!(item.last_size(), (8, 4));

    let mut ctx = RecordingContext::new();
    item.render(&mut ctx);
    assert_eq!(item.last_size(), (10, 4));
    assert!(src.queries.load(Ordering::SeqCst) >= 2);
}

#[test]
fn destroy_releases_source() {
    let (scene, src, item) = scene_with("cam", 1, 1);
    assert_eq!(Arc::strong_count(&src), 2);
    scene.remove(&item);
    assert_eq!(Arc::strong_count(&src), 2);
    drop(item);
    assert_eq!(Arc::strong_count(&src), 1);
}

#[test]
fn weak_upgrade_fails_after_destroy() {
    let (scene, _src, item) = scene_with("cam", 1, 1);
    let weak = item.downgrade();
    assert!(weak.upgrade().is_some_and(|i| i.ptr_eq(&item)));

    scene.remove(&item);
    drop(item);
    assert!(weak.upgrade().is_none());
}

#[test]
fn concurrent_add_release_destroys_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let (scene, _src, item) = scene_with("cam", 1, 1);
    item.set_private_data(Arc::new(DropCounter(Arc::clone(&drops))));
    let weak = item.downgrade();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let item = item.clone();
            let weak = weak.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let a = item.clone();
                    let b = weak.upgrade();
                    drop(a);
                    drop(b);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(item.ref_count(), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    scene.remove(&item);
    drop(item);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(weak.upgrade().is_none());
}

#[test]
fn setters_recompute_and_notify() {
    let (scene, _src, item) = scene_with("cam", 100, 50);
    let seen = record_events(&scene);

    item.set_position(Vec2::new(10.0, 10.0));
    item.set_scale(Vec2::new(2.0, 2.0));
    item.set_rotation(90.0);

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["item_transform", "item_transform", "item_transform"]
    );
    let r = item.resolved();
    assert_eq!(r.size, Size::new(200.0, 100.0));
    let p = item.draw_transform() * Point::new(100.0, 0.0);
    assert!((p.x - 10.0).abs() < 1e-9);
    assert!((p.y - 210.0).abs() < 1e-9);
}

#[test]
fn detached_item_does_not_notify() {
    let (scene, _src, item) = scene_with("cam", 100, 50);
    scene.remove(&item);
    let seen = record_events(&scene);

    item.set_position(Vec2::new(1.0, 1.0));
    item.set_visible(false);
    item.set_selected(true);
    assert!(seen.lock().unwrap().is_empty());
    assert!(!item.visible());
    assert!(item.selected());
}

#[test]
fn selection_notifies_on_change_only() {
    let (scene, _src, item) = scene_with("cam", 1, 1);
    let seen = record_events(&scene);

    item.set_selected(false);
    item.set_selected(true);
    item.set_selected(true);
    item.set_selected(false);

    assert_eq!(*seen.lock().unwrap(), vec!["item_select", "item_deselect"]);
}

#[test]
fn visibility_notifies_with_value() {
    let (scene, _src, item) = scene_with("cam", 1, 1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    scene
        .signals()
        .on_item_visible(move |_, it, v| sink.lock().unwrap().push((it.id(), v)));

    item.set_visible(false);
    item.set_visible(false);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(item.id(), false), (item.id(), false)]
    );
}

#[test]
fn render_recomputes_after_source_resize() {
    let (scene, src, item) = scene_with("cam", 100, 100);
    item.set_bounds_type(BoundsType::ScaleInner);
    item.set_bounds(Vec2::new(200.0, 200.0));
    assert_eq!(item.resolved().scale, Vec2::new(2.0, 2.0));

    src.resize(400, 100);
    assert_eq!(item.last_size(), (100, 100));
    let seen = record_events(&scene);

    let mut ctx = RecordingContext::new();
    item.render(&mut ctx);

    assert_eq!(item.last_size(), (400, 100));
    assert_eq!(item.resolved().scale, Vec2::new(0.5, 0.5));
    assert_eq!(*seen.lock().unwrap(), vec!["item_transform"]);
    assert_eq!(ctx.quads().len(), 1);
    assert_eq!(ctx.matrix_depth(), 0);

    ctx.take_quads();
    item.render(&mut ctx);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn hidden_item_skips_draw_but_tracks_size() {
    let (_scene, src, item) = scene_with("cam", 10, 10);
    item.set_visible(false);
    src.resize(20, 30);

    let mut ctx = RecordingContext::new();
    item.render(&mut ctx);

    assert!(ctx.quads().is_empty());
    assert_eq!(src.render_count(), 0);
    assert_eq!(item.last_size(), (20, 30));
}

#[test]
fn render_draws_under_item_transform() {
    let (_scene, _src, item) = scene_with("cam", 64, 32);
    item.set_position(Vec2::new(5.0, 7.0));

    let mut ctx = RecordingContext::new();
    item.render(&mut ctx);

    let quad = &ctx.quads()[0];
    assert_eq!(quad.size, Size::new(64.0, 32.0));
    assert_eq!(quad.transform, Affine::translate((5.0, 7.0)));
    assert_eq!(ctx.current(), Affine::IDENTITY);
}

#[test]
fn set_transform_info_applies_all_fields() {
    let (_scene, _src, item) = scene_with("cam", 10, 10);
    let info = TransformInfo {
        pos: Vec2::new(3.0, 4.0),
        rot: 45.0,
        scale: Vec2::new(2.0, 3.0),
        alignment: Alignment::CENTER,
        bounds_type: BoundsType::Stretch,
        bounds_alignment: Alignment::LEFT,
        bounds: Vec2::new(50.0, 60.0),
    };
    item.set_transform_info(info);

    assert_eq!(item.transform_info(), info);
    assert_eq!(item.alignment(), Alignment::CENTER);
    assert_eq!(item.bounds_type(), BoundsType::Stretch);
    assert_eq!(item.bounds_alignment(), Alignment::LEFT);
    assert_eq!(item.bounds(), Vec2::new(50.0, 60.0));
    assert_eq!(item.rotation(), 45.0);
    assert_eq!(item.scale(), Vec2::new(2.0, 3.0));
}

#[test]
fn set_source_swaps_reference() {
    let (_scene, old, item) = scene_with("a", 1, 1);
    let new = Arc::new(PlaceholderSource::new("b", 2, 2));
    item.set_source(new.clone());

    assert_eq!(Arc::strong_count(&old), 1);
    assert_eq!(item.source().map(|s| s.name().to_string()), Some("b".into()));
    item.update_transform();
    assert_eq!(item.last_size(), (2, 2));
}
