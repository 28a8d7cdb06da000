use crate::foundation::core::Size;
use crate::render::context::DrawContext;
use crate::source::VideoSource;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Fixed-color stand-in source with a mutable native size.
///
/// Draws a single quad of its native size. Resizing from another thread models a capture
/// device changing resolution between frames.
#[derive(Debug)]
pub struct PlaceholderSource {
    name: String,
    width: AtomicU32,
    height: AtomicU32,
    removed: AtomicBool,
    renders: AtomicU64,
}

impl PlaceholderSource {
    /// New source of `width x height` pixels.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            removed: AtomicBool::new(false),
            renders: AtomicU64::new(0),
        }
    }

    /// Change the native size.
    pub fn resize(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Release);
        self.height.store(height, Ordering::Release);
    }

    /// Flag the source as removed upstream.
    pub fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Number of times [`VideoSource::render`] ran.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Acquire)
    }
}

impl VideoSource for PlaceholderSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width.load(Ordering::Acquire)
    }

    fn height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    fn render(&self, ctx: &mut dyn DrawContext) {
        self.renders.fetch_add(1, Ordering::AcqRel);
        ctx.draw_quad(Size::new(f64::from(self.width()), f64::from(self.height())));
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}
