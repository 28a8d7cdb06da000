use crate::foundation::core::{Affine, Point, Rect, Size};

/// Drawing surface consumed by a render pass.
///
/// This is the narrow slice of a GPU command API the layer stack needs: a matrix stack that
/// composes item placement, a draw-state stack that isolates items from each other, and a quad
/// primitive sources use to emit their pixels.
pub trait DrawContext {
    /// Save the current matrix.
    fn push_matrix(&mut self);

    /// Post-multiply the current matrix by `m` (`current = current * m`).
    fn mul_matrix(&mut self, m: Affine);

    /// Restore the matrix saved by the matching [`DrawContext::push_matrix`].
    fn pop_matrix(&mut self);

    /// Save blend/draw state.
    fn push_draw_state(&mut self);

    /// Reset blend/draw state to defaults.
    fn reset_draw_state(&mut self);

    /// Restore the draw state saved by the matching [`DrawContext::push_draw_state`].
    fn pop_draw_state(&mut self);

    /// Draw a quad of `size` at the local origin under the current matrix.
    fn draw_quad(&mut self, size: Size);
}

/// One quad captured by [`RecordingContext`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DrawnQuad {
    /// Full transform that was current when the quad was drawn.
    pub transform: Affine,
    /// Quad size in local space.
    pub size: Size,
}

impl DrawnQuad {
    /// Axis-aligned canvas-space bounding rectangle of the quad.
    pub fn canvas_rect(&self) -> Rect {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(self.size.width, 0.0),
            Point::new(0.0, self.size.height),
            Point::new(self.size.width, self.size.height),
        ];
        let mut rect = Rect::from_points(self.transform * corners[0], self.transform * corners[0]);
        for c in &corners[1..] {
            rect = rect.union_pt(self.transform * *c);
        }
        rect
    }
}

/// CPU-side [`DrawContext`] that records quads instead of rasterizing them.
///
/// Used by the inspection CLI and by tests; unbalanced pops are ignored.
#[derive(Debug)]
pub struct RecordingContext {
    current: Affine,
    matrix_stack: Vec<Affine>,
    state_depth: usize,
    max_state_depth: usize,
    quads: Vec<DrawnQuad>,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingContext {
    /// Empty context with an identity matrix.
    pub fn new() -> Self {
        Self {
            current: Affine::IDENTITY,
            matrix_stack: Vec::new(),
            state_depth: 0,
            max_state_depth: 0,
            quads: Vec::new(),
        }
    }

    /// Quads drawn so far, in draw order.
    pub fn quads(&self) -> &[DrawnQuad] {
        &self.quads
    }

    /// Take the recorded quads, leaving the context empty.
    pub fn take_quads(&mut self) -> Vec<DrawnQuad> {
        std::mem::take(&mut self.quads)
    }

    /// Current matrix.
    pub fn current(&self) -> Affine {
        self.current
    }

    /// Number of unmatched `push_matrix` calls.
    pub fn matrix_depth(&self) -> usize {
        self.matrix_stack.len()
    }

    /// Number of unmatched `push_draw_state` calls.
    pub fn draw_state_depth(&self) -> usize {
        self.state_depth
    }

    /// Deepest draw-state nesting reached so far.
    pub fn max_draw_state_depth(&self) -> usize {
        self.max_state_depth
    }
}

impl DrawContext for RecordingContext {
    fn push_matrix(&mut self) {
        self.matrix_stack.push(self.current);
    }

    fn mul_matrix(&mut self, m: Affine) {
        self.current = self.current * m;
    }

    fn pop_matrix(&mut self) {
        if let Some(m) = self.matrix_stack.pop() {
            self.current = m;
        }
    }

    fn push_draw_state(&mut self) {
        self.state_depth += 1;
        self.max_state_depth = self.max_state_depth.max(self.state_depth);
    }

    fn reset_draw_state(&mut self) {}

    fn pop_draw_state(&mut self) {
        self.state_depth = self.state_depth.saturating_sub(1);
    }

    fn draw_quad(&mut self, size: Size) {
        self.quads.push(DrawnQuad {
            transform: self.current,
            size,
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/context.rs"]
mod tests;
