//! Placement geometry for one layer.
//!
//! Resolution is a pure function of the item's [`TransformInfo`] and the source's native size,
//! so the same math serves live items, duplicated items and offline inspection.

use crate::foundation::core::{Affine, Alignment, BoundsType, Size, Vec2};

/// Editable placement parameters of an item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformInfo {
    /// Canvas position of the item's alignment origin.
    pub pos: Vec2,
    /// Clockwise rotation in degrees about the alignment origin.
    pub rot: f64,
    /// Configured scale.
    pub scale: Vec2,
    /// Which point of the output box sits at `pos`.
    pub alignment: Alignment,
    /// Bounds fitting mode.
    pub bounds_type: BoundsType,
    /// Where fitted content sits inside the bounds box.
    pub bounds_alignment: Alignment,
    /// Bounds box size in canvas pixels.
    pub bounds: Vec2,
}

impl Default for TransformInfo {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            rot: 0.0,
            scale: Vec2::new(1.0, 1.0),
            alignment: Alignment::default(),
            bounds_type: BoundsType::None,
            bounds_alignment: Alignment::CENTER,
            bounds: Vec2::ZERO,
        }
    }
}

/// Result of resolving a [`TransformInfo`] against a source size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTransform {
    /// Source size the resolution was computed for.
    pub source_size: (u32, u32),
    /// Effective scale after bounds fitting.
    pub scale: Vec2,
    /// Origin offset subtracted after scaling (alignment plus bounds residue).
    pub origin: Vec2,
    /// Reported output size: the bounds box when bounds are active, else the scaled size.
    /// Both axes are truncated to whole pixels.
    pub size: Size,
    /// Size actually covered by the scaled source.
    pub content_size: Size,
    /// Maps source-local pixels (a quad of the native size) to canvas space.
    pub draw: Affine,
    /// Maps the unit quad to the selection box in canvas space.
    pub bounding_box: Affine,
}

impl Default for ResolvedTransform {
    fn default() -> Self {
        Self {
            source_size: (0, 0),
            scale: Vec2::new(1.0, 1.0),
            origin: Vec2::ZERO,
            size: Size::ZERO,
            content_size: Size::ZERO,
            draw: Affine::IDENTITY,
            bounding_box: Affine::IDENTITY,
        }
    }
}

/// Offset `v` so the anchor selected by `align` lands on the local origin.
///
/// Extents are whole pixels; centering halves them with integer division.
fn add_alignment(v: &mut Vec2, align: Alignment, cx: i64, cy: i64) {
    if align.contains(Alignment::RIGHT) {
        v.x += cx as f64;
    } else if !align.contains(Alignment::LEFT) {
        v.x += (cx / 2) as f64;
    }

    if align.contains(Alignment::BOTTOM) {
        v.y += cy as f64;
    } else if !align.contains(Alignment::TOP) {
        v.y += (cy / 2) as f64;
    }
}

fn placement(pos: Vec2, rot_deg: f64, origin: Vec2, scale: Vec2) -> Affine {
    Affine::translate(pos)
        * Affine::rotate(rot_deg.to_radians())
        * Affine::translate(-origin)
        * Affine::scale_non_uniform(scale.x, scale.y)
}

/// Multiply `scale` by `mul` unless the ratio is degenerate.
fn scale_by(scale: &mut Vec2, mul: f64) {
    if mul.is_finite() {
        *scale *= mul;
    }
}

/// Fit `scale` into the bounds box, returning the residue origin offset.
fn fit_bounds(info: &TransformInfo, scale: &mut Vec2, width: u32, height: u32) -> Vec2 {
    let (w, h) = (f64::from(width), f64::from(height));
    let bounds = info.bounds;
    let scaled_w = w * scale.x.abs();
    let scaled_h = h * scale.y.abs();
    let input_aspect = scaled_w / scaled_h;
    let bounds_aspect = bounds.x / bounds.y;

    let mut mode = info.bounds_type;
    if mode == BoundsType::MaxOnly && (scaled_w > bounds.x || scaled_h > bounds.y) {
        mode = BoundsType::ScaleInner;
    }

    match mode {
        BoundsType::ScaleInner | BoundsType::ScaleOuter => {
            let mut use_width = bounds_aspect < input_aspect;
            if info.bounds_type == BoundsType::ScaleOuter {
                use_width = !use_width;
            }
            let mul = if use_width {
                bounds.x / scaled_w
            } else {
                bounds.y / scaled_h
            };
            scale_by(scale, mul);
        }
        BoundsType::ScaleToWidth => scale_by(scale, bounds.x / scaled_w),
        BoundsType::ScaleToHeight => scale_by(scale, bounds.y / scaled_h),
        BoundsType::Stretch => {
            if width > 0 && height > 0 {
                scale.x = bounds.x / w;
                scale.y = bounds.y / h;
            }
        }
        BoundsType::None | BoundsType::MaxOnly => {}
    }

    let width_diff = bounds.x - w * scale.x;
    let height_diff = bounds.y - h * scale.y;

    let mut origin = Vec2::ZERO;
    add_alignment(
        &mut origin,
        info.bounds_alignment,
        -width_diff as i64,
        -height_diff as i64,
    );
    origin
}

/// Resolve placement for a source of `width x height` native pixels.
pub fn resolve_transform(info: &TransformInfo, width: u32, height: u32) -> ResolvedTransform {
    let (w, h) = (f64::from(width), f64::from(height));
    let mut scale = info.scale;
    let bounded = info.bounds_type != BoundsType::None;

    let (mut origin, size) = if bounded {
        let origin = fit_bounds(info, &mut scale, width, height);
        (origin, Size::new(info.bounds.x.trunc(), info.bounds.y.trunc()))
    } else {
        (Vec2::ZERO, Size::new((w * scale.x).trunc(), (h * scale.y).trunc()))
    };

    add_alignment(
        &mut origin,
        info.alignment,
        size.width as i64,
        size.height as i64,
    );
    let draw = placement(info.pos, info.rot, origin, scale);

    let box_size = if bounded {
        info.bounds
    } else {
        Vec2::new(w * info.scale.x, h * info.scale.y)
    };
    let mut box_origin = Vec2::ZERO;
    add_alignment(
        &mut box_origin,
        info.alignment,
        box_size.x as i64,
        box_size.y as i64,
    );
    let bounding_box = placement(info.pos, info.rot, box_origin, box_size);

    ResolvedTransform {
        source_size: (width, height),
        scale,
        origin,
        size,
        content_size: Size::new(w * scale.x, h * scale.y),
        draw,
        bounding_box,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/transform.rs"]
mod tests;
