pub use kurbo::{Affine, Point, Rect, Size, Vec2};

use bitflags::bitflags;

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

bitflags! {
    /// Anchor flags for an item's origin or for content inside its bounds box.
    ///
    /// An axis with neither flag set is centered, so the empty set means
    /// "center on both axes".
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Alignment: u32 {
        /// Anchor on the left edge.
        const LEFT   = 1 << 0;
        /// Anchor on the right edge.
        const RIGHT  = 1 << 1;
        /// Anchor on the top edge.
        const TOP    = 1 << 2;
        /// Anchor on the bottom edge.
        const BOTTOM = 1 << 3;
    }
}

impl Alignment {
    /// Centered on both axes.
    pub const CENTER: Self = Self::empty();
}

impl Default for Alignment {
    fn default() -> Self {
        Self::TOP | Self::LEFT
    }
}

/// How an item's content is fitted into its bounds box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundsType {
    /// No bounds; the configured scale is used as-is.
    #[default]
    None,
    /// Scale each axis independently to fill the bounds exactly.
    Stretch,
    /// Uniform scale so the content fits inside the bounds.
    ScaleInner,
    /// Uniform scale so the content covers the bounds.
    ScaleOuter,
    /// Scale by the width ratio only.
    ScaleToWidth,
    /// Scale by the height ratio only.
    ScaleToHeight,
    /// Leave the scale alone unless the content is larger than the bounds,
    /// then behave like [`BoundsType::ScaleInner`].
    MaxOnly,
}

impl BoundsType {
    /// Stable integer code used in persisted records.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Stretch => 1,
            Self::ScaleInner => 2,
            Self::ScaleOuter => 3,
            Self::ScaleToWidth => 4,
            Self::ScaleToHeight => 5,
            Self::MaxOnly => 6,
        }
    }

    /// Decode a persisted integer code.
    pub fn from_i64(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Stretch,
            2 => Self::ScaleInner,
            3 => Self::ScaleOuter,
            4 => Self::ScaleToWidth,
            5 => Self::ScaleToHeight,
            6 => Self::MaxOnly,
            _ => return None,
        })
    }
}

/// Relative z-order movement for [`crate::Scene::set_order`].
///
/// The end of the sequence is drawn last, so it is the "top" of the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderMovement {
    /// Swap with the next item (one step towards the top).
    Up,
    /// Swap with the previous item (one step towards the bottom).
    Down,
    /// Move to the end of the sequence.
    Top,
    /// Move to the start of the sequence.
    Bottom,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
