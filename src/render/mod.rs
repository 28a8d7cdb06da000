//! Drawing surface abstraction.

/// Draw context trait and a recording implementation.
pub mod context;
