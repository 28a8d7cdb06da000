use crate::foundation::core::{Alignment, BoundsType, Vec2};
use crate::foundation::error::{SceneError, SceneResult};
use crate::scene::container::Scene;
use crate::scene::item::SceneItem;
use crate::scene::transform::TransformInfo;
use crate::source::SourceRegistry;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Persisted 2D vector. Accepts `{"x":..,"y":..}` or `[x, y]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2Record {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

impl<'de> Deserialize<'de> for Vec2Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Arr([f64; 2]),
            Obj {
                #[serde(default)]
                x: f64,
                #[serde(default)]
                y: f64,
            },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Arr([x, y]) => Ok(Self { x, y }),
            Repr::Obj { x, y } => Ok(Self { x, y }),
        }
    }
}

impl From<Vec2> for Vec2Record {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Vec2Record> for Vec2 {
    fn from(v: Vec2Record) -> Self {
        Vec2::new(v.x, v.y)
    }
}

fn default_scale() -> Vec2Record {
    Vec2Record { x: 1.0, y: 1.0 }
}

fn default_visible() -> bool {
    true
}

fn default_align() -> u32 {
    Alignment::default().bits()
}

/// One persisted layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Display name of the wrapped source.
    pub name: String,
    /// Position.
    #[serde(default)]
    pub pos: Vec2Record,
    /// Rotation in degrees.
    #[serde(default)]
    pub rot: f64,
    /// Configured scale.
    #[serde(default = "default_scale")]
    pub scale: Vec2Record,
    /// Visibility.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Bounds box size.
    #[serde(default)]
    pub bounds: Vec2Record,
    /// Origin alignment bitmask.
    #[serde(default = "default_align")]
    pub align: u32,
    /// Bounds fitting mode code.
    #[serde(default)]
    pub bounds_type: i64,
    /// Bounds alignment bitmask.
    #[serde(default)]
    pub bounds_align: u32,
}

impl ItemRecord {
    /// Capture an item's persisted state. `None` if the item has no source.
    pub fn from_item(item: &SceneItem) -> Option<Self> {
        let source = item.source()?;
        let info = item.transform_info();
        Some(Self {
            name: source.name().to_string(),
            pos: info.pos.into(),
            rot: info.rot,
            scale: info.scale.into(),
            visible: item.visible(),
            bounds: info.bounds.into(),
            align: info.alignment.bits(),
            bounds_type: info.bounds_type.as_i64(),
            bounds_align: info.bounds_alignment.bits(),
        })
    }

    /// Placement parameters described by this record.
    ///
    /// Unknown bounds codes fall back to [`BoundsType::None`]; unknown alignment bits are
    /// dropped.
    pub fn transform_info(&self) -> TransformInfo {
        let bounds_type = BoundsType::from_i64(self.bounds_type).unwrap_or_else(|| {
            tracing::warn!(
                source = %self.name,
                code = self.bounds_type,
                "unknown bounds type, using none"
            );
            BoundsType::None
        });
        TransformInfo {
            pos: self.pos.into(),
            rot: self.rot,
            scale: self.scale.into(),
            alignment: Alignment::from_bits_truncate(self.align),
            bounds_type,
            bounds_alignment: Alignment::from_bits_truncate(self.bounds_align),
            bounds: self.bounds.into(),
        }
    }
}

/// Persisted layer stack, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Layers, bottom first.
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl SceneRecord {
    /// Parse a record from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> SceneResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| SceneError::serde(format!("parse scene record JSON: {e}")))
    }

    /// Parse a record from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> SceneResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            SceneError::validation(format!("open scene record '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Write the record as pretty-printed JSON.
    pub fn to_writer_pretty<W: std::io::Write>(&self, w: W) -> SceneResult<()> {
        serde_json::to_writer_pretty(w, self)
            .map_err(|e| SceneError::serde(format!("write scene record JSON: {e}")))
    }

    /// Render the record as a pretty-printed JSON string.
    pub fn to_json_string(&self) -> SceneResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SceneError::serde(format!("serialize scene record: {e}")))
    }
}

impl Scene {
    /// Capture the layer stack.
    #[tracing::instrument(skip(self), fields(scene = %self.name()))]
    pub fn save(&self) -> SceneRecord {
        let items = self.items();
        SceneRecord {
            items: items.iter().filter_map(ItemRecord::from_item).collect(),
        }
    }

    /// Replace the layer stack with `record`, resolving sources through `registry`.
    ///
    /// Existing items are detached first. Records naming a source the registry does not know,
    /// or one [`Scene::add`] would reject, are skipped with a warning. Returns the number of
    /// items restored.
    #[tracing::instrument(skip_all, fields(scene = %self.name(), records = record.items.len()))]
    pub fn load(&self, record: &SceneRecord, registry: &dyn SourceRegistry) -> usize {
        let mut sources = Vec::with_capacity(record.items.len());
        for rec in &record.items {
            let Some(source) = registry.source_by_name(&rec.name) else {
                tracing::warn!(source = %rec.name, "source not found, skipping item");
                continue;
            };
            if let Err(err) = self.validate_source(&source) {
                tracing::warn!(source = %rec.name, "skipping item: {err}");
                continue;
            }
            sources.push((rec, source));
        }

        self.atomic_update(|scene| {
            scene.clear();

            let mut restored = Vec::with_capacity(sources.len());
            for (rec, source) in sources {
                let item = SceneItem::new(scene.inner());
                item.restore(source, rec.transform_info(), rec.visible);
                scene.attach_hotkeys(&item, &rec.name);
                restored.push(item);
            }

            let count = restored.len();
            scene.extend_items(restored);
            count
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/record.rs"]
mod tests;
