//! Persisted document format
//!
//! ```json
//! { "rectangles": [ { "ul": { "x": 10, "y": 20, "grid_id": 7 },
//!                     "br": { "x": 50, "y": 60, "grid_id": 7 },
//!                     "seg": 1 } ] }
//! ```
//!
//! Corners are stored relative to their owning grid, so a document stays
//! valid no matter where the segment's grids end up in absolute space.

use std::fs;
use std::path::{Path, PathBuf};

use butterfly_common::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::geometry::Coord;
use crate::core::rect::{GridAnchor, GridId, Rectangle, SegmentId};

/// Top-level key of the rectangle list
pub const RECTANGLES_KEY: &str = "rectangles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CornerEntry {
    x: i32,
    y: i32,
    grid_id: GridId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RectEntry {
    ul: CornerEntry,
    br: CornerEntry,
    seg: SegmentId,
}

impl RectEntry {
    fn from_rect(rect: &Rectangle) -> Option<Self> {
        let anchor = rect.anchor()?;
        Some(Self {
            ul: CornerEntry {
                x: anchor.local_ul.x,
                y: anchor.local_ul.y,
                grid_id: anchor.ul_grid,
            },
            br: CornerEntry {
                x: anchor.local_br.x,
                y: anchor.local_br.y,
                grid_id: anchor.br_grid,
            },
            seg: rect.segment,
        })
    }

    fn check(&self, cell_size: i32) -> std::result::Result<(), String> {
        let in_cell = |c: &CornerEntry| (0..cell_size).contains(&c.x) && (0..cell_size).contains(&c.y);
        if !in_cell(&self.ul) || !in_cell(&self.br) {
            return Err(format!("local offset outside [0, {cell_size})"));
        }
        if self.ul.grid_id == self.br.grid_id && (self.ul.x > self.br.x || self.ul.y > self.br.y) {
            return Err("corners reversed within one grid".to_string());
        }
        Ok(())
    }

    fn into_rect(self) -> Rectangle {
        let anchor = GridAnchor {
            ul_grid: self.ul.grid_id,
            br_grid: self.br.grid_id,
            local_ul: Coord::new(self.ul.x, self.ul.y),
            local_br: Coord::new(self.br.x, self.br.y),
        };
        Rectangle::anchored(anchor, self.seg)
    }
}

/// Encode every rectangle that knows its grid anchor.
///
/// Rectangles that were never placed on a grid are left out.
pub fn encode<'a>(rects: impl IntoIterator<Item = &'a Rectangle>) -> Value {
    let entries: Vec<Value> = rects
        .into_iter()
        .filter_map(RectEntry::from_rect)
        .filter_map(|entry| serde_json::to_value(entry).ok())
        .collect();
    serde_json::json!({ RECTANGLES_KEY: entries })
}

/// Decode a document into pending rectangles.
///
/// Bad entries are skipped one by one; a document without a rectangle list
/// decodes to nothing.
pub fn decode(doc: &Value, cell_size: i32) -> Vec<Rectangle> {
    let Some(entries) = doc.get(RECTANGLES_KEY).and_then(Value::as_array) else {
        warn!("Fog document has no '{RECTANGLES_KEY}' array, starting empty");
        return Vec::new();
    };

    let mut rects = Vec::with_capacity(entries.len());
    for (i, raw) in entries.iter().enumerate() {
        let entry = match RectEntry::deserialize(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping fog entry {i}: {e}");
                continue;
            }
        };
        if let Err(reason) = entry.check(cell_size) {
            warn!("Skipping fog entry {i}: {reason}");
            continue;
        }
        rects.push(entry.into_rect());
    }
    debug!("Decoded {} of {} fog entries", rects.len(), entries.len());
    rects
}

/// Parse and decode document text; unparsable text decodes to nothing
pub fn decode_str(text: &str, cell_size: i32) -> Vec<Rectangle> {
    match serde_json::from_str::<Value>(text) {
        Ok(doc) => decode(&doc, cell_size),
        Err(e) => {
            warn!("Unparsable fog document, starting empty: {e}");
            Vec::new()
        }
    }
}

/// Load rectangles from `path`. A missing or unreadable file gives an empty
/// set.
pub fn read_file(path: &Path, cell_size: i32) -> Vec<Rectangle> {
    match fs::read_to_string(path) {
        Ok(text) => decode_str(&text, cell_size),
        Err(e) => {
            debug!("No fog document at {}: {e}", path.display());
            Vec::new()
        }
    }
}

/// Write `doc` to `path` through a sibling temporary file
pub fn write_file(path: &Path, doc: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path)?;
    fs::write(&tmp, serde_json::to_vec(doc)?)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!("Saved fog document to {}", path.display());
    Ok(())
}

fn tmp_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::invalid_input(format!("not a file path: {}", path.display())))?;
    let mut tmp = name.to_os_string();
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}
