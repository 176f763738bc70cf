//! Scene documents.
//!
//! A scene records which files are loaded and how they are displayed, the
//! selection box hierarchy, spline control points and the camera. Reloading a
//! saved scene reproduces the dataset set, the boxes and the slice position;
//! the stored orientation is applied when present.

use std::path::{Path, PathBuf};

use glam::{Mat4, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::dataset::{DatasetKind, DatasetStatus, VolumeDims};
use crate::error::Result;
use crate::registry::DatasetRegistry;
use crate::selection::{BoxId, BoxRole, SelectionBox, SelectionTree};
use crate::view::ViewState;

/// Current document version.
pub const SCENE_VERSION: u32 = 1;

/// A loaded file and its display status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub status: DatasetStatus,
}

/// One persisted selection box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxEntry {
    pub name: String,
    pub center: Vec3,
    pub size: Vec3,
    #[serde(rename = "type")]
    pub role: BoxRole,
    pub active: bool,
    pub visible: bool,
}

impl From<&SelectionBox> for BoxEntry {
    fn from(b: &SelectionBox) -> Self {
        Self {
            name: b.name().to_string(),
            center: b.center(),
            size: b.size(),
            role: b.role(),
            active: b.is_active(),
            visible: b.is_visible(),
        }
    }
}

/// A master box with its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub master: BoxEntry,
    #[serde(default)]
    pub children: Vec<BoxEntry>,
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub version: u32,
    #[serde(default)]
    pub dims: Option<VolumeDims>,
    /// Slice position.
    pub position: UVec3,
    /// Camera orientation.
    #[serde(default)]
    pub rotation: Option<Mat4>,
    /// Files, oldest first so reloading restores the display order.
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
    /// Spline surface control points.
    #[serde(default)]
    pub points: Vec<Vec3>,
    #[serde(default)]
    pub selection_boxes: Vec<GroupEntry>,
}

impl SceneDocument {
    /// Captures the current session.
    ///
    /// Derived datasets (iso-surfaces, spline surfaces) are not listed as
    /// files; spline surfaces are kept through their control points.
    pub fn capture(registry: &DatasetRegistry, selection: &SelectionTree, view: &ViewState) -> Self {
        let datasets = registry
            .iter()
            .rev()
            .filter(|(_, d)| !matches!(d.kind(), DatasetKind::IsoSurface | DatasetKind::Surface))
            .map(|(_, d)| DatasetEntry {
                path: d.path().to_path_buf(),
                status: d.status,
            })
            .collect();

        let points = registry
            .iter()
            .find_map(|(_, d)| d.surface())
            .map(|s| s.points().to_vec())
            .unwrap_or_default();

        let selection_boxes = selection
            .groups()
            .filter_map(|(master, children)| {
                Some(GroupEntry {
                    master: selection.get(master)?.into(),
                    children: children
                        .iter()
                        .filter_map(|&c| selection.get(c).map(BoxEntry::from))
                        .collect(),
                })
            })
            .collect();

        Self {
            version: SCENE_VERSION,
            dims: registry.dims(),
            position: view.slices(),
            rotation: Some(view.transform()),
            datasets,
            points,
            selection_boxes,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Replaces the boxes in `tree` with the stored hierarchy.
    pub fn restore_selection(&self, tree: &mut SelectionTree) -> Result<()> {
        tree.clear();
        for group in &self.selection_boxes {
            let master = tree.create_master(group.master.center, group.master.size);
            apply_flags(tree, master, &group.master)?;
            for child in &group.children {
                let id = tree.add_child(master, child.center, child.size, child.role == BoxRole::Not)?;
                apply_flags(tree, id, child)?;
            }
        }
        Ok(())
    }
}

fn apply_flags(tree: &mut SelectionTree, id: BoxId, entry: &BoxEntry) -> Result<()> {
    tree.rename(id, entry.name.clone())?;
    tree.set_active(id, entry.active)?;
    tree.set_visible(id, entry.visible)
}
