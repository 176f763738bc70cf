//! Selection volume tree.
//!
//! Selection boxes filter which fibers are shown. Boxes form a two-level
//! structure: every master box starts a group, and children refine their
//! master. Within a group the master and its AND children must all contain a
//! fiber while NOT children must not; groups are OR-ed together.
//!
//! Each box caches one membership bit per fiber. Moving a box or reloading
//! fibers only marks caches stale; they are refreshed on the next query.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::dataset::FiberGeometry;
use crate::error::{Result, TractviewError};

slotmap::new_key_type! {
    /// Generational handle of a selection box.
    pub struct BoxId;
}

/// How a box takes part in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoxRole {
    /// Top-level box starting a group.
    Master,
    /// Child that must also contain the fiber.
    And,
    /// Child that must not contain the fiber.
    Not,
}

/// An axis-aligned selection region.
#[derive(Debug, Clone)]
pub struct SelectionBox {
    name: String,
    center: Vec3,
    size: Vec3,
    role: BoxRole,
    active: bool,
    visible: bool,
    membership: Vec<bool>,
    stale: bool,
    dirty: bool,
}

impl SelectionBox {
    fn new(name: String, center: Vec3, size: Vec3, role: BoxRole, fiber_count: usize) -> Self {
        Self {
            name,
            center,
            size: size.abs(),
            role,
            active: true,
            visible: true,
            membership: vec![false; fiber_count],
            stale: true,
            dirty: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Full edge lengths.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.size
    }

    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents()
    }

    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents()
    }

    #[must_use]
    pub fn role(&self) -> BoxRole {
        self.role
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.role == BoxRole::Master
    }

    #[must_use]
    pub fn is_not(&self) -> bool {
        self.role == BoxRole::Not
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Changed since the last finished frame.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Cached membership bits, one per fiber.
    #[must_use]
    pub fn membership(&self) -> &[bool] {
        &self.membership
    }

    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min()).all() && point.cmple(self.max()).all()
    }

    fn invalidate(&mut self) {
        self.stale = true;
        self.dirty = true;
    }
}

#[derive(Debug, Clone)]
struct Group {
    master: BoxId,
    children: Vec<BoxId>,
}

/// Owns all selection boxes and their grouping.
#[derive(Debug, Default)]
pub struct SelectionTree {
    boxes: SlotMap<BoxId, SelectionBox>,
    groups: Vec<Group>,
    fiber_count: usize,
    changed: bool,
}

impl SelectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a master box as a new group.
    pub fn create_master(&mut self, center: Vec3, size: Vec3) -> BoxId {
        let name = format!("box {}", self.groups.len() + 1);
        let id = self.boxes.insert(SelectionBox::new(
            name,
            center,
            size,
            BoxRole::Master,
            self.fiber_count,
        ));
        self.groups.push(Group {
            master: id,
            children: Vec::new(),
        });
        self.changed = true;
        id
    }

    /// Adds an AND child, or a NOT child when `is_not` is set, to `master`'s group.
    pub fn add_child(&mut self, master: BoxId, center: Vec3, size: Vec3, is_not: bool) -> Result<BoxId> {
        let group = self.group_index(master)?;
        let role = if is_not { BoxRole::Not } else { BoxRole::And };
        let name = format!("{} child {}", self.boxes[master].name, self.groups[group].children.len() + 1);
        let id = self
            .boxes
            .insert(SelectionBox::new(name, center, size, role, self.fiber_count));
        self.groups[group].children.push(id);
        self.changed = true;
        Ok(id)
    }

    /// Removes a box. Removing a master removes its whole group.
    pub fn remove(&mut self, id: BoxId) -> Result<()> {
        let selection_box = self.boxes.get(id).ok_or(TractviewError::BoxNotFound)?;
        if selection_box.is_master() {
            let group = self.group_index(id)?;
            let group = self.groups.remove(group);
            for child in group.children {
                self.boxes.remove(child);
            }
        } else {
            for group in &mut self.groups {
                group.children.retain(|&c| c != id);
            }
        }
        self.boxes.remove(id);
        self.changed = true;
        Ok(())
    }

    /// Removes every box.
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.groups.clear();
        self.changed = true;
    }

    #[must_use]
    pub fn get(&self, id: BoxId) -> Option<&SelectionBox> {
        self.boxes.get(id)
    }

    pub fn set_center(&mut self, id: BoxId, center: Vec3) -> Result<()> {
        self.modify(id, |b| b.center = center)
    }

    pub fn set_size(&mut self, id: BoxId, size: Vec3) -> Result<()> {
        self.modify(id, |b| b.size = size.abs())
    }

    pub fn set_active(&mut self, id: BoxId, active: bool) -> Result<()> {
        self.modify(id, |b| b.active = active)
    }

    /// Switches a child between AND and NOT. Masters keep their role.
    pub fn set_not(&mut self, id: BoxId, is_not: bool) -> Result<()> {
        self.modify(id, |b| {
            if b.role != BoxRole::Master {
                b.role = if is_not { BoxRole::Not } else { BoxRole::And };
            }
        })
    }

    /// Visibility only affects drawing, not selection.
    pub fn set_visible(&mut self, id: BoxId, visible: bool) -> Result<()> {
        let b = self.boxes.get_mut(id).ok_or(TractviewError::BoxNotFound)?;
        b.visible = visible;
        Ok(())
    }

    pub fn rename(&mut self, id: BoxId, name: impl Into<String>) -> Result<()> {
        let b = self.boxes.get_mut(id).ok_or(TractviewError::BoxNotFound)?;
        b.name = name.into();
        Ok(())
    }

    fn modify(&mut self, id: BoxId, f: impl FnOnce(&mut SelectionBox)) -> Result<()> {
        let b = self.boxes.get_mut(id).ok_or(TractviewError::BoxNotFound)?;
        f(b);
        b.invalidate();
        self.changed = true;
        Ok(())
    }

    fn group_index(&self, master: BoxId) -> Result<usize> {
        if !self.boxes.contains_key(master) {
            return Err(TractviewError::BoxNotFound);
        }
        self.groups
            .iter()
            .position(|g| g.master == master)
            .ok_or(TractviewError::NotAMaster)
    }

    /// Forces every cache to refresh on the next query.
    pub fn mark_all_dirty(&mut self) {
        for b in self.boxes.values_mut() {
            b.invalidate();
        }
        self.changed = true;
    }

    /// Reallocates every cache to `fiber_count` cleared entries.
    pub fn resize_membership(&mut self, fiber_count: usize) {
        self.fiber_count = fiber_count;
        for b in self.boxes.values_mut() {
            b.membership = vec![false; fiber_count];
            b.invalidate();
        }
        self.changed = true;
    }

    #[must_use]
    pub fn fiber_count(&self) -> usize {
        self.fiber_count
    }

    /// Recomputes stale caches against `geometry`.
    ///
    /// # Panics
    ///
    /// Panics if `geometry` or any cache disagrees with the tracked fiber
    /// count. That means fibers were reloaded without `resize_membership`.
    pub fn refresh(&mut self, geometry: &dyn FiberGeometry) {
        assert_eq!(
            geometry.fiber_count(),
            self.fiber_count,
            "fiber geometry does not match the selection membership size"
        );
        for b in self.boxes.values_mut() {
            assert_eq!(
                b.membership.len(),
                self.fiber_count,
                "selection box membership cache out of sync with fiber count"
            );
            if !b.stale {
                continue;
            }
            let (min, max) = (b.min(), b.max());
            for (fiber, bit) in b.membership.iter_mut().enumerate() {
                *bit = geometry.fiber_intersects(fiber, min, max);
            }
            b.stale = false;
        }
    }

    /// Returns whether `fiber` is selected by at least one group.
    ///
    /// Inactive children are skipped and an inactive master disables its
    /// whole group. Out-of-range fibers are never selected.
    pub fn evaluate_membership(&mut self, fiber: usize, geometry: &dyn FiberGeometry) -> bool {
        self.refresh(geometry);
        fiber < self.fiber_count && self.combine(fiber)
    }

    fn combine(&self, fiber: usize) -> bool {
        self.groups.iter().any(|group| {
            let master = &self.boxes[group.master];
            master.active
                && master.membership[fiber]
                && group.children.iter().all(|&c| {
                    let child = &self.boxes[c];
                    !child.active || child.membership[fiber] != child.is_not()
                })
        })
    }

    /// Returns true if any group can select fibers.
    #[must_use]
    pub fn has_active_group(&self) -> bool {
        self.groups.iter().any(|g| self.boxes[g.master].active)
    }

    /// Per-fiber visibility. Without an active group every fiber is shown.
    pub fn visible_fibers(&mut self, geometry: &dyn FiberGeometry) -> Vec<bool> {
        self.refresh(geometry);
        if !self.has_active_group() {
            return vec![true; self.fiber_count];
        }
        (0..self.fiber_count).map(|f| self.combine(f)).collect()
    }

    /// Whether the selection changed since the last finished frame.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self) {
        self.changed = true;
    }

    /// Clears the per-frame change flags after the fiber pass consumed them.
    pub fn finish_frame(&mut self) {
        self.changed = false;
        for b in self.boxes.values_mut() {
            b.dirty = false;
        }
    }

    /// Groups as `(master, children)` in creation order.
    pub fn groups(&self) -> impl Iterator<Item = (BoxId, &[BoxId])> + '_ {
        self.groups.iter().map(|g| (g.master, g.children.as_slice()))
    }

    /// All boxes, masters before their children.
    pub fn iter(&self) -> impl Iterator<Item = (BoxId, &SelectionBox)> + '_ {
        self.groups.iter().flat_map(move |g| {
            std::iter::once(g.master)
                .chain(g.children.iter().copied())
                .map(move |id| (id, &self.boxes[id]))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
