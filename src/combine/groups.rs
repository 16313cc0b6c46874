//! Material slots and their deduplication into groups.

use std::collections::HashMap;

use crate::data_structures::material::{Material, MaterialId, MaterialLibrary};

/// A source material that is used by at least one combined instance.
///
/// Its index is the second component of the vertex tag and the row of the
/// material parameter table.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSlot {
    pub material: MaterialId,
    pub group_index: u32,
}

/// Materials that can be drawn by one combined program.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialGroup {
    pub group_index: u32,
    /// First material seen for the group; it decides transparency and maps.
    pub representative: MaterialId,
    /// Slots of every member material, in discovery order.
    pub slots: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct MaterialGrouping {
    groups: Vec<MaterialGroup>,
    slots: Vec<MaterialSlot>,
    slot_of: HashMap<MaterialId, u32>,
}

impl MaterialGrouping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot and group of `id`, allocating both on first sight.
    pub fn resolve(&mut self, library: &MaterialLibrary, id: MaterialId) -> (u32, u32) {
        if let Some(&slot) = self.slot_of.get(&id) {
            return (slot, self.slots[slot as usize].group_index);
        }
        let group_index = match library.get(id) {
            Some(material) => self.find_group(library, material),
            None => None,
        }
        .unwrap_or_else(|| {
            let group_index = self.groups.len() as u32;
            self.groups.push(MaterialGroup {
                group_index,
                representative: id,
                slots: Vec::new(),
            });
            group_index
        });
        let slot = self.slots.len() as u32;
        self.slots.push(MaterialSlot {
            material: id,
            group_index,
        });
        self.groups[group_index as usize].slots.push(slot);
        self.slot_of.insert(id, slot);
        (slot, group_index)
    }

    fn find_group(&self, library: &MaterialLibrary, material: &Material) -> Option<u32> {
        self.groups
            .iter()
            .find(|group| {
                library
                    .get(group.representative)
                    .is_some_and(|rep| rep.same_group(material))
            })
            .map(|group| group.group_index)
    }

    pub fn groups(&self) -> &[MaterialGroup] {
        &self.groups
    }

    pub fn slots(&self) -> &[MaterialSlot] {
        &self.slots
    }

    pub fn into_parts(self) -> (Vec<MaterialGroup>, Vec<MaterialSlot>) {
        (self.groups, self.slots)
    }
}
