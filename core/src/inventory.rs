// Agent inventory: fixed slots of item stacks
use crate::material::Material;
use serde::{Deserialize, Serialize};

pub const INVENTORY_SLOTS: usize = 54;
pub const MAX_STACK: u32 = 64;

/// A quantity of one material with its variant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: Material,
    pub count: u32,
    pub data: u8,
}

impl ItemStack {
    pub fn new(material: Material, count: u32) -> Self {
        Self {
            material,
            count,
            data: 0,
        }
    }

    pub fn with_data(material: Material, count: u32, data: u8) -> Self {
        Self {
            material,
            count,
            data,
        }
    }
}

/// Slot-based inventory. Callers see it as a material -> quantity mapping; slots
/// only matter for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            slots: vec![None; INVENTORY_SLOTS],
        }
    }

    /// Add a stack, merging into existing stacks of the same kind first.
    /// Returns the amount that did not fit.
    pub fn add(&mut self, stack: ItemStack) -> u32 {
        let mut remaining = stack.count;
        for slot in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if slot.material == stack.material && slot.data == stack.data && slot.count < MAX_STACK
            {
                let moved = remaining.min(MAX_STACK - slot.count);
                slot.count += moved;
                remaining -= moved;
            }
        }
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(MAX_STACK);
                *slot = Some(ItemStack::with_data(stack.material, moved, stack.data));
                remaining -= moved;
            }
        }
        remaining
    }

    /// Put a stack into a specific slot, replacing whatever was there.
    pub fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = stack.filter(|s| s.count > 0);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, material: Material) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.material == material)
            .map(|s| s.count)
            .sum()
    }

    pub fn contains(&self, material: Material) -> bool {
        self.count(material) > 0
    }

    /// Take one unit of `material` from the first stack holding it, returning that
    /// stack's variant data.
    pub fn remove_one(&mut self, material: Material) -> Option<u8> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(stack) if stack.material == material))?;
        let stack = slot.as_mut()?;
        let data = stack.data;
        stack.count -= 1;
        if stack.count == 0 {
            *slot = None;
        }
        Some(data)
    }

    /// Occupied slots with their index.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    /// Per-material totals, in order of first appearance.
    pub fn totals(&self) -> Vec<(Material, u32)> {
        let mut totals: Vec<(Material, u32)> = Vec::new();
        for (_, stack) in self.slots() {
            match totals.iter_mut().find(|(m, _)| *m == stack.material) {
                Some((_, n)) => *n += stack.count,
                None => totals.push((stack.material, stack.count)),
            }
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_then_spills_into_new_slots() {
        let mut inv = Inventory::new();
        assert_eq!(inv.add(ItemStack::new(Material::Dirt, 60)), 0);
        assert_eq!(inv.add(ItemStack::new(Material::Dirt, 10)), 0);
        assert_eq!(inv.count(Material::Dirt), 70);
        let counts: Vec<u32> = inv.slots().map(|(_, s)| s.count).collect();
        assert_eq!(counts, vec![64, 6]);
    }

    #[test]
    fn different_variant_data_does_not_merge() {
        let mut inv = Inventory::new();
        inv.add(ItemStack::with_data(Material::Log, 1, 0));
        inv.add(ItemStack::with_data(Material::Log, 1, 2));
        assert_eq!(inv.slots().count(), 2);
        assert_eq!(inv.totals(), vec![(Material::Log, 2)]);
    }

    #[test]
    fn remove_one_empties_slot_and_reports_data() {
        let mut inv = Inventory::new();
        inv.add(ItemStack::with_data(Material::Log, 1, 3));
        assert_eq!(inv.remove_one(Material::Log), Some(3));
        assert!(inv.is_empty());
        assert_eq!(inv.remove_one(Material::Log), None);
    }

    #[test]
    fn full_inventory_reports_leftover() {
        let mut inv = Inventory::new();
        let leftover = inv.add(ItemStack::new(Material::Stone, MAX_STACK * INVENTORY_SLOTS as u32 + 5));
        assert_eq!(leftover, 5);
    }
}
