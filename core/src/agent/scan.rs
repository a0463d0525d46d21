//! Manhattan-radius spatial scans.
//!
//! Cells are visited shell by shell: every offset with `|x|+|y|+|z| = 1`, then
//! `= 2`, and so on. Results are ordered by radius only; the order inside one
//! shell is an implementation detail.

use crate::geometry::BlockPos;
use crate::material::{Block, Material};
use crate::world::World;

pub const NON_SOLID_SCAN_RADIUS: u32 = 1;
pub const NON_SOLID_SCAN_LIMIT: usize = 10;
pub const MATERIAL_SCAN_RADIUS: u32 = 10;
pub const MATERIAL_SCAN_LIMIT: usize = 20;

/// Which cells a scan collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFilter {
    NonSolid,
    /// Material equality under [`Material::matches`].
    Material(Material),
}

impl ScanFilter {
    pub fn matches(&self, block: &Block) -> bool {
        match self {
            ScanFilter::NonSolid => !block.is_solid(),
            ScanFilter::Material(m) => m.matches(block.material),
        }
    }
}

/// All integer offsets at Manhattan distance exactly `d` (for `d >= 1`).
pub fn shell(d: i32) -> impl Iterator<Item = [i32; 3]> {
    (-d..=d).flat_map(move |x| {
        let rest = d - x.abs();
        (-rest..=rest).flat_map(move |y| {
            let z = rest - y.abs();
            let mirrored = if z != 0 { Some([x, y, z]) } else { None };
            std::iter::once([x, y, -z]).chain(mirrored)
        })
    })
}

/// Collect up to `limit` cells around `origin` matching `filter`, nearest shells first.
pub fn scan(
    world: &dyn World,
    origin: BlockPos,
    filter: ScanFilter,
    max_distance: u32,
    limit: usize,
) -> Vec<BlockPos> {
    let mut found = Vec::new();
    if limit == 0 {
        return found;
    }
    let max_distance = i32::try_from(max_distance).unwrap_or(i32::MAX);
    for d in 1..=max_distance {
        for offset in shell(d) {
            let Some(pos) = origin.checked_add(offset) else {
                continue;
            };
            if filter.matches(&world.block_at(pos)) {
                found.push(pos);
                if found.len() >= limit {
                    return found;
                }
            }
        }
    }
    found
}
