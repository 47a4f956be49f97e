// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Pruning caches: the visited-state set and the heat tensor bookkeeping.

use crate::car::{Car, Pos};
use crate::constants::{DECOY_HEAT_LIMIT, HEAT_LIMIT_CAP};
use crate::puzzle::Layout;
use crate::state::State;
use crate::tile::Direction;
use ndarray::{s, Array4, Axis};
use std::collections::HashSet;

/// Canonical fingerprint of a state.
///
/// Carts (live and crashed) are sorted by (kind, ordinal) so the record is
/// independent of live-list order; boards are stored as sparse diffs from the
/// puzzle's initial grids. Equality of fingerprints backs the hash, so
/// collisions cannot merge distinct states.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct StateKey {
    cars: Vec<(u8, u8, i32, i32, u8)>,
    board_diff: Vec<(usize, u8)>,
    mod_diff: Vec<(usize, u8)>,
    tracks: i32,
    semaphores: i32,
    heat: Vec<u8>,
}

impl StateKey {
    pub(crate) fn capture(state: &State, layout: &Layout) -> Self {
        let mut cars: Vec<&Car> = state
            .cars()
            .iter()
            .chain(state.crashed_decoys().iter())
            .collect();
        cars.sort_by_key(|car| car.sort_key());
        let cars = cars
            .into_iter()
            .map(|car| {
                let (tag, num) = car.sort_key();
                (tag, num, car.pos().row, car.pos().col, car.dir().index() as u8)
            })
            .collect();

        let board_diff = state
            .tracks()
            .iter()
            .zip(layout.tracks().iter())
            .enumerate()
            .filter(|(_, (now, init))| now != init)
            .map(|(i, (now, _))| (i, u8::from(*now)))
            .collect();
        let mod_diff = state
            .mods()
            .iter()
            .zip(layout.mods().iter())
            .enumerate()
            .filter(|(_, (now, init))| now != init)
            .map(|(i, (now, _))| (i, u8::from(*now)))
            .collect();

        Self {
            cars,
            board_diff,
            mod_diff,
            tracks: state.available_tracks(),
            semaphores: state.available_semaphores(),
            heat: state.heat().iter().copied().collect(),
        }
    }
}

/// The set of canonical states already expanded.
#[derive(Debug, Default)]
pub(crate) struct Visited {
    seen: HashSet<StateKey>,
}

impl Visited {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a fingerprint; `false` means it was already present.
    pub(crate) fn insert(&mut self, key: StateKey) -> bool {
        self.seen.insert(key)
    }
}

/// Count a cart's traversal of its current cell and grow the limit grid.
///
/// First traversal of a cell raises that limit cell to one. Returns `false`
/// when the traversal exceeds the cart's allowance (the flat decoy cap, or
/// the per-cell limit for everyone else) and the branch must die.
pub(crate) fn note_traversal(
    heat: &mut Array4<u8>,
    limits: &mut Array4<u8>,
    slot: usize,
    dir: Direction,
    pos: Pos,
    decoy: bool,
) -> bool {
    let (row, col) = pos.index();
    let idx = [slot, dir.index(), row, col];
    if limits[idx] == 0 {
        limits[idx] = 1;
    }
    heat[idx] = heat[idx].saturating_add(1);
    let allowed = if decoy { DECOY_HEAT_LIMIT } else { limits[idx] };
    heat[idx] <= allowed
}

/// Raise every nonzero limit in a cart's slice by one, as standing on a
/// swapping track or switch-rail demands. Returns `false` when the stepped
/// cell already sits at the global cap and the combination must be dropped.
pub(crate) fn raise_limits(
    limits: &mut Array4<u8>,
    slot: usize,
    dir: Direction,
    pos: Pos,
    stalled: bool,
) -> bool {
    let (row, col) = pos.index();
    if limits[[slot, dir.index(), row, col]] >= HEAT_LIMIT_CAP {
        return false;
    }
    if !stalled {
        limits
            .index_axis_mut(Axis(0), slot)
            .mapv_inplace(|v| if v > 0 { v.saturating_add(1) } else { v });
    }
    true
}

/// Total heat across every cart and direction at one cell.
pub(crate) fn heat_at(heat: &Array4<u8>, pos: Pos) -> u32 {
    let (row, col) = pos.index();
    heat.slice(s![.., .., row, col])
        .iter()
        .map(|&v| u32::from(v))
        .sum()
}

/// Heat across every cart at one cell for a single direction.
pub(crate) fn heat_at_dir(heat: &Array4<u8>, dir: Direction, pos: Pos) -> u32 {
    let (row, col) = pos.index();
    heat.slice(s![.., dir.index(), row, col])
        .iter()
        .map(|&v| u32::from(v))
        .sum()
}
