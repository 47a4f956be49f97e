// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! The mutable search state bundle.

use crate::car::{Car, Pos};
use crate::puzzle::Layout;
use crate::tile::{Mod, Track};
use getset::{CopyGetters, Getters};
use ndarray::{Array2, Array4};

/// Everything a branch of the search mutates.
///
/// A state is produced once, enqueued, and never touched again; successors
/// deep-copy the fields they change. Live carts stay in simulation order
/// (normals, decoys, numerals); carts leave the list when they commit to an
/// ending or crash, crashed decoys moving into `crashed_decoys` where their
/// position keeps blocking tiles.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct State {
    /// Live carts in simulation order.
    #[getset(get = "pub")]
    pub(crate) cars: Vec<Car>,
    /// Current track grid.
    #[getset(get = "pub")]
    pub(crate) tracks: Array2<Track>,
    /// Current mod grid.
    #[getset(get = "pub")]
    pub(crate) mods: Array2<Mod>,
    /// Remaining track budget.
    #[getset(get_copy = "pub")]
    pub(crate) available_tracks: i32,
    /// Remaining semaphore budget.
    #[getset(get_copy = "pub")]
    pub(crate) available_semaphores: i32,
    /// Traversal counts, `[slot, direction, row, col]`.
    #[getset(get = "pub")]
    pub(crate) heat: Array4<u8>,
    /// Per-cell revisit allowance, same shape as `heat`.
    #[getset(get = "pub")]
    pub(crate) heat_limits: Array4<u8>,
    /// Ordinals that reached their ending, `[normals, numerals]`.
    #[getset(get = "pub")]
    pub(crate) solved: [Vec<u8>; 2],
    /// Whether each live cart is waiting at a gate or semaphore.
    #[getset(get = "pub")]
    pub(crate) stalled: Vec<bool>,
    /// Deferred gate closure per global cart slot.
    #[getset(get = "pub")]
    pub(crate) switch_queue: Vec<Option<Pos>>,
    /// Whether each global cart slot is paused on its station this tick.
    #[getset(get = "pub")]
    pub(crate) station_stalled: Vec<bool>,
    /// Decoys that crashed, frozen in place.
    #[getset(get = "pub")]
    pub(crate) crashed_decoys: Vec<Car>,
    /// Ticks elapsed since every normal and numeral cart solved.
    #[getset(get_copy = "pub")]
    pub(crate) mvmts_since_solved: u8,
}

impl State {
    /// The search root for a validated layout.
    #[must_use]
    pub fn initial(layout: &Layout) -> Self {
        let (h, w) = layout.dims();
        let total = layout.counts().total();
        let live = layout.cars().len();
        Self {
            cars: layout.cars().clone(),
            tracks: layout.tracks().clone(),
            mods: layout.mods().clone(),
            available_tracks: layout.max_tracks() as i32,
            available_semaphores: layout.max_semaphores() as i32,
            heat: Array4::zeros((total, 4, h, w)),
            heat_limits: Array4::zeros((total, 4, h, w)),
            solved: [Vec::new(), Vec::new()],
            stalled: vec![false; live],
            switch_queue: vec![None; total],
            station_stalled: vec![false; total],
            crashed_decoys: Vec::new(),
            mvmts_since_solved: 0,
        }
    }

    /// Whether every normal and numeral cart has committed to its ending.
    #[must_use]
    pub fn all_solved(&self, layout: &Layout) -> bool {
        self.solved[0].len() == layout.counts().normals()
            && self.solved[1].len() == layout.counts().numerals()
    }

    /// Whether any live cart is still a decoy.
    #[must_use]
    pub fn has_live_decoy(&self) -> bool {
        self.cars.iter().any(Car::is_decoy)
    }
}

#[cfg(test)]
mod bundle {
    use super::State;
    use crate::car::CarKind;
    use crate::puzzle::{CarSpec, Layout, Puzzle};
    use crate::tile::{Direction, Mod};
    use anyhow::Result;

    #[test]
    fn initial_state_mirrors_the_layout() -> Result<()> {
        let board = vec![vec![0, 0, 21]];
        let mods = vec![vec![u8::from(Mod::StartingCarTile), 0, 0]];
        let mod_nums = vec![vec![0, 0, 0]];
        let cars = vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)];
        let layout = Layout::new(&Puzzle::new(board, mods, mod_nums, cars, 3, 1))?;
        let state = State::initial(&layout);
        assert_eq!(state.available_tracks(), 3);
        assert_eq!(state.available_semaphores(), 1);
        assert_eq!(state.heat().shape(), &[1, 4, 1, 3]);
        assert_eq!(state.cars().len(), 1);
        assert!(!state.all_solved(&layout));
        assert!(!state.has_live_decoy());
        Ok(())
    }
}
