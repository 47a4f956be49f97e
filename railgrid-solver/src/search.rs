// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! The search driver.
//!
//! Iterative, budget-bucketed best-first traversal over the generator's
//! successor states. Depth-first keeps a stack and sweeps the whole space,
//! always holding the most economical solution seen; breadth-first drains
//! budget buckets from richest to poorest and can stop at the first solution
//! it records, which is optimal by construction. Both orders find the same
//! solutions.

use crate::caches::Visited;
use crate::generate::{expand_tick, Verdict};
use crate::puzzle::{Layout, Puzzle, PuzzleError};
use crate::state::State;
use crate::tile::{Mod, Track};
use anyhow::Result;
use getset::{CopyGetters, Getters};
use ndarray::Array2;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Frontier discipline of the driver.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SearchOrder {
    /// Stack-based: deepest branch first, exhaustive sweep.
    #[default]
    Dfs,
    /// Budget-bucketed queues: richest bucket first, stops at the first
    /// recorded solution.
    Bfs,
}

/// A solved placement: the cheapest board found and what it left over.
///
/// Placed semaphores read back from `mods`: a cell holding `Semaphore`, or
/// `Deactivated` where the puzzle had no mod, is one the solver added.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct Solution {
    /// Final track grid, permanent cells restored to their puzzle kinds.
    #[getset(get = "pub")]
    board: Array2<Track>,
    /// Final mod grid.
    #[getset(get = "pub")]
    mods: Array2<Mod>,
    #[getset(get_copy = "pub")]
    tracks_remaining: u32,
    #[getset(get_copy = "pub")]
    semaphores_remaining: u32,
    #[getset(get_copy = "pub")]
    iterations: u64,
}

/// What a search produced.
#[derive(Clone, Debug)]
pub enum SolverResult {
    /// Every branch exhausted without a solution.
    Infeasible,
    /// The most economical placement found.
    Solved(Solution),
}

impl SolverResult {
    #[must_use]
    pub fn is_solved(&self) -> bool {
        matches!(self, SolverResult::Solved(_))
    }

    #[must_use]
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolverResult::Solved(solution) => Some(solution),
            SolverResult::Infeasible => None,
        }
    }
}

/// The solver core: a validated layout plus the search caches.
#[derive(Debug)]
pub struct Solver {
    layout: Layout,
    order: SearchOrder,
    visited: Visited,
    best: Option<(Array2<Track>, Array2<Mod>)>,
    best_tracks: i32,
    best_semaphores: i32,
    iterations: u64,
}

impl Solver {
    /// Validate `puzzle` and prepare a depth-first solver.
    ///
    /// # Errors
    /// [`PuzzleError`] when the input record violates its contract.
    pub fn new(puzzle: &Puzzle) -> Result<Self, PuzzleError> {
        Self::with_order(puzzle, SearchOrder::default())
    }

    /// Validate `puzzle` and prepare a solver with an explicit search order.
    ///
    /// # Errors
    /// [`PuzzleError`] when the input record violates its contract.
    pub fn with_order(puzzle: &Puzzle, order: SearchOrder) -> Result<Self, PuzzleError> {
        Ok(Self {
            layout: Layout::new(puzzle)?,
            order,
            visited: Visited::new(),
            best: None,
            best_tracks: -1,
            best_semaphores: -1,
            iterations: 0,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The search root.
    #[must_use]
    pub fn initial_state(&self) -> State {
        State::initial(&self.layout)
    }

    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Expand a state into its successor states.
    ///
    /// Exposed for testing the generator in isolation. A pruned or solved
    /// state yields no successors; a solution found here still registers as
    /// the solver's best.
    ///
    /// # Errors
    /// Internal invariant violations only; never a property of the input.
    pub fn expand(&mut self, state: &State) -> Result<Vec<State>> {
        let verdict = expand_tick(
            &self.layout,
            &mut self.visited,
            self.best_tracks,
            &mut self.iterations,
            state,
        )?;
        match verdict {
            Verdict::Pruned => Ok(Vec::new()),
            Verdict::Solved {
                tracks_remaining,
                semaphores_remaining,
                board,
                mods,
            } => {
                self.record(tracks_remaining, semaphores_remaining, board, mods);
                Ok(Vec::new())
            }
            Verdict::Expanded(successors) => Ok(successors),
        }
    }

    /// Run the search to completion.
    ///
    /// # Errors
    /// Internal invariant violations only; an unsolvable puzzle is the
    /// [`SolverResult::Infeasible`] value, not an error.
    pub fn solve(&mut self) -> Result<SolverResult> {
        // a non-decoy aimed off the board can never be saved
        let doomed = self
            .layout
            .cars()
            .iter()
            .any(|car| !car.is_decoy() && !car.pos_ahead().in_bounds(self.layout.dims()));
        if !doomed {
            let initial = self.initial_state();
            match self.order {
                SearchOrder::Dfs => self.run_dfs(initial)?,
                SearchOrder::Bfs => self.run_bfs(initial)?,
            }
        }
        Ok(self.take_result())
    }

    fn run_dfs(&mut self, initial: State) -> Result<()> {
        let mut stack = vec![initial];
        while let Some(state) = stack.pop() {
            if state.available_tracks() <= self.best_tracks {
                continue;
            }
            match expand_tick(
                &self.layout,
                &mut self.visited,
                self.best_tracks,
                &mut self.iterations,
                &state,
            )? {
                Verdict::Pruned => {}
                Verdict::Solved {
                    tracks_remaining,
                    semaphores_remaining,
                    board,
                    mods,
                } => self.record(tracks_remaining, semaphores_remaining, board, mods),
                Verdict::Expanded(successors) => stack.extend(successors.into_iter().rev()),
            }
        }
        Ok(())
    }

    fn run_bfs(&mut self, initial: State) -> Result<()> {
        let top = self.layout.max_tracks() as usize;
        let mut buckets: Vec<VecDeque<State>> = (0..=top).map(|_| VecDeque::new()).collect();
        buckets[initial.available_tracks() as usize].push_back(initial);

        for bucket in (0..=top).rev() {
            while let Some(state) = buckets[bucket].pop_front() {
                if state.available_tracks() <= self.best_tracks {
                    continue;
                }
                match expand_tick(
                    &self.layout,
                    &mut self.visited,
                    self.best_tracks,
                    &mut self.iterations,
                    &state,
                )? {
                    Verdict::Pruned => {}
                    Verdict::Solved {
                        tracks_remaining,
                        semaphores_remaining,
                        board,
                        mods,
                    } => {
                        // within a bucket the first solution is the cheapest
                        self.record(tracks_remaining, semaphores_remaining, board, mods);
                        return Ok(());
                    }
                    Verdict::Expanded(successors) => {
                        for successor in successors {
                            let slot = successor.available_tracks();
                            if slot >= 0 {
                                buckets[slot as usize].push_back(successor);
                            }
                        }
                    }
                }
            }
            trace!(bucket, "budget bucket drained");
        }
        Ok(())
    }

    fn record(
        &mut self,
        tracks_remaining: i32,
        semaphores_remaining: i32,
        board: Array2<Track>,
        mods: Array2<Mod>,
    ) {
        debug!(tracks_remaining, semaphores_remaining, "new minimum solution");
        self.best_tracks = tracks_remaining;
        self.best_semaphores = semaphores_remaining;
        self.best = Some((board, mods));
    }

    fn take_result(&mut self) -> SolverResult {
        let Some((mut board, mods)) = self.best.take() else {
            return SolverResult::Infeasible;
        };
        // switch-rails and swapping tracks may have flipped permanent cells
        // mid-run; the solution shows the puzzle's own pieces
        for ((row, col), &permanent) in self.layout.permanent().indexed_iter() {
            if permanent {
                board[(row, col)] = self.layout.tracks()[(row, col)];
            }
        }
        SolverResult::Solved(Solution {
            board,
            mods,
            tracks_remaining: self.best_tracks.max(0) as u32,
            semaphores_remaining: self.best_semaphores.max(0) as u32,
            iterations: self.iterations,
        })
    }
}

/// Solve a puzzle with the default depth-first order.
///
/// # Errors
/// A typed [`PuzzleError`] for malformed input, otherwise only internal
/// invariant violations.
pub fn solve(puzzle: &Puzzle) -> Result<SolverResult> {
    let mut solver = Solver::new(puzzle)?;
    solver.solve()
}

#[cfg(test)]
mod end_to_end {
    use super::{solve, SearchOrder, Solver, SolverResult};
    use crate::car::CarKind;
    use crate::puzzle::{CarSpec, Puzzle};
    use crate::state::State;
    use crate::tile::{Direction, Track};
    use anyhow::Result;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const START: u8 = 10;

    fn solved_tracks(result: &SolverResult) -> u32 {
        result
            .solution()
            .map(super::Solution::tracks_remaining)
            .expect("expected a solution")
    }

    #[test]
    fn bends_down_a_column_and_along_a_row() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![2, 0, 0], vec![0, 0, 0], vec![0, 0, 21]],
            vec![vec![START, 0, 0], vec![0; 3], vec![0; 3]],
            vec![vec![0; 3]; 3],
            vec![CarSpec::new(0, 0, Direction::Down, 0, CarKind::Normal)],
            3,
            0,
        );
        let result = solve(&puzzle)?;
        assert_eq!(solved_tracks(&result), 0);
        let solution = result.solution().unwrap();
        assert_eq!(solution.board()[(1, 0)], Track::Vertical);
        assert_eq!(solution.board()[(2, 0)], Track::TopRightTurn);
        assert_eq!(solution.board()[(2, 1)], Track::Horizontal);
        assert!(solution.iterations() > 0);
        Ok(())
    }

    #[test]
    fn fills_a_corridor_with_straights() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![0, 0, 0, 0, 21]],
            vec![vec![START, 0, 0, 0, 0]],
            vec![vec![0; 5]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
            4,
            0,
        );
        let result = solve(&puzzle)?;
        // three interior cells to fill, one track left over
        assert_eq!(solved_tracks(&result), 1);
        let solution = result.solution().unwrap();
        for col in 1..=3 {
            assert_eq!(solution.board()[(0, col)], Track::Horizontal);
        }
        Ok(())
    }

    #[test]
    fn two_carts_with_too_few_tracks_are_infeasible() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 21],
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
            ],
            vec![
                vec![START, 0, 0, 0, 0],
                vec![0; 5],
                vec![0; 5],
                vec![0; 5],
                vec![0, 0, 0, 0, START],
            ],
            vec![vec![0; 5]; 5],
            vec![
                CarSpec::new(0, 0, Direction::Down, 0, CarKind::Normal),
                CarSpec::new(4, 4, Direction::Up, 1, CarKind::Normal),
            ],
            6,
            0,
        );
        assert!(!solve(&puzzle)?.is_solved());
        Ok(())
    }

    fn decoy_puzzle() -> Puzzle {
        // the decoy's fixed run ends at the border two ticks after the
        // normal cart reaches its depot
        Puzzle::new(
            vec![vec![0, 0, 21, 0], vec![0, 1, 1, 1]],
            vec![vec![START, 0, 0, 0], vec![START, 0, 0, 0]],
            vec![vec![0; 4]; 2],
            vec![
                CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal),
                CarSpec::new(1, 0, Direction::Right, 0, CarKind::Decoy),
            ],
            1,
            0,
        )
    }

    #[test]
    fn decoys_survive_the_grace_period_then_crash() -> Result<()> {
        let result = solve(&decoy_puzzle())?;
        assert_eq!(solved_tracks(&result), 0);
        let solution = result.solution().unwrap();
        assert_eq!(solution.board()[(0, 1)], Track::Horizontal);
        Ok(())
    }

    #[test]
    fn switch_gate_run_spends_no_tracks() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![0, 1, 1, 1, 21]],
            vec![vec![START, 1, 3, 0, 0]],
            vec![vec![0, 1, 1, 0, 0]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
            0,
            0,
        );
        let result = solve(&puzzle)?;
        assert_eq!(solved_tracks(&result), 0);
        Ok(())
    }

    #[test]
    fn tunnel_pair_carries_the_cart_through() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![1, 16, 17, 21]],
            vec![vec![START, 2, 2, 0]],
            vec![vec![0, 1, 1, 0]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
            0,
            0,
        );
        let result = solve(&puzzle)?;
        assert_eq!(solved_tracks(&result), 0);
        Ok(())
    }

    #[test]
    fn numeral_carts_collect_their_post_office() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![0, 0, 1, 25]],
            vec![vec![START, 0, 11, 0]],
            vec![vec![0, 0, 1, 0]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Numeral)],
            1,
            0,
        );
        let result = solve(&puzzle)?;
        assert_eq!(solved_tracks(&result), 0);
        Ok(())
    }

    #[test]
    fn arrival_order_is_enforced() -> Result<()> {
        // the second cart sits closer to the shared depot and would arrive
        // first, which no placement can repair
        let puzzle = Puzzle::new(
            vec![vec![0, 0, 0, 0, 21]],
            vec![vec![START, 0, START, 0, 0]],
            vec![vec![0; 5]],
            vec![
                CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal),
                CarSpec::new(0, 2, Direction::Right, 1, CarKind::Normal),
            ],
            3,
            0,
        );
        assert!(!solve(&puzzle)?.is_solved());
        Ok(())
    }

    #[test]
    fn both_orders_agree_on_the_economical_solution() -> Result<()> {
        for puzzle in [
            decoy_puzzle(),
            Puzzle::new(
                vec![vec![2, 0, 0], vec![0, 0, 0], vec![0, 0, 21]],
                vec![vec![START, 0, 0], vec![0; 3], vec![0; 3]],
                vec![vec![0; 3]; 3],
                vec![CarSpec::new(0, 0, Direction::Down, 0, CarKind::Normal)],
                3,
                0,
            ),
        ] {
            let mut dfs = Solver::with_order(&puzzle, SearchOrder::Dfs)?;
            let mut bfs = Solver::with_order(&puzzle, SearchOrder::Bfs)?;
            let a = dfs.solve()?;
            let b = bfs.solve()?;
            assert_eq!(solved_tracks(&a), solved_tracks(&b));
        }
        Ok(())
    }

    #[test]
    fn initial_border_crash_is_infeasible() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![vec![0, 0, 21]],
            vec![vec![START, 0, 0]],
            vec![vec![0; 3]],
            vec![CarSpec::new(0, 0, Direction::Left, 0, CarKind::Normal)],
            3,
            0,
        );
        assert!(!solve(&puzzle)?.is_solved());
        Ok(())
    }

    #[test]
    fn random_walk_preserves_the_board_invariants() -> Result<()> {
        let puzzle = Puzzle::new(
            vec![
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 21],
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
            ],
            vec![
                vec![START, 0, 0, 0, 0],
                vec![0; 5],
                vec![0; 5],
                vec![0; 5],
                vec![START, 0, 0, 0, 0],
            ],
            vec![vec![0; 5]; 5],
            vec![
                CarSpec::new(0, 0, Direction::Down, 0, CarKind::Normal),
                CarSpec::new(4, 0, Direction::Up, 1, CarKind::Normal),
            ],
            8,
            0,
        );
        let mut solver = Solver::new(&puzzle)?;
        let layout = solver.layout().clone();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = solver.initial_state();
        for _ in 0..32 {
            let previous = state.clone();
            let successors = solver.expand(&state)?;
            if successors.is_empty() {
                break;
            }
            state = successors[rng.gen_range(0..successors.len())].clone();
            check_invariants(&layout, &previous, &state);
        }
        Ok(())
    }

    fn check_invariants(layout: &crate::puzzle::Layout, parent: &State, state: &State) {
        // permanent cells never change outside of swap transitions
        for ((row, col), &permanent) in layout.permanent().indexed_iter() {
            let swappable = matches!(
                layout.mods()[(row, col)],
                crate::tile::Mod::SwappingTrack | crate::tile::Mod::SwitchRail
            );
            if permanent && !swappable {
                assert_eq!(state.tracks()[(row, col)], layout.tracks()[(row, col)]);
            }
        }
        // the budget accounts for every placed piece
        let placed = state
            .tracks()
            .iter()
            .zip(layout.tracks().iter())
            .filter(|(now, init)| init.is_empty() && !now.is_empty())
            .count() as i32;
        assert_eq!(
            placed + state.available_tracks(),
            layout.max_tracks() as i32
        );
        // no two live carts share a cell
        let mut seen = std::collections::HashSet::new();
        for car in state.cars() {
            assert!(seen.insert(car.pos()), "two carts at {}", car.pos());
        }
        // heat never decreases
        assert!(state
            .heat()
            .iter()
            .zip(parent.heat().iter())
            .all(|(now, before)| now >= before));
        // solved ordinals never un-solve
        assert!(state.solved()[0].len() >= parent.solved()[0].len());
        assert!(state.solved()[0].starts_with(&parent.solved()[0]));
    }
}
