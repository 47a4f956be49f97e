// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Solver core for rail-grid cart puzzles.
//!
//! A puzzle is a rectangular grid of railway tiles, a budget of placeable
//! track pieces (and optionally semaphores), and a set of carts with starting
//! positions and facings. The solver synthesises a placement of extra pieces
//! so that, advancing the world one tick at a time, every cart reaches its
//! destination in order, decoy carts are free to crash, and numeral carts
//! reach their post offices, returning the placement that leaves the most
//! budget unspent.
//!
//! Level parsing, rendering, and any command-line surface live elsewhere;
//! this crate only consumes the [`Puzzle`] record and exposes the solver
//! entry points: [`solve`], [`simulate_tick`], and [`Solver::expand`].
//!
//! # Example
//! ```
//! # use anyhow::Result;
//! # use railgrid_solver::{solve, CarKind, CarSpec, Direction, Puzzle, SolverResult};
//! # fn main() -> Result<()> {
//! // a cart, one gap to bridge, and the depot
//! let puzzle = Puzzle::new(
//!     vec![vec![0, 0, 21]],
//!     vec![vec![10, 0, 0]],
//!     vec![vec![0, 0, 0]],
//!     vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
//!     2,
//!     0,
//! );
//! if let SolverResult::Solved(solution) = solve(&puzzle)? {
//!     assert_eq!(solution.tracks_remaining(), 1);
//! } else {
//!     panic!("expected a solution");
//! }
//! #   Ok(())
//! # }
//! ```

mod caches;
pub mod car;
pub mod constants;
mod generate;
pub mod puzzle;
pub mod search;
pub mod sim;
pub mod state;
pub mod tile;

pub use car::{Car, CarCounts, CarKind, Pos};
pub use puzzle::{CarSpec, Layout, Puzzle, PuzzleError};
pub use search::{solve, SearchOrder, Solution, Solver, SolverResult};
pub use sim::simulate_tick;
pub use state::State;
pub use tile::{Direction, Mod, Redirect, Track};
