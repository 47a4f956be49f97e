// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Puzzle input record, validation, and the immutable per-puzzle layout.
//!
//! Loaders hand the core a [`Puzzle`]: three integer grids, a cart list, and
//! the two budgets. [`Layout::new`] validates it and precomputes everything
//! the search consults but never mutates: decoded grids, the permanent-cell
//! mask, tunnel pairings, and the gate/swap/station group tables.

use crate::car::{Car, CarCounts, CarKind, Pos};
use crate::tile::{Direction, Mod, Track};
use getset::{CopyGetters, Getters};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

/// Highest group number a grouped mod may carry.
pub const MAX_GROUP: u8 = 4;

/// Construction errors raised before the search begins.
#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("board must have at least one row and one column")]
    EmptyBoard,
    #[error("{grid} row {row} has {got} cells, expected {want}")]
    RaggedGrid {
        grid: &'static str,
        row: usize,
        got: usize,
        want: usize,
    },
    #[error("{grid} grid is {got_h}x{got_w}, board is {want_h}x{want_w}")]
    ShapeMismatch {
        grid: &'static str,
        got_h: usize,
        got_w: usize,
        want_h: usize,
        want_w: usize,
    },
    #[error("unknown track kind {value} at ({row}, {col})")]
    UnknownTrack { value: u8, row: usize, col: usize },
    #[error("unknown mod kind {value} at ({row}, {col})")]
    UnknownMod { value: u8, row: usize, col: usize },
    #[error("group number {value} at ({row}, {col}) is above 4")]
    UnknownGroup { value: u8, row: usize, col: usize },
    #[error("cart at ({row}, {col}) has unknown direction {value}")]
    UnknownDirection { value: u8, row: i32, col: i32 },
    #[error("grouped mod {m:?} at ({row}, {col}) has group 0")]
    MissingGroup { m: Mod, row: usize, col: usize },
    #[error("cart {num} starts out of bounds at ({row}, {col})")]
    CarOutOfBounds { num: u8, row: i32, col: i32 },
    #[error("cart {num} has kind CRASHED, which is not a puzzle input kind")]
    CrashedCarInput { num: u8 },
    #[error("{kind:?} ordinals are not dense from 0: found {nums:?}")]
    BadOrdinals { kind: CarKind, nums: Vec<u8> },
    #[error("cart {num} starting cell ({row}, {col}) is not marked STARTING_CAR_TILE")]
    UnmarkedStart { num: u8, row: i32, col: i32 },
    #[error("tunnel group {group} has {count} openings, expected exactly 2")]
    TunnelPairing { group: u8, count: usize },
    #[error("gate group {group} has no controlling switch")]
    GateWithoutSwitch { group: u8 },
    #[error("semaphore at ({row}, {col}) sits on {track:?}, not a straight or turn")]
    SemaphoreOffTrack {
        track: Track,
        row: usize,
        col: usize,
    },
}

/// One cart in the puzzle input.
///
/// The direction rides as its raw encoding (0..=3 per [`Direction`]) and is
/// decoded during validation, like the track and mod grids.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct CarSpec {
    row: i32,
    col: i32,
    dir: u8,
    #[serde(rename = "ordinal")]
    num: u8,
    #[serde(rename = "type")]
    kind: CarKind,
}

impl CarSpec {
    #[must_use]
    pub fn new(row: i32, col: i32, dir: Direction, num: u8, kind: CarKind) -> Self {
        Self {
            row,
            col,
            dir: u8::from(dir),
            num,
            kind,
        }
    }
}

/// The puzzle input record consumed by the core.
///
/// Grids are row-major `H x W`; `board` holds track kinds (0..=33), `mods`
/// mod kinds (0..=11), and `mod_nums` group numbers (0..=4).
#[derive(Clone, Debug, Deserialize, Serialize, Getters, CopyGetters)]
pub struct Puzzle {
    #[getset(get = "pub")]
    board: Vec<Vec<u8>>,
    #[getset(get = "pub")]
    mods: Vec<Vec<u8>>,
    #[getset(get = "pub")]
    mod_nums: Vec<Vec<u8>>,
    #[getset(get = "pub")]
    cars: Vec<CarSpec>,
    #[getset(get_copy = "pub")]
    max_tracks: u32,
    #[getset(get_copy = "pub")]
    #[serde(default)]
    max_semaphores: u32,
}

impl Puzzle {
    #[must_use]
    pub fn new(
        board: Vec<Vec<u8>>,
        mods: Vec<Vec<u8>>,
        mod_nums: Vec<Vec<u8>>,
        cars: Vec<CarSpec>,
        max_tracks: u32,
        max_semaphores: u32,
    ) -> Self {
        Self {
            board,
            mods,
            mod_nums,
            cars,
            max_tracks,
            max_semaphores,
        }
    }
}

/// Immutable, validated view of a puzzle.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct Layout {
    #[getset(get_copy = "pub")]
    dims: (usize, usize),
    /// Initial track grid.
    #[getset(get = "pub")]
    tracks: Array2<Track>,
    /// Initial mod grid.
    #[getset(get = "pub")]
    mods: Array2<Mod>,
    /// Group numbers, 0 where a cell has none.
    #[getset(get = "pub")]
    groups: Array2<u8>,
    /// Cells whose track came with the puzzle and may never be erased.
    #[getset(get = "pub")]
    permanent: Array2<bool>,
    /// Carts in simulation order: normals, decoys, numerals, each by ordinal.
    #[getset(get = "pub")]
    cars: Vec<Car>,
    #[getset(get_copy = "pub")]
    counts: CarCounts,
    /// Starting position per global cart slot.
    #[getset(get = "pub")]
    starts: Vec<Pos>,
    tunnels: [Vec<Pos>; MAX_GROUP as usize + 1],
    gates: [Vec<Pos>; MAX_GROUP as usize + 1],
    swaps: [Vec<Pos>; MAX_GROUP as usize + 1],
    stations: [Vec<Pos>; MAX_GROUP as usize + 1],
    post_offices: [Vec<Pos>; MAX_GROUP as usize + 1],
    #[getset(get_copy = "pub")]
    max_tracks: u32,
    #[getset(get_copy = "pub")]
    max_semaphores: u32,
}

impl Layout {
    /// Validate a puzzle record and precompute the static tables.
    ///
    /// # Errors
    /// Any violation of the input contract yields the matching
    /// [`PuzzleError`] before any search state is built.
    pub fn new(puzzle: &Puzzle) -> Result<Self, PuzzleError> {
        let (h, w) = grid_dims(puzzle.board()).ok_or(PuzzleError::EmptyBoard)?;
        check_rect("board", puzzle.board(), w)?;
        check_shape("mods", puzzle.mods(), h, w)?;
        check_shape("mod_nums", puzzle.mod_nums(), h, w)?;

        let tracks = decode_grid(puzzle.board(), h, w, |value, row, col| {
            Track::try_from(value).map_err(|_| PuzzleError::UnknownTrack { value, row, col })
        })?;
        let mods = decode_grid(puzzle.mods(), h, w, |value, row, col| {
            Mod::try_from(value).map_err(|_| PuzzleError::UnknownMod { value, row, col })
        })?;
        let groups = decode_grid(puzzle.mod_nums(), h, w, |value, row, col| {
            if value > MAX_GROUP {
                Err(PuzzleError::UnknownGroup { value, row, col })
            } else {
                Ok(value)
            }
        })?;

        let permanent = tracks.mapv(|t| !t.is_empty());
        let (cars, counts) = order_cars(puzzle.cars(), (h, w))?;
        let starts: Vec<Pos> = cars.iter().map(Car::pos).collect();
        for car in &cars {
            if mods[car.pos().index()] != Mod::StartingCarTile {
                return Err(PuzzleError::UnmarkedStart {
                    num: car.num(),
                    row: car.pos().row,
                    col: car.pos().col,
                });
            }
        }

        let mut tunnels: [Vec<Pos>; 5] = Default::default();
        let mut gates: [Vec<Pos>; 5] = Default::default();
        let mut swaps: [Vec<Pos>; 5] = Default::default();
        let mut stations: [Vec<Pos>; 5] = Default::default();
        let mut post_offices: [Vec<Pos>; 5] = Default::default();
        let mut switch_groups = [false; 5];

        for ((row, col), &m) in mods.indexed_iter() {
            let group = groups[(row, col)];
            let pos = Pos::new(row as i32, col as i32);
            let grouped = matches!(
                m,
                Mod::Switch
                    | Mod::Tunnel
                    | Mod::ClosedGate
                    | Mod::OpenGate
                    | Mod::SwappingTrack
                    | Mod::Station
                    | Mod::PostOffice
            );
            if grouped && group == 0 {
                return Err(PuzzleError::MissingGroup { m, row, col });
            }
            match m {
                Mod::Switch => switch_groups[group as usize] = true,
                Mod::Tunnel => tunnels[group as usize].push(pos),
                Mod::ClosedGate | Mod::OpenGate => gates[group as usize].push(pos),
                Mod::SwappingTrack => swaps[group as usize].push(pos),
                Mod::Station => stations[group as usize].push(pos),
                Mod::PostOffice => post_offices[group as usize].push(pos),
                Mod::Semaphore => {
                    let track = tracks[(row, col)];
                    if !track.is_straight() && !track.is_turn() {
                        return Err(PuzzleError::SemaphoreOffTrack { track, row, col });
                    }
                }
                _ => {}
            }
        }

        for group in 1..=MAX_GROUP {
            let count = tunnels[group as usize].len();
            if count != 0 && count != 2 {
                return Err(PuzzleError::TunnelPairing { group, count });
            }
            if !gates[group as usize].is_empty() && !switch_groups[group as usize] {
                return Err(PuzzleError::GateWithoutSwitch { group });
            }
        }

        Ok(Self {
            dims: (h, w),
            tracks,
            mods,
            groups,
            permanent,
            cars,
            counts,
            starts,
            tunnels,
            gates,
            swaps,
            stations,
            post_offices,
            max_tracks: puzzle.max_tracks(),
            max_semaphores: puzzle.max_semaphores(),
        })
    }

    /// Gate cells controlled by a switch group.
    #[must_use]
    pub fn gates(&self, group: u8) -> &[Pos] {
        &self.gates[group as usize]
    }

    /// Swapping-track cells controlled by a switch group.
    #[must_use]
    pub fn swaps(&self, group: u8) -> &[Pos] {
        &self.swaps[group as usize]
    }

    /// Stations of a group (normal carts) or post offices (numeral carts).
    #[must_use]
    pub fn stations_for(&self, kind: CarKind, group: u8) -> &[Pos] {
        match kind {
            CarKind::Numeral => &self.post_offices[group as usize],
            _ => &self.stations[group as usize],
        }
    }

    /// The other opening of the tunnel pair containing `pos`.
    #[must_use]
    pub fn paired_tunnel(&self, group: u8, pos: Pos) -> Option<Pos> {
        let pair = &self.tunnels[group as usize];
        match pair.as_slice() {
            [a, b] if *a == pos => Some(*b),
            [a, b] if *b == pos => Some(*a),
            _ => None,
        }
    }

    /// Whether the cell held a track in the puzzle description.
    #[must_use]
    pub fn is_permanent(&self, pos: Pos) -> bool {
        self.permanent[pos.index()]
    }
}

fn grid_dims(grid: &[Vec<u8>]) -> Option<(usize, usize)> {
    let h = grid.len();
    let w = grid.first()?.len();
    if w == 0 {
        return None;
    }
    Some((h, w))
}

fn check_rect(name: &'static str, grid: &[Vec<u8>], want: usize) -> Result<(), PuzzleError> {
    for (row, cells) in grid.iter().enumerate() {
        if cells.len() != want {
            return Err(PuzzleError::RaggedGrid {
                grid: name,
                row,
                got: cells.len(),
                want,
            });
        }
    }
    Ok(())
}

fn check_shape(
    name: &'static str,
    grid: &[Vec<u8>],
    want_h: usize,
    want_w: usize,
) -> Result<(), PuzzleError> {
    let (got_h, got_w) = grid_dims(grid).unwrap_or((grid.len(), 0));
    if got_h != want_h || got_w != want_w {
        return Err(PuzzleError::ShapeMismatch {
            grid: name,
            got_h,
            got_w,
            want_h,
            want_w,
        });
    }
    check_rect(name, grid, want_w)
}

fn decode_grid<T: Clone + Default>(
    grid: &[Vec<u8>],
    h: usize,
    w: usize,
    decode: impl Fn(u8, usize, usize) -> Result<T, PuzzleError>,
) -> Result<Array2<T>, PuzzleError> {
    let mut out = Array2::default((h, w));
    for (row, cells) in grid.iter().enumerate() {
        for (col, &value) in cells.iter().enumerate() {
            out[(row, col)] = decode(value, row, col)?;
        }
    }
    Ok(out)
}

fn order_cars(specs: &[CarSpec], dims: (usize, usize)) -> Result<(Vec<Car>, CarCounts), PuzzleError> {
    let mut by_kind: [Vec<Car>; 3] = Default::default();
    for spec in specs {
        let bucket = match spec.kind() {
            CarKind::Normal => 0,
            CarKind::Decoy => 1,
            CarKind::Numeral => 2,
            CarKind::Crashed => {
                return Err(PuzzleError::CrashedCarInput { num: spec.num() });
            }
        };
        let pos = Pos::new(spec.row(), spec.col());
        if !pos.in_bounds(dims) {
            return Err(PuzzleError::CarOutOfBounds {
                num: spec.num(),
                row: pos.row,
                col: pos.col,
            });
        }
        let dir = Direction::try_from(spec.dir()).map_err(|_| PuzzleError::UnknownDirection {
            value: spec.dir(),
            row: pos.row,
            col: pos.col,
        })?;
        by_kind[bucket].push(Car::new(pos, dir, spec.num(), spec.kind()));
    }

    for (bucket, kind) in [CarKind::Normal, CarKind::Decoy, CarKind::Numeral]
        .into_iter()
        .enumerate()
    {
        let cars = &mut by_kind[bucket];
        cars.sort_by_key(Car::num);
        let dense = cars.iter().enumerate().all(|(i, c)| c.num() as usize == i);
        if !dense {
            return Err(PuzzleError::BadOrdinals {
                kind,
                nums: cars.iter().map(Car::num).collect(),
            });
        }
    }

    let counts = CarCounts::new(by_kind[0].len(), by_kind[1].len(), by_kind[2].len());
    let cars = by_kind.into_iter().flatten().collect();
    Ok((cars, counts))
}
