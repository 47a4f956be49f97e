// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Cart records and board positions.

use crate::tile::{Direction, Mod};
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A board coordinate in `(row, col)` form.
///
/// Signed so that one step past the border is representable; everything that
/// indexes a grid checks [`Pos::in_bounds`] first.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Pos {
    /// Row, top to bottom.
    pub row: i32,
    /// Column, left to right.
    pub col: i32,
}

impl Pos {
    #[must_use]
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// One step in `dir`.
    #[must_use]
    pub fn step(self, dir: Direction) -> Self {
        let (dr, dc) = dir.vector();
        Self {
            row: self.row + dr,
            col: self.col + dc,
        }
    }

    #[must_use]
    pub fn in_bounds(self, dims: (usize, usize)) -> bool {
        0 <= self.row && (self.row as usize) < dims.0 && 0 <= self.col && (self.col as usize) < dims.1
    }

    /// Index pair for grid lookups. Callers check bounds first.
    #[must_use]
    pub fn index(self) -> (usize, usize) {
        (self.row as usize, self.col as usize)
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Pos) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Pos) -> Ordering {
        self.row.cmp(&other.row).then(self.col.cmp(&other.col))
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// What kind of cart a record describes.
///
/// `Crashed` only ever arises during simulation (a decoy that hit something);
/// puzzle inputs may not contain it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CarKind {
    Normal,
    Decoy,
    Numeral,
    Crashed,
}

/// How many carts of each kind a puzzle has; fixes the global slot layout of
/// the heat tensors and the per-cart flag vectors.
#[derive(Clone, Copy, Debug, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct CarCounts {
    normals: usize,
    decoys: usize,
    numerals: usize,
}

impl CarCounts {
    #[must_use]
    pub fn new(normals: usize, decoys: usize, numerals: usize) -> Self {
        Self {
            normals,
            decoys,
            numerals,
        }
    }

    #[must_use]
    pub fn total(self) -> usize {
        self.normals + self.decoys + self.numerals
    }
}

/// A cart: position, facing, ordinal within its kind, and kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Car {
    pos: Pos,
    dir: Direction,
    num: u8,
    kind: CarKind,
}

impl Car {
    #[must_use]
    pub fn new(pos: Pos, dir: Direction, num: u8, kind: CarKind) -> Self {
        Self {
            pos,
            dir,
            num,
            kind,
        }
    }

    /// The cell this cart is about to enter.
    #[must_use]
    pub fn pos_ahead(&self) -> Pos {
        self.pos.step(self.dir)
    }

    /// The same cart after moving to `pos` facing `dir`.
    #[must_use]
    pub fn moved(self, pos: Pos, dir: Direction) -> Self {
        Self { pos, dir, ..self }
    }

    /// The same cart, frozen where it stands.
    #[must_use]
    pub fn crashed(self) -> Self {
        Self {
            kind: CarKind::Crashed,
            ..self
        }
    }

    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.kind == CarKind::Normal
    }

    #[must_use]
    pub fn is_decoy(&self) -> bool {
        self.kind == CarKind::Decoy
    }

    #[must_use]
    pub fn is_numeral(&self) -> bool {
        self.kind == CarKind::Numeral
    }

    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.kind == CarKind::Crashed
    }

    /// Global slot in the heat tensors and flag vectors: normals first by
    /// ordinal, then decoys, then numerals. A crashed cart keeps the decoy
    /// slot it crashed from.
    #[must_use]
    pub fn slot(&self, counts: CarCounts) -> usize {
        let num = self.num as usize;
        match self.kind {
            CarKind::Normal => num,
            CarKind::Decoy | CarKind::Crashed => counts.normals() + num,
            CarKind::Numeral => counts.normals() + counts.decoys() + num,
        }
    }

    /// Whether this cart stands on its own destination mod: a station for a
    /// normal cart or a post office for a numeral cart, with the matching
    /// group number (`ordinal + 1`).
    #[must_use]
    pub fn on_own_station(&self, m: Mod, group: u8) -> bool {
        let wanted = match self.kind {
            CarKind::Normal => Mod::Station,
            CarKind::Numeral => Mod::PostOffice,
            CarKind::Decoy | CarKind::Crashed => return false,
        };
        m == wanted && group == self.num + 1
    }

    /// Stable ordering key for state fingerprints: kind first, ordinal second.
    #[must_use]
    pub fn sort_key(&self) -> (u8, u8) {
        let tag = match self.kind {
            CarKind::Normal => 0,
            CarKind::Decoy => 1,
            CarKind::Numeral => 2,
            CarKind::Crashed => 3,
        };
        (tag, self.num)
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} at {} facing {}",
            self.kind, self.num, self.pos, self.dir
        )
    }
}

#[cfg(test)]
mod carts {
    use super::{Car, CarCounts, CarKind, Pos};
    use crate::tile::{Direction, Mod};

    #[test]
    fn stepping_and_bounds() {
        let p = Pos::new(0, 0);
        assert_eq!(p.step(Direction::Right), Pos::new(0, 1));
        assert_eq!(p.step(Direction::Up), Pos::new(-1, 0));
        assert!(p.in_bounds((1, 1)));
        assert!(!p.step(Direction::Up).in_bounds((3, 3)));
        assert!(!Pos::new(0, 3).in_bounds((3, 3)));
    }

    #[test]
    fn slots_partition_by_kind() {
        let counts = CarCounts::new(2, 1, 1);
        let normal = Car::new(Pos::new(0, 0), Direction::Right, 1, CarKind::Normal);
        let decoy = Car::new(Pos::new(1, 0), Direction::Right, 0, CarKind::Decoy);
        let numeral = Car::new(Pos::new(2, 0), Direction::Right, 0, CarKind::Numeral);
        assert_eq!(normal.slot(counts), 1);
        assert_eq!(decoy.slot(counts), 2);
        assert_eq!(decoy.crashed().slot(counts), 2);
        assert_eq!(numeral.slot(counts), 3);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn station_matching_uses_the_own_group() {
        let car = Car::new(Pos::new(0, 0), Direction::Right, 1, CarKind::Normal);
        assert!(car.on_own_station(Mod::Station, 2));
        assert!(!car.on_own_station(Mod::Station, 1));
        assert!(!car.on_own_station(Mod::PostOffice, 2));
        let ncar = Car::new(Pos::new(0, 0), Direction::Right, 0, CarKind::Numeral);
        assert!(ncar.on_own_station(Mod::PostOffice, 1));
    }

    #[test]
    fn fingerprint_order_is_kind_then_ordinal() {
        let a = Car::new(Pos::new(0, 0), Direction::Right, 1, CarKind::Normal);
        let b = Car::new(Pos::new(5, 5), Direction::Left, 0, CarKind::Decoy);
        assert!(a.sort_key() < b.sort_key());
        assert!(b.sort_key() < b.crashed().sort_key());
    }
}
