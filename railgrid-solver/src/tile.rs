// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Track, mod, and direction enumerations plus the tile semantics tables.
//!
//! Every rule about how a cart interacts with a piece of track lives here:
//! which directions a track accepts, where it redirects, which pieces can be
//! laid in front of a cart, which 3-way a piece upgrades to, and how switch
//! effects mirror a piece.

use anyhow::{anyhow, Error};
use std::convert::TryFrom;
use std::fmt;

/// A cart facing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    /// Decreasing column
    Left,
    /// Increasing column
    Right,
    /// Increasing row
    Down,
    /// Decreasing row
    Up,
}

impl Direction {
    /// The opposite facing.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }

    /// Unit step in `(row, col)` coordinates.
    #[must_use]
    pub fn vector(self) -> (i32, i32) {
        match self {
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Up => (-1, 0),
        }
    }

    /// Axis index used by the heat tensors.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Up => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self {
            Direction::Left => '<',
            Direction::Right => '>',
            Direction::Down => 'v',
            Direction::Up => '^',
        };
        write!(f, "{ch}")
    }
}

impl From<Direction> for u8 {
    fn from(dir: Direction) -> u8 {
        dir.index() as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let dir = match value {
            0 => Direction::Left,
            1 => Direction::Right,
            2 => Direction::Down,
            3 => Direction::Up,
            _ => return Err(anyhow!("invalid direction: {value}")),
        };
        Ok(dir)
    }
}

/// Outcome of consulting the tile semantics table.
///
/// `Unknown` marks a non-crashing outcome the simulator resolves itself:
/// arrival at an ending track or entry into a tunnel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Redirect {
    /// The cart leaves the tile travelling in the given direction.
    Go(Direction),
    /// The cart cannot take the tile from this direction.
    Crash,
    /// Ending or tunnel; bookkeeping decides what happens.
    Unknown,
}

/// Track kind of a single board cell.
///
/// The `Sem*` variants are placeholders produced by the generator meaning
/// "this piece plus a semaphore will be placed here"; they never appear on a
/// board, only in candidate lists.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Track {
    #[default]
    Empty,
    Horizontal,
    Vertical,
    Roadblock,
    BottomRightTurn,
    BottomLeftTurn,
    TopRightTurn,
    TopLeftTurn,
    BottomRightLeft3Way,
    BottomRightTop3Way,
    BottomLeftRight3Way,
    BottomLeftTop3Way,
    TopRightLeft3Way,
    TopRightBottom3Way,
    TopLeftRight3Way,
    TopLeftBottom3Way,
    TunnelLeft,
    TunnelRight,
    TunnelDown,
    TunnelUp,
    CarEndingLeft,
    CarEndingRight,
    CarEndingDown,
    CarEndingUp,
    NumeralEndingLeft,
    NumeralEndingRight,
    NumeralEndingDown,
    NumeralEndingUp,
    SemHorizontal,
    SemVertical,
    SemBottomRightTurn,
    SemBottomLeftTurn,
    SemTopRightTurn,
    SemTopLeftTurn,
}

impl Track {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Track::Empty
    }

    #[must_use]
    pub fn is_straight(self) -> bool {
        matches!(self, Track::Horizontal | Track::Vertical)
    }

    #[must_use]
    pub fn is_turn(self) -> bool {
        matches!(
            self,
            Track::BottomRightTurn
                | Track::BottomLeftTurn
                | Track::TopRightTurn
                | Track::TopLeftTurn
        )
    }

    #[must_use]
    pub fn is_three_way(self) -> bool {
        matches!(
            self,
            Track::BottomRightLeft3Way
                | Track::BottomRightTop3Way
                | Track::BottomLeftRight3Way
                | Track::BottomLeftTop3Way
                | Track::TopRightLeft3Way
                | Track::TopRightBottom3Way
                | Track::TopLeftRight3Way
                | Track::TopLeftBottom3Way
        )
    }

    #[must_use]
    pub fn is_tunnel(self) -> bool {
        matches!(
            self,
            Track::TunnelLeft | Track::TunnelRight | Track::TunnelDown | Track::TunnelUp
        )
    }

    #[must_use]
    pub fn is_car_ending(self) -> bool {
        matches!(
            self,
            Track::CarEndingLeft
                | Track::CarEndingRight
                | Track::CarEndingDown
                | Track::CarEndingUp
        )
    }

    #[must_use]
    pub fn is_numeral_ending(self) -> bool {
        matches!(
            self,
            Track::NumeralEndingLeft
                | Track::NumeralEndingRight
                | Track::NumeralEndingDown
                | Track::NumeralEndingUp
        )
    }

    #[must_use]
    pub fn is_placeholder_semaphore(self) -> bool {
        matches!(
            self,
            Track::SemHorizontal
                | Track::SemVertical
                | Track::SemBottomRightTurn
                | Track::SemBottomLeftTurn
                | Track::SemTopRightTurn
                | Track::SemTopLeftTurn
        )
    }

    /// Where a cart entering this tile while travelling `dir` goes next.
    #[must_use]
    pub fn redirect(self, dir: Direction) -> Redirect {
        use Direction::{Down, Left, Right, Up};
        use Redirect::{Crash, Go};

        match self {
            Track::Empty | Track::Roadblock => Crash,
            Track::Horizontal => match dir {
                Left => Go(Left),
                Right => Go(Right),
                Down | Up => Crash,
            },
            Track::Vertical => match dir {
                Down => Go(Down),
                Up => Go(Up),
                Left | Right => Crash,
            },
            Track::BottomRightTurn => match dir {
                Left => Go(Down),
                Up => Go(Right),
                Right | Down => Crash,
            },
            Track::BottomLeftTurn => match dir {
                Right => Go(Down),
                Up => Go(Left),
                Left | Down => Crash,
            },
            Track::TopRightTurn => match dir {
                Left => Go(Up),
                Down => Go(Right),
                Right | Up => Crash,
            },
            Track::TopLeftTurn => match dir {
                Right => Go(Up),
                Down => Go(Left),
                Left | Up => Crash,
            },
            Track::BottomRightLeft3Way => match dir {
                Left => Go(Down),
                Right => Go(Right),
                Up => Go(Right),
                Down => Crash,
            },
            Track::BottomRightTop3Way => match dir {
                Left => Go(Down),
                Down => Go(Down),
                Up => Go(Right),
                Right => Crash,
            },
            Track::BottomLeftRight3Way => match dir {
                Left => Go(Left),
                Right => Go(Down),
                Up => Go(Left),
                Down => Crash,
            },
            Track::BottomLeftTop3Way => match dir {
                Right => Go(Down),
                Down => Go(Down),
                Up => Go(Left),
                Left => Crash,
            },
            Track::TopRightLeft3Way => match dir {
                Left => Go(Up),
                Right => Go(Right),
                Down => Go(Right),
                Up => Crash,
            },
            Track::TopRightBottom3Way => match dir {
                Left => Go(Up),
                Down => Go(Right),
                Up => Go(Up),
                Right => Crash,
            },
            Track::TopLeftRight3Way => match dir {
                Left => Go(Left),
                Right => Go(Up),
                Down => Go(Left),
                Up => Crash,
            },
            Track::TopLeftBottom3Way => match dir {
                Right => Go(Up),
                Down => Go(Left),
                Up => Go(Up),
                Left => Crash,
            },
            // A tunnel mouth accepts the reverse of its facing.
            Track::TunnelLeft => accepts_only(dir, Right),
            Track::TunnelRight => accepts_only(dir, Left),
            Track::TunnelDown => accepts_only(dir, Up),
            Track::TunnelUp => accepts_only(dir, Down),
            Track::CarEndingLeft | Track::NumeralEndingLeft => accepts_only(dir, Left),
            Track::CarEndingRight | Track::NumeralEndingRight => accepts_only(dir, Right),
            Track::CarEndingDown | Track::NumeralEndingDown => accepts_only(dir, Down),
            Track::CarEndingUp | Track::NumeralEndingUp => accepts_only(dir, Up),
            Track::SemHorizontal
            | Track::SemVertical
            | Track::SemBottomRightTurn
            | Track::SemBottomLeftTurn
            | Track::SemTopRightTurn
            | Track::SemTopLeftTurn => self.without_semaphore().redirect(dir),
        }
    }

    /// Mirror the piece the way a switch or switch-rail flips it.
    ///
    /// 3-ways keep their straight axis and mirror the diverging turn; plain
    /// turns mirror left-right. Everything else is its own image.
    #[must_use]
    pub fn swap(self) -> Track {
        match self {
            Track::BottomRightLeft3Way => Track::BottomLeftRight3Way,
            Track::BottomLeftRight3Way => Track::BottomRightLeft3Way,
            Track::BottomRightTop3Way => Track::TopRightBottom3Way,
            Track::TopRightBottom3Way => Track::BottomRightTop3Way,
            Track::BottomLeftTop3Way => Track::TopLeftBottom3Way,
            Track::TopLeftBottom3Way => Track::BottomLeftTop3Way,
            Track::TopRightLeft3Way => Track::TopLeftRight3Way,
            Track::TopLeftRight3Way => Track::TopRightLeft3Way,
            Track::BottomRightTurn => Track::BottomLeftTurn,
            Track::BottomLeftTurn => Track::BottomRightTurn,
            Track::TopRightTurn => Track::TopLeftTurn,
            Track::TopLeftTurn => Track::TopRightTurn,
            other => other,
        }
    }

    /// The placeholder variant carrying a semaphore, for pieces that take one.
    #[must_use]
    pub fn with_semaphore(self) -> Option<Track> {
        match self {
            Track::Horizontal => Some(Track::SemHorizontal),
            Track::Vertical => Some(Track::SemVertical),
            Track::BottomRightTurn => Some(Track::SemBottomRightTurn),
            Track::BottomLeftTurn => Some(Track::SemBottomLeftTurn),
            Track::TopRightTurn => Some(Track::SemTopRightTurn),
            Track::TopLeftTurn => Some(Track::SemTopLeftTurn),
            _ => None,
        }
    }

    /// The plain piece under a placeholder-semaphore variant.
    #[must_use]
    pub fn without_semaphore(self) -> Track {
        match self {
            Track::SemHorizontal => Track::Horizontal,
            Track::SemVertical => Track::Vertical,
            Track::SemBottomRightTurn => Track::BottomRightTurn,
            Track::SemBottomLeftTurn => Track::BottomLeftTurn,
            Track::SemTopRightTurn => Track::TopRightTurn,
            Track::SemTopLeftTurn => Track::TopLeftTurn,
            other => other,
        }
    }

    /// Direction a cart travels when it pops out of this tunnel mouth.
    #[must_use]
    pub fn tunnel_exit(self) -> Option<Direction> {
        match self {
            Track::TunnelLeft => Some(Direction::Left),
            Track::TunnelRight => Some(Direction::Right),
            Track::TunnelDown => Some(Direction::Down),
            Track::TunnelUp => Some(Direction::Up),
            _ => None,
        }
    }

    /// The two neighbour sides whose occupants release a semaphore on this
    /// piece.
    #[must_use]
    pub fn semaphore_entries(self) -> Option<[Direction; 2]> {
        use Direction::{Down, Left, Right, Up};
        match self {
            Track::Horizontal => Some([Left, Right]),
            Track::Vertical => Some([Down, Up]),
            Track::BottomRightTurn => Some([Down, Right]),
            Track::BottomLeftTurn => Some([Down, Left]),
            Track::TopRightTurn => Some([Up, Right]),
            Track::TopLeftTurn => Some([Up, Left]),
            _ => None,
        }
    }

    /// The three pieces a cart travelling `dir` can lay into an empty cell:
    /// the straight along its axis and the two forward turns.
    #[must_use]
    pub fn accessible_from(dir: Direction) -> [Track; 3] {
        match dir {
            Direction::Left => [Track::Horizontal, Track::BottomRightTurn, Track::TopRightTurn],
            Direction::Right => [Track::Horizontal, Track::BottomLeftTurn, Track::TopLeftTurn],
            Direction::Down => [Track::Vertical, Track::TopRightTurn, Track::TopLeftTurn],
            Direction::Up => [Track::Vertical, Track::BottomRightTurn, Track::BottomLeftTurn],
        }
    }

    /// The 3-way upgrades that add an approach from `dir` to this piece.
    ///
    /// A straight yields the two upgrades keeping its axis; a turn yields the
    /// single 3-way that keeps the turn and adds the straight run. Pieces that
    /// already accept `dir`, and anything else, yield nothing.
    #[must_use]
    pub fn three_way_upgrades(self, dir: Direction) -> &'static [Track] {
        use Direction::{Down, Left, Right, Up};
        match (dir, self) {
            (Left, Track::Horizontal) => {
                &[Track::BottomRightLeft3Way, Track::TopRightLeft3Way]
            }
            (Left, Track::Vertical) => {
                &[Track::BottomRightTop3Way, Track::TopRightBottom3Way]
            }
            (Left, Track::BottomLeftTurn) => &[Track::BottomLeftRight3Way],
            (Left, Track::TopLeftTurn) => &[Track::TopLeftRight3Way],
            (Right, Track::Horizontal) => {
                &[Track::BottomLeftRight3Way, Track::TopLeftRight3Way]
            }
            (Right, Track::Vertical) => {
                &[Track::BottomLeftTop3Way, Track::TopLeftBottom3Way]
            }
            (Right, Track::BottomRightTurn) => &[Track::BottomRightLeft3Way],
            (Right, Track::TopRightTurn) => &[Track::TopRightLeft3Way],
            (Down, Track::Horizontal) => {
                &[Track::TopRightLeft3Way, Track::TopLeftRight3Way]
            }
            (Down, Track::Vertical) => {
                &[Track::TopRightBottom3Way, Track::TopLeftBottom3Way]
            }
            (Down, Track::BottomRightTurn) => &[Track::BottomRightTop3Way],
            (Down, Track::BottomLeftTurn) => &[Track::BottomLeftTop3Way],
            (Up, Track::Horizontal) => {
                &[Track::BottomRightLeft3Way, Track::BottomLeftRight3Way]
            }
            (Up, Track::Vertical) => {
                &[Track::BottomRightTop3Way, Track::BottomLeftTop3Way]
            }
            (Up, Track::TopRightTurn) => &[Track::TopRightBottom3Way],
            (Up, Track::TopLeftTurn) => &[Track::TopLeftBottom3Way],
            _ => &[],
        }
    }
}

fn accepts_only(dir: Direction, accepted: Direction) -> Redirect {
    if dir == accepted {
        Redirect::Unknown
    } else {
        Redirect::Crash
    }
}

impl From<Track> for u8 {
    fn from(track: Track) -> u8 {
        track as u8
    }
}

impl TryFrom<u8> for Track {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let track = match value {
            0 => Track::Empty,
            1 => Track::Horizontal,
            2 => Track::Vertical,
            3 => Track::Roadblock,
            4 => Track::BottomRightTurn,
            5 => Track::BottomLeftTurn,
            6 => Track::TopRightTurn,
            7 => Track::TopLeftTurn,
            8 => Track::BottomRightLeft3Way,
            9 => Track::BottomRightTop3Way,
            10 => Track::BottomLeftRight3Way,
            11 => Track::BottomLeftTop3Way,
            12 => Track::TopRightLeft3Way,
            13 => Track::TopRightBottom3Way,
            14 => Track::TopLeftRight3Way,
            15 => Track::TopLeftBottom3Way,
            16 => Track::TunnelLeft,
            17 => Track::TunnelRight,
            18 => Track::TunnelDown,
            19 => Track::TunnelUp,
            20 => Track::CarEndingLeft,
            21 => Track::CarEndingRight,
            22 => Track::CarEndingDown,
            23 => Track::CarEndingUp,
            24 => Track::NumeralEndingLeft,
            25 => Track::NumeralEndingRight,
            26 => Track::NumeralEndingDown,
            27 => Track::NumeralEndingUp,
            28 => Track::SemHorizontal,
            29 => Track::SemVertical,
            30 => Track::SemBottomRightTurn,
            31 => Track::SemBottomLeftTurn,
            32 => Track::SemTopRightTurn,
            33 => Track::SemTopLeftTurn,
            _ => return Err(anyhow!("invalid track kind: {value}")),
        };
        Ok(track)
    }
}

/// Modifier kind of a single board cell.
///
/// Grouped mods (switches, tunnels, gates, swapping tracks, stations, post
/// offices) carry their group number in the separate group grid.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mod {
    #[default]
    Empty,
    Switch,
    Tunnel,
    ClosedGate,
    OpenGate,
    SwappingTrack,
    Station,
    SwitchRail,
    Semaphore,
    Deactivated,
    StartingCarTile,
    PostOffice,
}

impl Mod {
    /// Whether a cart ahead of this mod has to wait.
    #[must_use]
    pub fn blocks(self) -> bool {
        matches!(self, Mod::ClosedGate | Mod::Semaphore)
    }
}

impl From<Mod> for u8 {
    fn from(m: Mod) -> u8 {
        m as u8
    }
}

impl TryFrom<u8> for Mod {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let m = match value {
            0 => Mod::Empty,
            1 => Mod::Switch,
            2 => Mod::Tunnel,
            3 => Mod::ClosedGate,
            4 => Mod::OpenGate,
            5 => Mod::SwappingTrack,
            6 => Mod::Station,
            7 => Mod::SwitchRail,
            8 => Mod::Semaphore,
            9 => Mod::Deactivated,
            10 => Mod::StartingCarTile,
            11 => Mod::PostOffice,
            _ => return Err(anyhow!("invalid mod kind: {value}")),
        };
        Ok(m)
    }
}
