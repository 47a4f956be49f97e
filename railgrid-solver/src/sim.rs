// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! The single-tick simulator.
//!
//! A tick has two phases, each running over the live carts in order. Phase A
//! applies pre-move effects: deferred gate closures, switch and switch-rail
//! flips, the heat bookkeeping, and semaphore releases. Phase B computes each
//! cart's movement intention against the current board. [`simulate_tick`]
//! runs both phases following existing tracks only; the generator reuses the
//! Phase A and bookkeeping pieces and supplies its own branching Phase B.

use crate::caches::{note_traversal, raise_limits};
use crate::car::{Car, Pos};
use crate::constants::DECOY_GRACE_TICKS;
use crate::puzzle::Layout;
use crate::state::State;
use crate::tile::{Mod, Redirect, Track};

/// Move carts that crashed last tick out of the live list; their wrecks keep
/// blocking tiles from `crashed_decoys`.
pub(crate) fn retire_crashed_decoys(state: &mut State) {
    let mut i = 0;
    while i < state.cars.len() {
        if state.cars[i].is_crashed() {
            let wreck = state.cars.remove(i);
            state.stalled.remove(i);
            state.crashed_decoys.push(wreck);
        } else {
            i += 1;
        }
    }
}

/// Positions of carts that ended the previous tick stalled.
///
/// Snapshotted before Phase A so a cart still counts as an obstacle on the
/// tick its gate opens; crashes resolve before gates do within a tick.
pub(crate) fn stalled_positions(state: &State) -> Vec<Pos> {
    state
        .cars
        .iter()
        .zip(state.stalled.iter())
        .filter(|(_, &stalled)| stalled)
        .map(|(car, _)| car.pos())
        .collect()
}

/// Phase A. Returns `false` when a heat limit is exceeded and the state is
/// infeasible.
pub(crate) fn pre_move_effects(layout: &Layout, work: &mut State) -> bool {
    let dims = layout.dims();
    let counts = layout.counts();

    for c in 0..work.cars.len() {
        let car = work.cars[c];
        let slot = car.slot(counts);

        // close a deferred gate once its cart has moved off
        if let Some(gate) = work.switch_queue[slot] {
            if car.pos() != gate {
                work.mods[gate.index()] = Mod::ClosedGate;
                work.switch_queue[slot] = None;
            }
        }

        let here = car.pos().index();
        let m = work.mods[here];
        let group = layout.groups()[here];
        if !work.stalled[c] && m == Mod::Switch {
            for &gate in layout.gates(group) {
                match work.mods[gate.index()] {
                    Mod::OpenGate => {
                        let under = work.cars.iter().find(|other| other.pos() == gate);
                        if let Some(under) = under {
                            work.switch_queue[under.slot(counts)] = Some(gate);
                        } else {
                            work.mods[gate.index()] = Mod::ClosedGate;
                        }
                    }
                    Mod::ClosedGate => work.mods[gate.index()] = Mod::OpenGate,
                    _ => {}
                }
            }
            for &swap in layout.swaps(group) {
                work.tracks[swap.index()] = work.tracks[swap.index()].swap();
            }
        } else if !work.stalled[c] && m == Mod::SwitchRail {
            work.tracks[here] = work.tracks[here].swap();
        }

        let ahead = car.pos_ahead();
        if !ahead.in_bounds(dims) {
            continue;
        }

        // heat only counts carts that actually move this tick
        let holding = !car.is_decoy()
            && (car.on_own_station(work.mods[here], group) || work.station_stalled[slot]);
        if !holding && !work.mods[ahead.index()].blocks() {
            let counted = note_traversal(
                &mut work.heat,
                &mut work.heat_limits,
                slot,
                car.dir(),
                car.pos(),
                car.is_decoy(),
            );
            if !counted {
                return false;
            }
        }

        // a neighbour passing the semaphore releases it
        if work.mods[ahead.index()] == Mod::Semaphore {
            if let Some(entries) = work.tracks[ahead.index()].semaphore_entries() {
                let released = work.cars.iter().enumerate().any(|(i, other)| {
                    i != c
                        && entries.iter().any(|&entry| {
                            other.pos() == ahead.step(entry) && other.dir() != entry.reverse()
                        })
                });
                if released {
                    work.mods[ahead.index()] = Mod::Deactivated;
                }
            }
        }
    }
    true
}

/// Whether moving into `target` hits a cart resolved earlier this tick, a
/// wreck, or a cart that was stalled at tick start.
pub(crate) fn lands_on_obstacle(
    target: Pos,
    resolved: &[Pos],
    crashed: &[Car],
    holdovers: &[Pos],
) -> bool {
    resolved.contains(&target)
        || crashed.iter().any(|wreck| wreck.pos() == target)
        || holdovers.contains(&target)
}

/// Whether an unresolved cart occupies the cell ahead facing straight back.
pub(crate) fn head_on(car: &Car, cars: &[Car], own: usize) -> bool {
    let ahead = car.pos_ahead();
    cars.iter()
        .enumerate()
        .any(|(i, other)| i != own && other.pos() == ahead && other.dir() == car.dir().reverse())
}

/// Check an ending-track arrival and record it in the solved lists.
///
/// Arrival is only valid for the matching cart kind, in increasing ordinal
/// order, and once every station (post office) of the cart's own group has
/// been collected. Returns `false` when the branch is infeasible.
pub(crate) fn commit_arrival(layout: &Layout, work: &mut State, car: &Car, tile: Track) -> bool {
    if tile.is_car_ending() && !car.is_normal() {
        return false;
    }
    if tile.is_numeral_ending() && !car.is_numeral() {
        return false;
    }
    let list = usize::from(car.is_numeral());
    let in_order = match work.solved[list].last() {
        None => car.num() == 0,
        Some(&last) => car.num() > 0 && last == car.num() - 1,
    };
    if !in_order {
        return false;
    }
    for pos in layout.stations_for(car.kind(), car.num() + 1) {
        if work.mods[pos.index()] != Mod::Deactivated {
            return false;
        }
    }
    work.solved[list].push(car.num());
    true
}

/// Advance a state one tick along the tracks it already has.
///
/// No pieces are placed: a cart facing an empty or hostile cell crashes (a
/// decoy) or makes the state infeasible (anything else). Returns `None` on
/// infeasibility.
#[must_use]
pub fn simulate_tick(layout: &Layout, state: &State) -> Option<State> {
    let dims = layout.dims();
    let counts = layout.counts();
    let mut work = state.clone();
    retire_crashed_decoys(&mut work);
    let holdovers = stalled_positions(&work);
    if !pre_move_effects(layout, &mut work) {
        return None;
    }

    let mut resolved: Vec<Car> = Vec::with_capacity(work.cars.len());
    let mut just_solved: Vec<usize> = Vec::new();
    for c in 0..work.cars.len() {
        let car = work.cars[c];
        let ahead = car.pos_ahead();

        if !ahead.in_bounds(dims) {
            if car.is_decoy() {
                resolved.push(car.crashed());
                continue;
            }
            return None;
        }

        if !car.is_decoy() {
            let slot = car.slot(counts);
            let here = car.pos().index();
            if car.on_own_station(work.mods[here], layout.groups()[here]) {
                work.station_stalled[slot] = true;
                work.mods[here] = Mod::Deactivated;
                resolved.push(car);
                continue;
            } else if work.station_stalled[slot] {
                work.station_stalled[slot] = false;
                resolved.push(car);
                continue;
            }
        }

        if work.mods[ahead.index()].blocks() {
            work.stalled[c] = true;
            resolved.push(car);
            continue;
        }
        if work.stalled[c] {
            work.stalled[c] = false;
        }

        let resolved_at: Vec<Pos> = resolved.iter().map(Car::pos).collect();
        if lands_on_obstacle(ahead, &resolved_at, &work.crashed_decoys, &holdovers)
            || head_on(&car, &work.cars, c)
        {
            if car.is_decoy() {
                resolved.push(car.crashed());
                continue;
            }
            return None;
        }

        let tile = work.tracks[ahead.index()];
        match tile.redirect(car.dir()) {
            Redirect::Crash => {
                if car.is_decoy() {
                    resolved.push(car.crashed());
                    continue;
                }
                return None;
            }
            Redirect::Go(dir) => resolved.push(car.moved(ahead, dir)),
            Redirect::Unknown if tile.is_tunnel() => {
                let group = layout.groups()[ahead.index()];
                let exit = layout.paired_tunnel(group, ahead)?;
                let dir = work.tracks[exit.index()].tunnel_exit()?;
                resolved.push(car.moved(exit, dir));
            }
            Redirect::Unknown => {
                if !commit_arrival(layout, &mut work, &car, tile) {
                    return None;
                }
                just_solved.push(c);
                resolved.push(car.moved(ahead, car.dir()));
            }
        }
    }

    work.cars = resolved;
    for &c in just_solved.iter().rev() {
        work.cars.remove(c);
        work.stalled.remove(c);
    }
    // standing on a swapping track or switch-rail loosens the revisit limits
    for c in 0..work.cars.len() {
        let car = work.cars[c];
        if !car.is_crashed()
            && matches!(
                work.mods[car.pos().index()],
                Mod::SwappingTrack | Mod::SwitchRail
            )
            && !raise_limits(
                &mut work.heat_limits,
                car.slot(counts),
                car.dir(),
                car.pos(),
                work.stalled[c],
            )
        {
            return None;
        }
    }
    if !work.cars.is_empty() && work.stalled.iter().all(|&stalled| stalled) {
        return None;
    }
    if work.all_solved(layout) && work.mvmts_since_solved < DECOY_GRACE_TICKS {
        work.mvmts_since_solved += 1;
    }
    Some(work)
}
