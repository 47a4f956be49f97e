// Copyright (c) 2025 railgrid developers
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! The branching generator.
//!
//! One call advances a state one tick, like the simulator, but wherever a
//! cart's movement is not forced it enumerates every legal (piece, optional
//! semaphore) it could lay, then combines the per-cart candidate sets into
//! successor states. All the budget, heat, and dominance pruning happens
//! here, before a successor is ever materialized.

use crate::caches::{heat_at, heat_at_dir, raise_limits, StateKey, Visited};
use crate::car::Car;
use crate::constants::DECOY_GRACE_TICKS;
use crate::puzzle::Layout;
use crate::sim::{
    commit_arrival, head_on, lands_on_obstacle, pre_move_effects, retire_crashed_decoys,
    stalled_positions,
};
use crate::state::State;
use crate::tile::{Mod, Redirect, Track};
use anyhow::{anyhow, Result};
use itertools::Itertools;
use ndarray::Array2;

/// What one tick of expansion produced.
#[derive(Debug)]
pub(crate) enum Verdict {
    /// The branch is infeasible or already visited.
    Pruned,
    /// Every cart solved; the boards are the solution of this branch.
    Solved {
        tracks_remaining: i32,
        semaphores_remaining: i32,
        board: Array2<Track>,
        mods: Array2<Mod>,
    },
    /// Successor states, one per surviving candidate combination.
    Expanded(Vec<State>),
}

/// One possibility for one cart: where it ends up and which piece its tile
/// choice commits (`Empty` for a deliberate decoy crash, a placeholder
/// variant when a semaphore rides along).
#[derive(Clone, Copy, Debug)]
struct Candidate {
    car: Car,
    track: Track,
}

/// Advance `state` one tick, branching over every legal placement.
pub(crate) fn expand_tick(
    layout: &Layout,
    visited: &mut Visited,
    best_tracks: i32,
    iterations: &mut u64,
    state: &State,
) -> Result<Verdict> {
    let dims = layout.dims();
    let counts = layout.counts();
    let mut work = state.clone();
    retire_crashed_decoys(&mut work);
    let holdovers = stalled_positions(&work);
    if !pre_move_effects(layout, &mut work) {
        return Ok(Verdict::Pruned);
    }
    if !visited.insert(StateKey::capture(&work, layout)) {
        return Ok(Verdict::Pruned);
    }

    let live = work.cars.len();
    let mut candidates: Vec<Vec<Candidate>> = vec![Vec::new(); live];
    let mut decoy_placing = vec![false; counts.decoys()];
    let mut just_solved: Vec<usize> = Vec::new();
    let mut available = work.available_tracks;

    for c in 0..live {
        *iterations += 1;
        let car = work.cars[c];
        let here = car.pos().index();
        let ahead = car.pos_ahead();
        let stay = Candidate {
            car,
            track: work.tracks[here],
        };

        if !ahead.in_bounds(dims) {
            if car.is_decoy() {
                candidates[c].push(Candidate {
                    car: car.crashed(),
                    track: work.tracks[here],
                });
                continue;
            }
            return Ok(Verdict::Pruned);
        }

        if !car.is_decoy() {
            let slot = car.slot(counts);
            if car.on_own_station(work.mods[here], layout.groups()[here]) {
                work.station_stalled[slot] = true;
                work.mods[here] = Mod::Deactivated;
                candidates[c].push(stay);
                continue;
            } else if work.station_stalled[slot] {
                work.station_stalled[slot] = false;
                candidates[c].push(stay);
                continue;
            }
        }

        if work.mods[ahead.index()].blocks() {
            work.stalled[c] = true;
            candidates[c].push(stay);
            continue;
        }
        if work.stalled[c] {
            work.stalled[c] = false;
        }

        let tile_ahead = work.tracks[ahead.index()];
        let redirect = tile_ahead.redirect(car.dir());

        // which pieces could occupy the cell ahead
        let mut to_check: Vec<Track> = Vec::with_capacity(4);
        if !tile_ahead.is_empty() {
            if layout.is_permanent(ahead) {
                if redirect == Redirect::Crash {
                    if car.is_decoy() {
                        candidates[c].push(Candidate {
                            car: car.crashed(),
                            track: work.tracks[here],
                        });
                        continue;
                    }
                    return Ok(Verdict::Pruned);
                }
                to_check.push(tile_ahead);
            } else if redirect == Redirect::Crash {
                let upgrades = tile_ahead.three_way_upgrades(car.dir());
                if upgrades.is_empty() {
                    if car.is_decoy() {
                        candidates[c].push(Candidate {
                            car: car.crashed(),
                            track: work.tracks[here],
                        });
                        continue;
                    }
                    return Ok(Verdict::Pruned);
                }
                to_check.extend_from_slice(upgrades);
            } else if tile_ahead.is_straight() {
                to_check.push(tile_ahead);
                // upgrading a square other carts already ran through would
                // derail their history
                if heat_at_dir(&work.heat, car.dir(), car.pos()) <= 1 {
                    to_check.extend_from_slice(tile_ahead.three_way_upgrades(car.dir()));
                }
            } else {
                to_check.push(tile_ahead);
            }
        } else if car.is_decoy() {
            if available - 1 <= best_tracks {
                to_check.push(Track::Empty);
            } else {
                decoy_placing[car.num() as usize] = true;
                to_check.push(Track::Empty);
                to_check.extend_from_slice(&Track::accessible_from(car.dir()));
            }
        } else {
            available -= 1;
            to_check.extend_from_slice(&Track::accessible_from(car.dir()));
        }

        // wrong kind of cart heading into a depot
        let first = to_check[0];
        if (first.is_car_ending() && !car.is_normal())
            || (first.is_numeral_ending() && !car.is_numeral())
        {
            return Ok(Verdict::Pruned);
        }

        if available <= best_tracks {
            return Ok(Verdict::Pruned);
        }

        // collisions are judged at the mouth cell, before any teleport
        let resolved: Vec<_> = candidates[..c]
            .iter()
            .filter_map(|set| set.first().map(|cand| cand.car.pos()))
            .collect();
        if lands_on_obstacle(ahead, &resolved, &work.crashed_decoys, &holdovers)
            || head_on(&car, &work.cars, c)
        {
            if to_check[0].is_empty() {
                to_check.truncate(1);
            } else if car.is_decoy() {
                candidates[c].push(Candidate {
                    car: car.crashed(),
                    track: work.tracks[here],
                });
                continue;
            } else {
                return Ok(Verdict::Pruned);
            }
        }

        for possible in to_check {
            if possible.is_empty() {
                candidates[c].push(Candidate {
                    car: car.crashed(),
                    track: Track::Empty,
                });
                continue;
            }

            let (landing, out_dir, recorded) = if possible.is_tunnel() {
                let group = layout.groups()[ahead.index()];
                let exit = layout.paired_tunnel(group, ahead).ok_or_else(|| {
                    anyhow!("tunnel at {} has no paired opening", ahead)
                })?;
                let exit_track = work.tracks[exit.index()];
                let dir = exit_track
                    .tunnel_exit()
                    .ok_or_else(|| anyhow!("tunnel pair of {} is not a tunnel", ahead))?;
                (exit, dir, exit_track)
            } else {
                match possible.redirect(car.dir()) {
                    Redirect::Go(dir) => (ahead, dir, possible),
                    Redirect::Unknown => {
                        if !commit_arrival(layout, &mut work, &car, possible) {
                            return Ok(Verdict::Pruned);
                        }
                        just_solved.push(c);
                        candidates[c].push(Candidate {
                            car: car.moved(ahead, car.dir()),
                            track: possible,
                        });
                        continue;
                    }
                    Redirect::Crash => continue,
                }
            };

            if possible.is_three_way() && !tile_ahead.is_three_way() {
                // a fresh 3-way may not rewrite a path other carts took, nor
                // sit on a semaphore cell
                if heat_at_dir(&work.heat, out_dir.reverse(), ahead) > 0 {
                    continue;
                }
                if matches!(work.mods[ahead.index()], Mod::Semaphore | Mod::Deactivated) {
                    continue;
                }
            }

            // look one cell further: a placement that must crash next tick is
            // pointless for anything but a decoy
            let end_on = landing.step(out_dir);
            let doomed = if end_on.in_bounds(dims) {
                let end_tile = work.tracks[end_on.index()];
                let fixable = (end_tile.is_straight() || end_tile.is_turn())
                    && !layout.is_permanent(end_on);
                end_tile.redirect(out_dir) == Redirect::Crash
                    && !end_tile.is_empty()
                    && !fixable
            } else {
                true
            };
            if doomed {
                if car.is_decoy() {
                    candidates[c].push(Candidate {
                        car: car.moved(landing, out_dir),
                        track: recorded,
                    });
                }
                continue;
            }

            candidates[c].push(Candidate {
                car: car.moved(landing, out_dir),
                track: recorded,
            });

            // the piece may carry a semaphore when the spot is quiet enough
            if !possible.is_tunnel()
                && work.available_semaphores > 0
                && (possible.is_straight() || possible.is_turn())
                && work.mods[ahead.index()] == Mod::Empty
                && heat_at(&work.heat, ahead) == 0
            {
                if let Some(entries) = possible.semaphore_entries() {
                    let mut triggers: i32 = 0;
                    for entry in entries {
                        let neighbour = ahead.step(entry);
                        if neighbour.in_bounds(dims) {
                            triggers += heat_at(&work.heat, neighbour) as i32;
                            if work.mods[neighbour.index()] == Mod::StartingCarTile {
                                triggers -= 1;
                            }
                        }
                    }
                    if work.mods[here] == Mod::StartingCarTile
                        && layout.starts()[car.slot(counts)] == car.pos()
                    {
                        triggers += 1;
                    }
                    if triggers == 1 {
                        if let Some(sem) = possible.with_semaphore() {
                            candidates[c].push(Candidate { car, track: sem });
                        }
                    }
                }
            }
        }

        if candidates[c].is_empty() {
            return Ok(Verdict::Pruned);
        }
    }

    if !work.cars.is_empty() && work.stalled.iter().all(|&stalled| stalled) {
        return Ok(Verdict::Pruned);
    }

    if work.all_solved(layout) {
        if !work.has_live_decoy() || work.mvmts_since_solved == DECOY_GRACE_TICKS {
            return Ok(Verdict::Solved {
                tracks_remaining: available,
                semaphores_remaining: work.available_semaphores,
                board: work.tracks,
                mods: work.mods,
            });
        }
        work.mvmts_since_solved += 1;
    }

    for &c in just_solved.iter().rev() {
        candidates.remove(c);
        work.stalled.remove(c);
    }

    let mut successors = Vec::new();
    for combo in candidates
        .iter()
        .map(|set| set.iter().copied())
        .multi_cartesian_product()
    {
        let mut tracks_to_pass = available;
        let mut sems_to_pass = work.available_semaphores;
        let mut board = work.tracks.clone();
        let mut mods = work.mods.clone();
        let mut stalled = work.stalled.clone();
        let mut limits = work.heat_limits.clone();
        let mut ok = true;

        for (i, cand) in combo.iter().enumerate() {
            // two carts claiming the same cell
            if combo[i + 1..].iter().any(|o| o.car.pos() == cand.car.pos()) {
                ok = false;
                break;
            }
            let car = cand.car;
            if car.is_decoy() && decoy_placing[car.num() as usize] && !cand.track.is_empty() {
                tracks_to_pass -= 1;
                if tracks_to_pass <= best_tracks {
                    ok = false;
                    break;
                }
            }
            if cand.track.is_placeholder_semaphore() {
                sems_to_pass -= 1;
                if sems_to_pass < 0 {
                    ok = false;
                    break;
                }
                let target = car.pos_ahead();
                board[target.index()] = cand.track.without_semaphore();
                mods[target.index()] = Mod::Semaphore;
                stalled[i] = true;
            } else if !cand.track.is_empty() {
                board[car.pos().index()] = cand.track;
            }
            if !car.is_crashed()
                && matches!(
                    mods[car.pos().index()],
                    Mod::SwappingTrack | Mod::SwitchRail
                )
                && !raise_limits(
                    &mut limits,
                    car.slot(counts),
                    car.dir(),
                    car.pos(),
                    work.stalled[i],
                )
            {
                ok = false;
                break;
            }
        }
        if !ok {
            continue;
        }

        successors.push(State {
            cars: combo.iter().map(|cand| cand.car).collect(),
            tracks: board,
            mods,
            available_tracks: tracks_to_pass,
            available_semaphores: sems_to_pass,
            heat: work.heat.clone(),
            heat_limits: limits,
            solved: work.solved.clone(),
            stalled,
            switch_queue: work.switch_queue.clone(),
            station_stalled: work.station_stalled.clone(),
            crashed_decoys: work.crashed_decoys.clone(),
            mvmts_since_solved: work.mvmts_since_solved,
        });
    }

    Ok(Verdict::Expanded(successors))
}

#[cfg(test)]
mod branching {
    use super::{expand_tick, Verdict};
    use crate::caches::Visited;
    use crate::car::{CarKind, Pos};
    use crate::puzzle::{CarSpec, Layout, Puzzle};
    use crate::state::State;
    use crate::tile::{Direction, Mod, Track};
    use anyhow::Result;

    const START: u8 = 10;

    fn expand(layout: &Layout, state: &State) -> Result<Vec<State>> {
        let mut visited = Visited::new();
        let mut iterations = 0;
        match expand_tick(layout, &mut visited, -1, &mut iterations, state)? {
            Verdict::Expanded(successors) => Ok(successors),
            other => panic!("expected successors, got {other:?}"),
        }
    }

    #[test]
    fn an_empty_cell_offers_three_pieces() -> Result<()> {
        // 3x3, cart in the middle row driving right into open space
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0; 3], vec![0; 3], vec![0; 3]],
            vec![
                vec![0, 0, 0],
                vec![START, 0, 0],
                vec![0, 0, 0],
            ],
            vec![vec![0; 3]; 3],
            vec![CarSpec::new(1, 0, Direction::Right, 0, CarKind::Normal)],
            5,
            0,
        ))?;
        let successors = expand(&layout, &State::initial(&layout))?;
        assert_eq!(successors.len(), 3);
        let placed: Vec<Track> = successors
            .iter()
            .map(|s| s.tracks()[(1, 1)])
            .collect();
        assert!(placed.contains(&Track::Horizontal));
        assert!(placed.contains(&Track::BottomLeftTurn));
        assert!(placed.contains(&Track::TopLeftTurn));
        for s in &successors {
            assert_eq!(s.available_tracks(), 4);
            assert_eq!(s.cars()[0].pos(), Pos::new(1, 1));
        }
        Ok(())
    }

    #[test]
    fn decoys_may_also_refuse_to_place() -> Result<()> {
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0; 3], vec![0; 3], vec![0; 3]],
            vec![
                vec![0, 0, 0],
                vec![START, 0, 0],
                vec![0, 0, 0],
            ],
            vec![vec![0; 3]; 3],
            vec![CarSpec::new(1, 0, Direction::Right, 0, CarKind::Decoy)],
            5,
            0,
        ))?;
        let successors = expand(&layout, &State::initial(&layout))?;
        // the three pieces plus a deliberate crash
        assert_eq!(successors.len(), 4);
        let crashed: Vec<_> = successors
            .iter()
            .filter(|s| s.cars()[0].is_crashed())
            .collect();
        assert_eq!(crashed.len(), 1);
        // refusing costs nothing
        assert_eq!(crashed[0].available_tracks(), 5);
        Ok(())
    }

    #[test]
    fn placed_straights_can_upgrade_to_three_ways() -> Result<()> {
        // crossing a vertical run laid earlier in the search; input tracks
        // are permanent and would kill the branch instead
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0, 0, 0], vec![0, 0, 0], vec![0, 0, 0]],
            vec![
                vec![0, 0, 0],
                vec![START, 0, 0],
                vec![0, 0, 0],
            ],
            vec![vec![0; 3]; 3],
            vec![CarSpec::new(1, 0, Direction::Right, 0, CarKind::Normal)],
            5,
            0,
        ))?;
        let mut state = State::initial(&layout);
        state.tracks[(1, 1)] = Track::Vertical;
        let successors = expand(&layout, &state)?;
        let placed: Vec<Track> = successors
            .iter()
            .map(|s| s.tracks()[(1, 1)])
            .collect();
        assert_eq!(successors.len(), 2);
        assert!(placed.contains(&Track::BottomLeftTop3Way));
        assert!(placed.contains(&Track::TopLeftBottom3Way));
        // upgrades are free: nothing is laid on an empty square
        for s in &successors {
            assert_eq!(s.available_tracks(), 5);
        }
        Ok(())
    }

    #[test]
    fn permanent_hostile_tiles_kill_the_branch() -> Result<()> {
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0, 3, 0]],
            vec![vec![START, 0, 0]],
            vec![vec![0, 0, 0]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
            5,
            0,
        ))?;
        let mut visited = Visited::new();
        let mut iterations = 0;
        let verdict = expand_tick(
            &layout,
            &mut visited,
            -1,
            &mut iterations,
            &State::initial(&layout),
        )?;
        assert!(matches!(verdict, Verdict::Pruned));
        Ok(())
    }

    #[test]
    fn semaphore_placement_piggybacks_on_a_piece() -> Result<()> {
        // the lead cart's next straight qualifies for a semaphore: its own
        // starting-tile presence is the single trigger the rule wants
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0, 0, 0, 0, 0]],
            vec![vec![START, 0, START, 0, 0]],
            vec![vec![0, 0, 0, 0, 0]],
            vec![
                CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal),
                CarSpec::new(0, 2, Direction::Right, 1, CarKind::Normal),
            ],
            6,
            1,
        ))?;
        let successors = expand(&layout, &State::initial(&layout))?;
        // some successor must have spent the semaphore
        let with_sem: Vec<_> = successors
            .iter()
            .filter(|s| s.available_semaphores() == 0)
            .collect();
        assert!(!with_sem.is_empty());
        for s in &with_sem {
            let placed = s
                .mods()
                .iter()
                .filter(|&&m| m == Mod::Semaphore)
                .count();
            assert_eq!(placed, 1);
        }
        // and the plain variants survive alongside
        assert!(successors.iter().any(|s| s.available_semaphores() == 1));
        Ok(())
    }

    #[test]
    fn budget_dominance_prunes_expensive_branches() -> Result<()> {
        let layout = Layout::new(&Puzzle::new(
            vec![vec![0, 0, 21]],
            vec![vec![START, 0, 0]],
            vec![vec![0, 0, 0]],
            vec![CarSpec::new(0, 0, Direction::Right, 0, CarKind::Normal)],
            1,
            0,
        ))?;
        let mut visited = Visited::new();
        let mut iterations = 0;
        // a best solution already burned the whole budget; placing more loses
        let verdict = expand_tick(
            &layout,
            &mut visited,
            0,
            &mut iterations,
            &State::initial(&layout),
        )?;
        assert!(matches!(verdict, Verdict::Pruned));
        Ok(())
    }
}
