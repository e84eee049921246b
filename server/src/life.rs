//! Two-team Game of Life overlay driving death and respawn.
//!
//! Once per generation period the grid is rebuilt from scratch out of the
//! alive players' positions, survival is evaluated against the 26-cell Moore
//! neighborhood, and empty cells bordered by exactly three teammates become
//! respawn points. Nothing here persists between generations except the
//! players themselves.

use crate::game::World;
use log::{debug, info};
use shared::math::{cell_distance, cell_to_world, world_to_cell, Cell, GRID_CELLS_XZ, GRID_CELLS_Y};
use shared::{Kinematics, Team, TeamRespawns};
use std::collections::HashSet;

/// Occupancy grid for one generation pass.
pub struct Grid {
    cells: Vec<Option<Team>>,
}

impl Grid {
    pub fn new() -> Grid {
        let volume = (GRID_CELLS_XZ * GRID_CELLS_Y * GRID_CELLS_XZ) as usize;
        Grid {
            cells: vec![None; volume],
        }
    }

    fn index(cell: Cell) -> usize {
        let [x, y, z] = cell;
        ((x * GRID_CELLS_Y + y) * GRID_CELLS_XZ + z) as usize
    }

    pub fn in_bounds(cell: Cell) -> bool {
        let [x, y, z] = cell;
        (0..GRID_CELLS_XZ).contains(&x)
            && (0..GRID_CELLS_Y).contains(&y)
            && (0..GRID_CELLS_XZ).contains(&z)
    }

    pub fn get(&self, cell: Cell) -> Option<Team> {
        self.cells[Grid::index(cell)]
    }

    pub fn set(&mut self, cell: Cell, team: Team) {
        self.cells[Grid::index(cell)] = Some(team);
    }

    /// Occupied-cell counts per team in the Moore neighborhood of `cell`.
    ///
    /// The center cell itself is excluded; out-of-bounds neighbors count as
    /// empty.
    pub fn neighbor_counts(&self, cell: Cell) -> (u32, u32) {
        let mut red = 0;
        let mut blue = 0;
        for neighbor in moore_neighbors(cell) {
            match self.get(neighbor) {
                Some(Team::Red) => red += 1,
                Some(Team::Blue) => blue += 1,
                None => {}
            }
        }
        (red, blue)
    }

    fn counts_for(&self, cell: Cell, team: Team) -> (u32, u32) {
        let (red, blue) = self.neighbor_counts(cell);
        match team {
            Team::Red => (red, blue),
            Team::Blue => (blue, red),
        }
    }
}

impl Default for Grid {
    fn default() -> Grid {
        Grid::new()
    }
}

/// In-bounds Moore neighbors of a cell (up to 26).
fn moore_neighbors(cell: Cell) -> impl Iterator<Item = Cell> {
    let [x, y, z] = cell;
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dz| {
                if dx == 0 && dy == 0 && dz == 0 {
                    return None;
                }
                let neighbor = [x + dx, y + dy, z + dz];
                Grid::in_bounds(neighbor).then_some(neighbor)
            })
        })
    })
}

/// What one generation pass did to the world.
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    pub died: Vec<u32>,
    pub respawned: Vec<u32>,
    pub respawns: TeamRespawns,
}

/// Runs one automaton generation over the world.
///
/// Survival uses the grid as marked at the start of the pass, so every
/// player is judged against the same configuration regardless of iteration
/// order. Deaths and respawns only apply afterwards.
pub fn run_generation(world: &mut World) -> GenerationOutcome {
    let mut outcome = GenerationOutcome::default();

    let mut ids: Vec<u32> = world.players.keys().copied().collect();
    ids.sort_unstable();

    // Mark occupancy and record each living player's cell.
    let mut grid = Grid::new();
    for &id in &ids {
        if let Some(player) = world.players.get_mut(&id) {
            if player.dead {
                continue;
            }
            let cell = world_to_cell(player.kin.position);
            player.cell = Some(cell);
            grid.set(cell, player.team);
        }
    }

    // Survival pass.
    for &id in &ids {
        let player = match world.players.get(&id) {
            Some(p) if !p.dead => p,
            _ => continue,
        };
        let cell = match player.cell {
            Some(c) => c,
            None => continue,
        };
        let (own, other) = grid.counts_for(cell, player.team);
        let dies = if other == 0 {
            !(2..=3).contains(&own)
        } else {
            own <= other
        };
        if dies {
            debug!(
                "Player {} dies at {:?} (own {}, other {})",
                id, cell, own, other
            );
            outcome.died.push(id);
        }
    }

    // Birth pass: empty cells bordering any living player, each visited once.
    let mut visited: HashSet<Cell> = HashSet::new();
    let mut claimed: HashSet<Cell> = HashSet::new();
    for &id in &ids {
        let player = match world.players.get(&id) {
            Some(p) if !p.dead => p,
            _ => continue,
        };
        let cell = match player.cell {
            Some(c) => c,
            None => continue,
        };
        for neighbor in moore_neighbors(cell) {
            if grid.get(neighbor).is_some() || !visited.insert(neighbor) {
                continue;
            }
            let (red, blue) = grid.neighbor_counts(neighbor);
            let team = if red == 3 && blue == 0 {
                Team::Red
            } else if blue == 3 && red == 0 {
                Team::Blue
            } else {
                continue;
            };
            if claimed.insert(neighbor) {
                outcome.respawns.of_mut(team).push(neighbor);
            }
        }
    }

    // Apply deaths before anyone respawns into the new points.
    for &id in &outcome.died {
        if let Some(player) = world.players.get_mut(&id) {
            player.dead = true;
        }
    }

    // Respawn pass covers players dead from earlier generations too.
    let mut taken: HashSet<Cell> = HashSet::new();
    for &id in &ids {
        let (team, from) = match world.players.get(&id) {
            Some(p) if p.dead => (p.team, p.cell.unwrap_or_default()),
            _ => continue,
        };
        let target = outcome
            .respawns
            .of(team)
            .iter()
            .copied()
            .filter(|c| !taken.contains(c))
            .min_by_key(|c| cell_distance(*c, from));
        if let Some(cell) = target {
            taken.insert(cell);
            if let Some(player) = world.players.get_mut(&id) {
                player.dead = false;
                player.cell = Some(cell);
                player.kin = Kinematics::at(cell_to_world(cell));
                outcome.respawned.push(id);
            }
        }
    }

    info!(
        "Generation: {} died, {} respawned, {} red / {} blue points",
        outcome.died.len(),
        outcome.respawned.len(),
        outcome.respawns.red.len(),
        outcome.respawns.blue.len()
    );
    outcome
}
