use crate::error::ValidationError;
use crate::snake::{MoveOutcome, Snake};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use snake_shared::{Cell, Direction, GameConfig, Grid, RoundStatus, Snapshot};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// What happened during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Move outcome of every snake that was alive after forfeits
    pub outcomes: BTreeMap<u32, MoveOutcome>,
    pub forfeited: Vec<u32>,
    pub status: RoundStatus,
}

impl TickReport {
    /// Players that ate this tick
    pub fn eaters(&self) -> impl Iterator<Item = u32> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| **outcome == MoveOutcome::AteFood)
            .map(|(id, _)| *id)
    }
}

/// Authoritative state of one round
///
/// Only the server loop mutates it. Inputs are staged on the snakes and
/// take effect at the next [`GameState::advance`], so every snapshot is taken
/// at a tick boundary.
#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    grid: Grid,
    tick: u64,
    status: RoundStatus,
    snakes: BTreeMap<u32, Snake>,
    food: Option<Cell>,
    forfeits: BTreeSet<u32>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            grid: config.grid(),
            config,
            tick: 0,
            status: RoundStatus::WaitingForPlayers,
            snakes: BTreeMap::new(),
            food: None,
            forfeits: BTreeSet::new(),
            rng,
        }
    }

    /// Number of ticks advanced so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    /// Current food cell, `None` before the round starts or on a full board
    pub fn food(&self) -> Option<Cell> {
        self.food
    }

    /// Snake of a seated player, dead or alive
    pub fn snake(&self, player_id: u32) -> Option<&Snake> {
        self.snakes.get(&player_id)
    }

    /// Players seated, including any that died or forfeited
    pub fn player_count(&self) -> usize {
        self.snakes.len()
    }

    /// Ids of live snakes in ascending order
    pub fn alive_players(&self) -> Vec<u32> {
        self.snakes
            .values()
            .filter(|s| s.is_alive())
            .map(|s| s.player_id)
            .collect()
    }

    /// Seats a player at their configured or computed spawn
    pub fn add_player(&mut self, player_id: u32) {
        let spawn = self.config.spawn_for(player_id);
        let snake = Snake::new(
            player_id,
            spawn.head,
            spawn.heading,
            self.config.initial_length,
            &self.grid,
        );

        info!(
            "Added player {} at {} heading {}",
            player_id, spawn.head, spawn.heading
        );
        self.snakes.insert(player_id, snake);
    }

    pub fn remove_player(&mut self, player_id: u32) {
        if self.snakes.remove(&player_id).is_some() {
            info!("Removed player {}", player_id);
        }
    }

    /// Leaves the waiting phase and places the first food
    pub fn start_round(&mut self) {
        self.status = RoundStatus::Running;

        let configured = self
            .config
            .food
            .filter(|cell| self.is_free(*cell, &self.live_cells()));
        self.food = match configured {
            Some(cell) => Some(cell),
            None => self.random_free_cell(),
        };

        match self.food {
            Some(food) => info!(
                "Round started with {} players, food at {}",
                self.player_count(),
                food
            ),
            None => {
                warn!("Round started on a full board");
                self.status = RoundStatus::Ended { winner: None };
            }
        }
    }

    /// Stages a heading; applied at the next tick, latest wins
    pub fn stage_heading(
        &mut self,
        player_id: u32,
        direction: Direction,
    ) -> Result<(), ValidationError> {
        self.snakes
            .get_mut(&player_id)
            .ok_or(ValidationError::UnknownPlayer(player_id))?
            .set_heading(direction)
    }

    /// Schedules a disconnected player's snake to die at the next tick
    pub fn forfeit(&mut self, player_id: u32) -> Result<(), ValidationError> {
        if !self.snakes.contains_key(&player_id) {
            return Err(ValidationError::UnknownPlayer(player_id));
        }
        self.forfeits.insert(player_id);
        Ok(())
    }

    /// Advances the simulation by one step
    ///
    /// Returns `None` unless the round is running.
    pub fn advance(&mut self) -> Option<TickReport> {
        if self.status != RoundStatus::Running {
            return None;
        }
        self.tick += 1;

        let mut forfeited = Vec::new();
        for player_id in std::mem::take(&mut self.forfeits) {
            if let Some(snake) = self.snakes.get_mut(&player_id) {
                if snake.is_alive() {
                    snake.kill();
                    warn!("Player {} forfeited at tick {}", player_id, self.tick);
                    forfeited.push(player_id);
                }
            }
        }

        let planned: BTreeMap<u32, Option<Cell>> = self
            .snakes
            .values()
            .filter(|s| s.is_alive())
            .map(|s| (s.player_id, s.next_head(&self.grid)))
            .collect();
        let head_on = self.find_head_on(&planned);

        // Bodies as they stand before anyone moves. A tail is free this tick
        // when its snake moves without eating.
        let mut owners: HashMap<Cell, u32> = HashMap::new();
        for (player_id, next) in &planned {
            let snake = &self.snakes[player_id];
            let eating = next.is_some() && *next == self.food;
            let keep = if eating { snake.len() } else { snake.len() - 1 };
            for cell in snake.cells().take(keep) {
                owners.insert(*cell, *player_id);
            }
        }

        let mut outcomes = BTreeMap::new();
        for player_id in planned.keys() {
            let Some(snake) = self.snakes.get_mut(player_id) else {
                continue;
            };

            if head_on.contains(player_id) {
                snake.kill();
                outcomes.insert(*player_id, MoveOutcome::HitOther);
                continue;
            }

            let occupied: HashSet<Cell> = owners
                .iter()
                .filter(|(_, owner)| *owner != player_id)
                .map(|(cell, _)| *cell)
                .collect();

            match snake.advance(&self.grid, self.food, &occupied) {
                Ok(outcome) => {
                    outcomes.insert(*player_id, outcome);
                }
                Err(e) => debug!("Skipping player {}: {}", player_id, e),
            }
        }

        for (player_id, outcome) in &outcomes {
            if outcome.is_fatal() {
                info!(
                    "Player {} died at tick {}: {:?}",
                    player_id, self.tick, outcome
                );
            }
        }

        let ate = outcomes.values().any(|o| *o == MoveOutcome::AteFood);
        if ate {
            self.food = self.random_free_cell();
            if self.food.is_none() {
                info!("Board is full at tick {}, round is a draw", self.tick);
                self.status = RoundStatus::Ended { winner: None };
            }
        }

        if self.status == RoundStatus::Running {
            self.check_round_end();
        }

        debug!(
            "Tick {}: {} alive, food at {:?}",
            self.tick,
            self.alive_players().len(),
            self.food
        );

        Some(TickReport {
            tick: self.tick,
            outcomes,
            forfeited,
            status: self.status,
        })
    }

    /// Copy of the current state for publishing
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            snakes: self.snakes.values().map(Snake::to_state).collect(),
            food: self.food,
            status: self.status,
        }
    }

    /// Players that must die together this tick: heads landing on the same
    /// cell, or two heads swapping places.
    fn find_head_on(&self, planned: &BTreeMap<u32, Option<Cell>>) -> BTreeSet<u32> {
        let mut by_target: HashMap<Cell, Vec<u32>> = HashMap::new();
        for (player_id, next) in planned {
            if let Some(cell) = next {
                by_target.entry(*cell).or_default().push(*player_id);
            }
        }

        let mut doomed: BTreeSet<u32> = by_target
            .values()
            .filter(|ids| ids.len() > 1)
            .flatten()
            .copied()
            .collect();

        for (a, next_a) in planned {
            for (b, next_b) in planned.range(a + 1..) {
                let head_a = self.snakes[a].head();
                let head_b = self.snakes[b].head();
                if *next_a == Some(head_b) && *next_b == Some(head_a) {
                    doomed.insert(*a);
                    doomed.insert(*b);
                }
            }
        }

        doomed
    }

    fn check_round_end(&mut self) {
        let alive = self.alive_players();
        // A solo round runs until the only snake dies
        let threshold = if self.config.players > 1 { 1 } else { 0 };
        if alive.len() > threshold {
            return;
        }

        let winner = if alive.len() == 1 { Some(alive[0]) } else { None };
        self.status = RoundStatus::Ended { winner };
        match winner {
            Some(player_id) => info!("Round over at tick {}: player {} wins", self.tick, player_id),
            None => info!("Round over at tick {}: draw", self.tick),
        }
    }

    fn live_cells(&self) -> HashSet<Cell> {
        self.snakes
            .values()
            .filter(|s| s.is_alive())
            .flat_map(|s| s.cells().copied())
            .collect()
    }

    fn is_free(&self, cell: Cell, live: &HashSet<Cell>) -> bool {
        self.grid.in_bounds(cell) && !self.grid.is_blocked(cell) && !live.contains(&cell)
    }

    /// Uniform choice among cells holding neither a live snake nor an obstacle
    fn random_free_cell(&mut self) -> Option<Cell> {
        let live = self.live_cells();
        let free: Vec<Cell> = self
            .grid
            .cells()
            .filter(|cell| self.is_free(*cell, &live))
            .collect();
        free.choose(&mut self.rng).copied()
    }
}
