//! Schedules balanced matchups across agent classes ("teams"), runs each
//! lobby through the engine, and tracks Elo + per-team standings
//! (spec.md §4.6).

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::agent::{fallback_bot, Agent, FALLBACK_BOT_TEAM};
use crate::config::GameConfig;
use crate::engine::GameEngine;
use crate::map::RulesCatalog;
use crate::observation::GameEndInfo;
use crate::state::{PlayerId, Role, Winner};

/// Produces a fresh agent instance for one seat, seeded for determinism.
/// Teams register one of these rather than a single `Agent` value because a
/// team plays many lobbies concurrently and each lobby needs its own state.
pub type AgentFactory = Arc<dyn Fn(u64) -> Box<dyn Agent> + Send + Sync>;

/// One registered agent class competing in the tournament.
#[derive(Clone)]
pub struct TeamEntry {
    pub name: String,
    pub factory: AgentFactory,
}

impl TeamEntry {
    pub fn new(name: impl Into<String>, factory: AgentFactory) -> Self {
        TeamEntry { name: name.into(), factory }
    }
}

/// Tunables for a tournament run, layered on top of the per-game
/// [`GameConfig`] (spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct TournamentConfig {
    pub game_config: GameConfig,
    /// Target number of games each team plays (`G` in spec.md §4.6).
    pub games_per_team: u32,
    pub initial_elo: f64,
}

impl TournamentConfig {
    pub fn new(game_config: GameConfig, games_per_team: u32) -> Self {
        TournamentConfig {
            game_config,
            games_per_team,
            initial_elo: 1200.0,
        }
    }
}

#[derive(Debug, Clone)]
struct TeamStats {
    elo: f64,
    games: u32,
    wins: u32,
    losses: u32,
    as_impostor: u32,
    as_crewmate: u32,
}

impl TeamStats {
    fn new(initial_elo: f64) -> Self {
        TeamStats {
            elo: initial_elo,
            games: 0,
            wins: 0,
            losses: 0,
            as_impostor: 0,
            as_crewmate: 0,
        }
    }
}

/// One lobby's seat assignment: team name and pinned role per player id.
type Lobby = Vec<(PlayerId, String, AgentFactory, Role)>;

/// One completed game's standings-relevant outcome, handed to the
/// aggregator thread (spec.md §5 "Elo and stats updates must serialize
/// through a single aggregator").
struct LobbyResult {
    lobby_index: usize,
    seats: BTreeMap<PlayerId, (String, Role)>,
    end: GameEndInfo,
}

/// A row of `standings` (spec.md §4.6 "Persisted state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub rank: u32,
    pub team: String,
    pub elo: f64,
    pub win_rate: f64,
    pub games: u32,
    pub as_impostor: u32,
    pub as_crewmate: u32,
}

/// Schedules and runs a full tournament, grounded in the teacher's
/// `Evaluator::evaluate`/`launch_match`: one OS thread per running lobby,
/// results drained through a single `mpsc::channel` by the thread applying
/// Elo/stats updates.
pub struct TournamentRunner {
    config: TournamentConfig,
    catalog: Arc<RulesCatalog>,
    teams: Vec<TeamEntry>,
    rng: ChaCha8Rng,
}

impl TournamentRunner {
    pub fn new(config: TournamentConfig, catalog: Arc<RulesCatalog>, teams: Vec<TeamEntry>, seed: u64) -> anyhow::Result<Self> {
        config.game_config.validate()?;
        catalog.validate()?;
        anyhow::ensure!(!teams.is_empty(), "a tournament needs at least one team");
        Ok(TournamentRunner {
            config,
            catalog,
            teams,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Runs every scheduled lobby to completion and returns standings
    /// sorted by descending Elo.
    #[instrument(skip(self), fields(teams = self.teams.len(), games_per_team = self.config.games_per_team))]
    pub fn run(mut self) -> Vec<Standing> {
        let lobbies = self.deal_lobbies();
        info!(lobby_count = lobbies.len(), "dealt tournament lobbies");

        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::new();
        for (lobby_index, lobby) in lobbies.into_iter().enumerate() {
            let tx = tx.clone();
            let game_config = self.config.game_config;
            let catalog = self.catalog.clone();
            let lobby_seed = self.rng.next_u64();
            handles.push(std::thread::spawn(move || {
                let result = run_lobby(game_config, catalog, lobby, lobby_seed, lobby_index);
                let _ = tx.send(result);
            }));
        }
        drop(tx);

        let mut stats: BTreeMap<String, TeamStats> = self
            .teams
            .iter()
            .map(|t| (t.name.clone(), TeamStats::new(self.config.initial_elo)))
            .collect();

        // Elo updates are path-dependent on application order, so results
        // are buffered and sorted by lobby index rather than applied in
        // thread-completion order (spec.md "replays reproduce bitwise-identical
        // logs").
        let mut results: Vec<LobbyResult> = rx.into_iter().collect();
        results.sort_by_key(|r| r.lobby_index);
        for result in &results {
            apply_result(&mut stats, result);
        }
        for handle in handles {
            let _ = handle.join();
        }

        standings(stats)
    }

    /// Builds `imp_per_team`/`crew_per_team` copies of each team into two
    /// shuffled multisets and deals them into successive lobbies, filling
    /// any slot left over once a multiset is exhausted with the built-in
    /// fallback bot (spec.md §4.6).
    fn deal_lobbies(&mut self) -> Vec<Lobby> {
        let players = self.config.game_config.num_players as usize;
        let num_impostors = self.config.game_config.num_impostors as usize;
        let crew_per_lobby = players - num_impostors;
        let g = self.config.games_per_team as usize;

        let imp_per_team = (g * num_impostors).div_ceil(players);
        let crew_per_team = g.saturating_sub(imp_per_team);

        let mut impostor_pool: Vec<usize> = Vec::new();
        let mut crew_pool: Vec<usize> = Vec::new();
        for (idx, _) in self.teams.iter().enumerate() {
            impostor_pool.extend(std::iter::repeat(idx).take(imp_per_team));
            crew_pool.extend(std::iter::repeat(idx).take(crew_per_team));
        }
        impostor_pool.shuffle(&mut self.rng);
        crew_pool.shuffle(&mut self.rng);
        let mut impostor_pool: VecDeque<usize> = impostor_pool.into();
        let mut crew_pool: VecDeque<usize> = crew_pool.into();

        let num_lobbies = impostor_pool
            .len()
            .div_ceil(num_impostors.max(1))
            .max(crew_pool.len().div_ceil(crew_per_lobby.max(1)));

        let mut lobbies = Vec::new();
        for lobby_idx in 0..num_lobbies {
            let mut seats = Vec::new();
            for seat_idx in 0..num_impostors {
                let team_idx = impostor_pool.pop_front();
                seats.push(self.make_seat(team_idx, lobby_idx, seat_idx, Role::Impostor));
            }
            for seat_idx in 0..crew_per_lobby {
                let team_idx = crew_pool.pop_front();
                seats.push(self.make_seat(team_idx, lobby_idx, num_impostors + seat_idx, Role::Crewmate));
            }
            lobbies.push(seats);
        }
        lobbies
    }

    fn make_seat(&self, team_idx: Option<usize>, lobby_idx: usize, seat_idx: usize, role: Role) -> (PlayerId, String, AgentFactory, Role) {
        let player_id = format!("lobby{lobby_idx}_seat{seat_idx}");
        match team_idx {
            Some(idx) => (player_id, self.teams[idx].name.clone(), self.teams[idx].factory.clone(), role),
            None => (
                player_id,
                FALLBACK_BOT_TEAM.to_string(),
                Arc::new(fallback_bot) as AgentFactory,
                role,
            ),
        }
    }
}

fn run_lobby(game_config: GameConfig, catalog: Arc<RulesCatalog>, lobby: Lobby, seed: u64, lobby_index: usize) -> LobbyResult {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut agents: BTreeMap<PlayerId, Box<dyn Agent>> = BTreeMap::new();
    let mut roles: BTreeMap<PlayerId, Role> = BTreeMap::new();
    let mut seats: BTreeMap<PlayerId, (String, Role)> = BTreeMap::new();
    for (id, team, factory, role) in lobby {
        agents.insert(id.clone(), factory(rng.next_u64()));
        roles.insert(id.clone(), role);
        seats.insert(id, (team, role));
    }

    let engine = GameEngine::new_with_roles(game_config, catalog, agents, &roles, &mut rng)
        .expect("a lobby dealt by deal_lobbies always has matching seats/roles/agent counts");
    let end = engine.run();
    LobbyResult { lobby_index, seats, end }
}

/// Applies one lobby's outcome to the running per-team Elo/stats table.
/// The fallback bot never accrues stats or affects opponents' expected
/// score (spec.md §4.6: "the opponent average excludes self and fallback
/// bots").
fn apply_result(stats: &mut BTreeMap<String, TeamStats>, result: &LobbyResult) {
    let real_teams: Vec<&String> = result
        .seats
        .values()
        .map(|(team, _)| team)
        .filter(|team| team.as_str() != FALLBACK_BOT_TEAM)
        .collect();

    for (team, role) in result.seats.values() {
        if team.as_str() == FALLBACK_BOT_TEAM {
            continue;
        }
        let won = match result.end.winner {
            Winner::Crewmates => *role == Role::Crewmate,
            Winner::Impostors => *role == Role::Impostor,
        };

        let own_elo = stats.get(team).map(|s| s.elo).expect("every registered team has a stats row");
        let others: Vec<f64> = real_teams
            .iter()
            .filter(|t| t.as_str() != team.as_str())
            .map(|t| stats.get(t.as_str()).map(|s| s.elo).unwrap_or(own_elo))
            .collect();
        let opponent_avg = if others.is_empty() { own_elo } else { others.iter().sum::<f64>() / others.len() as f64 };

        let entry = stats.entry(team.clone()).or_insert_with(|| TeamStats::new(own_elo));
        let k = if entry.games < 10 { 32.0 } else { 16.0 };
        let expected = 1.0 / (1.0 + 10f64.powf((opponent_avg - entry.elo) / 400.0));
        let actual = if won { 1.0 } else { 0.0 };
        entry.elo += k * (actual - expected);
        entry.games += 1;
        if won {
            entry.wins += 1;
        } else {
            entry.losses += 1;
        }
        match role {
            Role::Impostor => entry.as_impostor += 1,
            Role::Crewmate => entry.as_crewmate += 1,
        }
    }
}

/// Produces the final `Standing` rows, sorted by descending Elo, ties
/// broken by team name for a stable order.
fn standings(stats: BTreeMap<String, TeamStats>) -> Vec<Standing> {
    let mut rows: Vec<(String, TeamStats)> = stats.into_iter().collect();
    rows.sort_by(|a, b| {
        b.1.elo
            .partial_cmp(&a.1.elo)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, (team, s))| Standing {
            rank: i as u32 + 1,
            team,
            elo: s.elo,
            win_rate: if s.games == 0 { 0.0 } else { f64::from(s.wins) / f64::from(s.games) },
            games: s.games,
            as_impostor: s.as_impostor,
            as_crewmate: s.as_crewmate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RandomAgent;
    use crate::map::{default_map, default_sabotage_catalog, default_task_pool};

    fn default_catalog(config: &GameConfig) -> Arc<RulesCatalog> {
        Arc::new(RulesCatalog {
            map: default_map(),
            task_pool: default_task_pool(),
            sabotage_catalog: default_sabotage_catalog(
                config.sabotage_fix_cost_critical,
                config.sabotage_fix_cost_disruptive,
            ),
        })
    }

    fn random_team(name: &str) -> TeamEntry {
        TeamEntry::new(name, Arc::new(|seed| Box::new(RandomAgent::new(seed)) as Box<dyn Agent>))
    }

    #[test]
    fn every_team_plays_games_per_team_games() {
        let game_config = GameConfig::default()
            .with_num_players(5)
            .with_num_impostors(1)
            .with_max_total_rounds(15);
        let catalog = default_catalog(&game_config);
        let config = TournamentConfig::new(game_config, 4);
        let teams = vec![random_team("alpha"), random_team("beta"), random_team("gamma")];
        let runner = TournamentRunner::new(config, catalog, teams, 11).unwrap();
        let standings = runner.run();

        assert_eq!(standings.len(), 3);
        for row in &standings {
            assert_eq!(row.games, 4);
            assert_eq!(row.as_impostor + row.as_crewmate, row.games);
        }
    }

    #[test]
    fn standings_are_sorted_by_descending_elo() {
        let game_config = GameConfig::default()
            .with_num_players(4)
            .with_num_impostors(1)
            .with_max_total_rounds(15);
        let catalog = default_catalog(&game_config);
        let config = TournamentConfig::new(game_config, 6);
        let teams = vec![random_team("alpha"), random_team("beta")];
        let runner = TournamentRunner::new(config, catalog, teams, 5).unwrap();
        let standings = runner.run();

        for pair in standings.windows(2) {
            assert!(pair[0].elo >= pair[1].elo);
        }
    }

    #[test]
    fn rejects_empty_team_list() {
        let game_config = GameConfig::default();
        let catalog = default_catalog(&game_config);
        let config = TournamentConfig::new(game_config, 4);
        assert!(TournamentRunner::new(config, catalog, Vec::new(), 1).is_err());
    }
}
