//! The driver loop: sets up a game, queries agents under a wall-clock
//! deadline, runs the resolver and meetings, and emits a result record
//! (spec.md §4.5).

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::instrument;

use crate::agent::Agent;
use crate::config::GameConfig;
use crate::map::{RulesCatalog, TaskDefinition};
use crate::observation::{
    generate_discussion_observation, generate_game_end_info, generate_game_start_info,
    generate_task_observation, generate_voting_observation, GameEndInfo, TaskPhaseObservation,
};
use crate::resolver::{self, Action};
use crate::state::{GameState, Phase, Player, PlayerId, RingBuffer, Role, TaskInstance, VoteChoice};

/// Runs a per-call deadline around `f` using a detached watcher thread and
/// `mpsc::Receiver::recv_timeout`, the in-process analogue of the teacher's
/// `ClientHandler::send_and_recv` (`TcpStream::set_read_timeout`).
/// `f` keeps running to completion even past the deadline; its result is
/// simply discarded once nobody is listening on the channel.
fn call_with_timeout<T: Send + 'static>(timeout: Duration, f: impl FnOnce() -> T + Send + 'static) -> Option<T> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).ok()
}

/// Drives one game from setup to `GAME_OVER`.
pub struct GameEngine {
    state: GameState,
    agents: BTreeMap<PlayerId, Arc<Mutex<Box<dyn Agent>>>>,
    agent_timeout: Duration,
}

impl GameEngine {
    /// `rng` seeds role assignment and task dealing; pass a sub-seed derived
    /// from the caller's master RNG to keep the whole run reproducible
    /// (spec.md §9 "Determinism"). Roles are assigned uniformly at random
    /// among seats; for role-balanced tournament lobbies use
    /// [`GameEngine::new_with_roles`] instead.
    pub fn new(
        config: GameConfig,
        catalog: Arc<RulesCatalog>,
        agents: BTreeMap<PlayerId, Box<dyn Agent>>,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<Self> {
        let player_ids: Vec<PlayerId> = agents.keys().cloned().collect();
        let roles = random_roles(&config, &player_ids, rng);
        Self::new_with_roles(config, catalog, agents, &roles, rng)
    }

    /// Like [`GameEngine::new`], but `roles` pins each seat's role instead
    /// of drawing it at random — the tournament runner uses this so a
    /// dealt "impostor slot" actually lands an impostor (spec.md §4.6).
    pub fn new_with_roles(
        config: GameConfig,
        catalog: Arc<RulesCatalog>,
        agents: BTreeMap<PlayerId, Box<dyn Agent>>,
        roles: &BTreeMap<PlayerId, Role>,
        rng: &mut ChaCha8Rng,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        catalog.validate()?;
        anyhow::ensure!(
            agents.len() as u32 == config.num_players,
            "agent count ({}) must match config.num_players ({})",
            agents.len(),
            config.num_players
        );
        anyhow::ensure!(
            roles.keys().collect::<std::collections::BTreeSet<_>>()
                == agents.keys().collect::<std::collections::BTreeSet<_>>(),
            "roles must be assigned for exactly the seated agents"
        );

        let player_ids: Vec<PlayerId> = agents.keys().cloned().collect();
        let state = setup_game_state(&config, catalog, &player_ids, roles, rng);
        let agents = agents
            .into_iter()
            .map(|(id, agent)| (id, Arc::new(Mutex::new(agent))))
            .collect();

        Ok(GameEngine {
            state,
            agents,
            agent_timeout: Duration::from_secs(config.agent_timeout_seconds),
        })
    }

    /// Runs the game to completion and returns its result record.
    #[instrument(skip(self), fields(num_players = self.agents.len()))]
    pub fn run(mut self) -> GameEndInfo {
        self.call_on_game_start();
        while self.state.phase != Phase::GameOver {
            self.run_round();
        }
        let result = generate_game_end_info(&self.state);
        self.call_on_game_end(&result);
        result
    }

    fn call_on_game_start(&mut self) {
        for id in self.state.ordered_player_ids() {
            let info = generate_game_start_info(&self.state, &id);
            let agent = self.agents[&id].clone();
            call_with_timeout(self.agent_timeout, move || {
                agent.lock().expect("agent mutex poisoned").on_game_start(&info)
            });
        }
    }

    fn call_on_game_end(&mut self, result: &GameEndInfo) {
        for id in self.state.ordered_player_ids() {
            let result = result.clone();
            let agent = self.agents[&id].clone();
            call_with_timeout(self.agent_timeout, move || {
                agent.lock().expect("agent mutex poisoned").on_game_end(&result)
            });
        }
    }

    #[instrument(skip(self), fields(round = self.state.round_number))]
    fn run_round(&mut self) {
        let queryable: Vec<PlayerId> = self
            .state
            .players
            .values()
            .filter(|p| p.alive || (p.is_ghost() && self.state.config.ghost_tasks_enabled))
            .map(|p| p.id.clone())
            .collect();

        let mut actions = BTreeMap::new();
        for id in queryable {
            actions.insert(id.clone(), self.query_task_phase(&id));
        }

        resolver::resolve_round(&mut self.state, actions);

        if self.state.phase == Phase::Discussion {
            self.run_meeting();
        }
    }

    fn query_task_phase(&self, id: &str) -> Action {
        let obs = generate_task_observation(&self.state, id);
        let agent = self.agents[id].clone();
        call_with_timeout(self.agent_timeout, move || {
            let obs = obs;
            agent.lock().expect("agent mutex poisoned").on_task_phase(&obs)
        })
        .unwrap_or_else(Action::wait)
    }

    fn run_meeting(&mut self) {
        let discussion_agents = self.agents.clone();
        let vote_agents = self.agents.clone();
        let timeout = self.agent_timeout;
        crate::meeting::run_meeting(
            &mut self.state,
            move |_state, obs| {
                let agent = discussion_agents[&obs.player_id].clone();
                let obs = obs.clone();
                call_with_timeout(timeout, move || {
                    agent.lock().expect("agent mutex poisoned").on_discussion(&obs)
                })
                .unwrap_or_default()
            },
            move |_state, obs| {
                let agent = vote_agents[&obs.player_id].clone();
                let obs = obs.clone();
                call_with_timeout(timeout, move || {
                    agent.lock().expect("agent mutex poisoned").on_vote(&obs)
                })
                .unwrap_or(VoteChoice::Skip)
            },
        );
    }
}

/// Assigns `config.num_impostors` seats out of `player_ids` to `Role::Impostor`
/// uniformly at random, the rest to `Role::Crewmate` (spec.md §4.5).
fn random_roles(
    config: &GameConfig,
    player_ids: &[PlayerId],
    rng: &mut ChaCha8Rng,
) -> BTreeMap<PlayerId, Role> {
    let mut shuffled = player_ids.to_vec();
    shuffled.shuffle(rng);
    shuffled
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let role = if i < config.num_impostors as usize {
                Role::Impostor
            } else {
                Role::Crewmate
            };
            (id, role)
        })
        .collect()
}

/// Deals tasks without replacement and places everyone at the spawn room,
/// given a fixed role for every seat (spec.md §4.5).
fn setup_game_state(
    config: &GameConfig,
    catalog: Arc<RulesCatalog>,
    player_ids: &[PlayerId],
    roles: &BTreeMap<PlayerId, Role>,
    rng: &mut ChaCha8Rng,
) -> GameState {
    let mut players = BTreeMap::new();
    for id in player_ids {
        let role = roles[id];
        players.insert(
            id.clone(),
            Player::new(id.clone(), role, catalog.map.spawn_room(), config.emergency_meetings_per_player),
        );
    }

    let mut tasks = BTreeMap::new();
    let mut movement_history = BTreeMap::new();
    let mut sighting_history = BTreeMap::new();
    for id in player_ids {
        if players[id].role == Role::Crewmate {
            tasks.insert(id.clone(), deal_tasks(&catalog, config, rng));
        }
        movement_history.insert(id.clone(), RingBuffer::with_capacity(config.memory_movement_cap));
        sighting_history.insert(id.clone(), RingBuffer::with_capacity(config.memory_sighting_cap));
    }

    GameState {
        catalog,
        config: *config,
        phase: Phase::Task,
        round_number: 0,
        players,
        tasks,
        bodies: Vec::new(),
        active_sabotage: None,
        sabotage_cooldown: 0,
        meeting_context: None,
        chat_history: Vec::new(),
        events_last_round: BTreeMap::new(),
        admin_table_snapshot: BTreeMap::new(),
        action_results: BTreeMap::new(),
        movement_history,
        sighting_history,
        meeting_history: Vec::new(),
        game_log: Vec::new(),
        winner: None,
        win_cause: None,
    }
}

/// Samples `tasks_per_crewmate` templates without replacement, ensuring
/// `visual_tasks_per_crewmate` of them are visual when the pool allows it
/// (spec.md §4.5).
fn deal_tasks(catalog: &RulesCatalog, config: &GameConfig, rng: &mut ChaCha8Rng) -> Vec<TaskInstance> {
    let (visual_defs, plain_defs): (Vec<&TaskDefinition>, Vec<&TaskDefinition>) =
        catalog.task_pool.iter().partition(|t| t.visual);

    let visual_count = (config.visual_tasks_per_crewmate as usize).min(visual_defs.len());
    let mut chosen: Vec<&TaskDefinition> = visual_defs
        .choose_multiple(rng, visual_count)
        .copied()
        .collect();

    let remaining_needed = (config.tasks_per_crewmate as usize).saturating_sub(chosen.len());
    let leftover: Vec<&TaskDefinition> = visual_defs
        .iter()
        .skip(visual_count)
        .chain(plain_defs.iter())
        .copied()
        .collect();
    chosen.extend(
        leftover
            .choose_multiple(rng, remaining_needed.min(leftover.len()))
            .copied(),
    );
    chosen.shuffle(rng);

    chosen
        .into_iter()
        .enumerate()
        .map(|(i, def)| TaskInstance {
            task_id: format!("task_{i}"),
            name: def.name.clone(),
            location: def.location.clone(),
            required: def.required_steps,
            progress: 0,
            visual: def.visual,
        })
        .collect()
}
