//! Per-player, information-asymmetric views over a [`GameState`] (spec.md
//! §4.2).
//!
//! The original implementation wraps a `GameState` in an
//! `ObservationGenerator(self.state)` object; here the state lives in
//! `GameEngine`; so this module is a set of free functions borrowing
//! `&GameState` rather than a struct wrapping owned state (SPEC_FULL.md §4).
//! Observation shapes are concrete record types per phase, not loosely typed
//! dictionaries (spec.md §9 "JSON-ish dynamic observations").

use std::collections::BTreeMap;

use crate::config::GameConfig;
use crate::map::Room;
use crate::state::{
    ActionResult, ChatMessage, GameState, MeetingTrigger, Player, PlayerId, Role, RoundLogEntry,
    Winner,
};

/// A crewmate or impostor's view of a single task.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub task_id: String,
    pub name: String,
    pub location: Room,
    pub required: u32,
    pub progress: u32,
    pub visual: bool,
}

fn task_view(task: &crate::state::TaskInstance) -> TaskView {
    TaskView {
        task_id: task.task_id.clone(),
        name: task.name.clone(),
        location: task.location.clone(),
        required: task.required,
        progress: task.progress,
        visual: task.visual,
    }
}

/// The shape of a player's task list, which changes with role and active
/// sabotage (spec.md §4.2: "A player's task list is hidden ... while `comms`
/// sabotage is active. Impostors receive their task list tagged as fake.").
#[derive(Debug, Clone)]
pub enum TaskListView {
    Real(Vec<TaskView>),
    /// An impostor's cosmetic task list; never contributes to task progress.
    Fake(Vec<TaskView>),
    Disabled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvailableActions {
    pub can_report: bool,
    pub can_emergency: bool,
    pub can_kill: bool,
    pub can_sabotage: bool,
    pub can_fix: bool,
}

pub fn available_actions(state: &GameState, player: &Player) -> AvailableActions {
    let can_report = state
        .bodies
        .iter()
        .any(|body| body.location == player.location);
    let critical_active = state
        .active_sabotage
        .as_ref()
        .is_some_and(|s| s.critical);
    let can_emergency = player.location == state.catalog.map.spawn_room()
        && player.emergency_meetings_remaining > 0
        && !critical_active;
    let can_kill = player.role == Role::Impostor && player.kill_cooldown == 0;
    let can_sabotage = player.role == Role::Impostor
        && state.active_sabotage.is_none()
        && state.sabotage_cooldown == 0;
    let can_fix = state
        .active_sabotage
        .as_ref()
        .is_some_and(|s| s.fix_required.contains_key(&player.location));
    AvailableActions {
        can_report,
        can_emergency,
        can_kill,
        can_sabotage,
        can_fix,
    }
}

#[derive(Debug, Clone)]
pub struct TaskObservation {
    pub player_id: PlayerId,
    pub round_number: u32,
    pub location: Room,
    /// Empty while blinded by an active `lights` sabotage.
    pub players_present: Vec<PlayerId>,
    pub bodies_present: Vec<PlayerId>,
    pub adjacent_rooms: Vec<Room>,
    pub tasks: TaskListView,
    pub teammates: Vec<PlayerId>,
    pub kill_cooldown: Option<u32>,
    pub available_actions: AvailableActions,
    pub previous_action_result: Option<ActionResult>,
    pub events: Vec<String>,
    /// Living-player count per room, set only for whoever called `use_admin`
    /// this round; cleared at the start of every round.
    pub admin_table: Option<BTreeMap<Room, u32>>,
    /// Present whenever a sabotage is in progress, regardless of blinding.
    pub active_sabotage: Option<SabotageStatus>,
    pub sabotage_cooldown: u32,
}

/// The subset of `ActiveSabotage` an agent needs to decide whether and where
/// to fix, without exposing internal bookkeeping.
#[derive(Debug, Clone)]
pub struct SabotageStatus {
    pub sabotage_type: String,
    pub critical: bool,
    pub countdown: Option<i32>,
    pub fix_progress: BTreeMap<Room, u32>,
    pub fix_required: BTreeMap<Room, u32>,
}

fn sabotage_status(state: &GameState) -> Option<SabotageStatus> {
    state.active_sabotage.as_ref().map(|s| SabotageStatus {
        sabotage_type: s.sabotage_type.clone(),
        critical: s.critical,
        countdown: s.countdown,
        fix_progress: s.fix_progress.clone(),
        fix_required: s.fix_required.clone(),
    })
}

#[derive(Debug, Clone)]
pub struct GhostObservation {
    pub player_id: PlayerId,
    pub round_number: u32,
    pub alive_roster: Vec<PlayerId>,
    pub dead_roster: Vec<PlayerId>,
    pub ejected_roster: Vec<PlayerId>,
    pub tasks: Vec<TaskView>,
    pub global_task_progress: f64,
}

#[derive(Debug, Clone)]
pub enum TaskPhaseObservation {
    Alive(TaskObservation),
    Ghost(GhostObservation),
}

fn rosters(state: &GameState) -> (Vec<PlayerId>, Vec<PlayerId>, Vec<PlayerId>) {
    let mut alive = Vec::new();
    let mut dead = Vec::new();
    let mut ejected = Vec::new();
    for player in state.players.values() {
        if player.ejected {
            ejected.push(player.id.clone());
        } else if player.alive {
            alive.push(player.id.clone());
        } else {
            dead.push(player.id.clone());
        }
    }
    (alive, dead, ejected)
}

fn task_list_view(state: &GameState, player: &Player) -> TaskListView {
    let tasks: Vec<TaskView> = state
        .tasks
        .get(&player.id)
        .into_iter()
        .flatten()
        .map(task_view)
        .collect();
    if player.role == Role::Impostor {
        return TaskListView::Fake(tasks);
    }
    let comms_active = state
        .active_sabotage
        .as_ref()
        .is_some_and(|s| s.sabotage_type == "comms");
    if comms_active {
        TaskListView::Disabled
    } else {
        TaskListView::Real(tasks)
    }
}

/// The task-phase observation for a living player, or the reduced ghost view
/// if the player is dead-but-not-ejected (spec.md §4.2 "Ghosts ... receive a
/// reduced view").
pub fn generate_task_observation(state: &GameState, player_id: &str) -> TaskPhaseObservation {
    let player = state
        .players
        .get(player_id)
        .expect("generate_task_observation called with unknown player id");

    if player.is_ghost() {
        let (alive, dead, ejected) = rosters(state);
        let tasks = state
            .tasks
            .get(player_id)
            .into_iter()
            .flatten()
            .map(task_view)
            .collect();
        return TaskPhaseObservation::Ghost(GhostObservation {
            player_id: player_id.to_string(),
            round_number: state.round_number,
            alive_roster: alive,
            dead_roster: dead,
            ejected_roster: ejected,
            tasks,
            global_task_progress: state.global_task_progress(),
        });
    }

    let blinded = state.is_blinded(player);
    let (players_present, bodies_present) = if blinded {
        (Vec::new(), Vec::new())
    } else {
        let players_present = state
            .players
            .values()
            .filter(|other| other.id != player.id && other.location == player.location && other.alive)
            .map(|other| other.id.clone())
            .collect();
        let bodies_present = state
            .bodies
            .iter()
            .filter(|body| body.location == player.location)
            .map(|body| body.player_id.clone())
            .collect();
        (players_present, bodies_present)
    };

    let adjacent_rooms = state
        .catalog
        .map
        .adjacent(&player.location)
        .cloned()
        .collect();

    let teammates = if player.role == Role::Impostor {
        state
            .players
            .values()
            .filter(|other| other.role == Role::Impostor && other.id != player.id)
            .map(|other| other.id.clone())
            .collect()
    } else {
        Vec::new()
    };
    let kill_cooldown = (player.role == Role::Impostor).then_some(player.kill_cooldown);

    TaskPhaseObservation::Alive(TaskObservation {
        player_id: player.id.clone(),
        round_number: state.round_number,
        location: player.location.clone(),
        players_present,
        bodies_present,
        adjacent_rooms,
        tasks: task_list_view(state, player),
        teammates,
        kill_cooldown,
        available_actions: available_actions(state, player),
        previous_action_result: state.action_results.get(player_id).cloned(),
        events: state
            .events_last_round
            .get(player_id)
            .cloned()
            .unwrap_or_default(),
        admin_table: state.admin_table_snapshot.get(player_id).cloned(),
        active_sabotage: sabotage_status(state),
        sabotage_cooldown: state.sabotage_cooldown,
    })
}

#[derive(Debug, Clone)]
pub struct MemorySummary {
    pub movements: Vec<crate::state::MovementEntry>,
    pub sightings: Vec<crate::state::SightingEntry>,
}

fn memory_summary(state: &GameState, player_id: &str) -> MemorySummary {
    MemorySummary {
        movements: state
            .movement_history
            .get(player_id)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default(),
        sightings: state
            .sighting_history
            .get(player_id)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default(),
    }
}

/// Discussion/voting observations omit room facts and include meeting
/// context, the full chat history, a memory summary, and rosters (spec.md
/// §4.2).
#[derive(Debug, Clone)]
pub struct DiscussionObservation {
    pub player_id: PlayerId,
    pub round_number: u32,
    pub trigger: MeetingTrigger,
    pub caller: PlayerId,
    pub body_found: Option<PlayerId>,
    pub chat_history: Vec<ChatMessage>,
    pub memory: MemorySummary,
    pub alive_roster: Vec<PlayerId>,
    pub dead_roster: Vec<PlayerId>,
    pub ejected_roster: Vec<PlayerId>,
    pub rotation: u32,
}

pub fn generate_discussion_observation(
    state: &GameState,
    player_id: &str,
    rotation: u32,
) -> DiscussionObservation {
    let ctx = state
        .meeting_context
        .as_ref()
        .expect("generate_discussion_observation called outside an active meeting");
    let (alive, dead, ejected) = rosters(state);
    DiscussionObservation {
        player_id: player_id.to_string(),
        round_number: state.round_number,
        trigger: ctx.trigger,
        caller: ctx.caller.clone(),
        body_found: ctx.body_found.clone(),
        chat_history: state.chat_history.clone(),
        memory: memory_summary(state, player_id),
        alive_roster: alive,
        dead_roster: dead,
        ejected_roster: ejected,
        rotation,
    }
}

#[derive(Debug, Clone)]
pub struct VotingObservation {
    pub player_id: PlayerId,
    pub round_number: u32,
    pub trigger: MeetingTrigger,
    pub caller: PlayerId,
    pub body_found: Option<PlayerId>,
    pub chat_history: Vec<ChatMessage>,
    pub memory: MemorySummary,
    pub alive_roster: Vec<PlayerId>,
    pub dead_roster: Vec<PlayerId>,
    pub ejected_roster: Vec<PlayerId>,
    /// Legal vote targets: every living player id, `skip` is always legal
    /// and therefore not listed here.
    pub eligible_targets: Vec<PlayerId>,
}

pub fn generate_voting_observation(state: &GameState, player_id: &str) -> VotingObservation {
    let ctx = state
        .meeting_context
        .as_ref()
        .expect("generate_voting_observation called outside an active meeting");
    let (alive, dead, ejected) = rosters(state);
    VotingObservation {
        player_id: player_id.to_string(),
        round_number: state.round_number,
        trigger: ctx.trigger,
        caller: ctx.caller.clone(),
        body_found: ctx.body_found.clone(),
        chat_history: state.chat_history.clone(),
        memory: memory_summary(state, player_id),
        eligible_targets: alive.clone(),
        alive_roster: alive,
        dead_roster: dead,
        ejected_roster: ejected,
    }
}

#[derive(Debug, Clone)]
pub struct GameStartInfo {
    pub player_id: PlayerId,
    pub role: Role,
    pub teammates: Vec<PlayerId>,
    pub map_adjacency: BTreeMap<Room, Vec<Room>>,
    pub roster: Vec<PlayerId>,
    pub tasks: Vec<TaskView>,
    pub config: GameConfig,
}

pub fn generate_game_start_info(state: &GameState, player_id: &str) -> GameStartInfo {
    let player = state
        .players
        .get(player_id)
        .expect("generate_game_start_info called with unknown player id");
    let teammates = if player.role == Role::Impostor {
        state
            .players
            .values()
            .filter(|other| other.role == Role::Impostor && other.id != player.id)
            .map(|other| other.id.clone())
            .collect()
    } else {
        Vec::new()
    };
    GameStartInfo {
        player_id: player.id.clone(),
        role: player.role,
        teammates,
        map_adjacency: state.catalog.map.adjacency_table(),
        roster: state.players.keys().cloned().collect(),
        tasks: state
            .tasks
            .get(player_id)
            .into_iter()
            .flatten()
            .map(task_view)
            .collect(),
        config: state.config,
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GameEndInfo {
    pub winner: Winner,
    pub win_cause: String,
    pub final_round: u32,
    pub roles: BTreeMap<PlayerId, Role>,
    pub movement_history: BTreeMap<PlayerId, Vec<crate::state::MovementEntry>>,
    pub sighting_history: BTreeMap<PlayerId, Vec<crate::state::SightingEntry>>,
    pub meeting_history: Vec<crate::state::MeetingRecord>,
    pub game_log: Vec<RoundLogEntry>,
}

pub fn generate_game_end_info(state: &GameState) -> GameEndInfo {
    GameEndInfo {
        winner: state.winner.expect("generate_game_end_info called before a winner was set"),
        win_cause: state
            .win_cause
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        final_round: state.round_number,
        roles: state
            .players
            .values()
            .map(|p| (p.id.clone(), p.role))
            .collect(),
        movement_history: state
            .movement_history
            .iter()
            .map(|(id, buf)| (id.clone(), buf.iter().cloned().collect()))
            .collect(),
        sighting_history: state
            .sighting_history
            .iter()
            .map(|(id, buf)| (id.clone(), buf.iter().cloned().collect()))
            .collect(),
        meeting_history: state.meeting_history.clone(),
        game_log: state.game_log.clone(),
    }
}
