//! The mutable record of a single game in progress (spec.md §3).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::map::{Room, RulesCatalog};

pub type PlayerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Crewmate,
    Impostor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Task,
    Discussion,
    Voting,
    GameOver,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub role: Role,
    pub alive: bool,
    pub ejected: bool,
    pub location: Room,
    pub emergency_meetings_remaining: u32,
    pub kill_cooldown: u32,
    pub last_action: String,
}

impl Player {
    pub fn new(id: PlayerId, role: Role, spawn_room: &str, emergency_meetings: u32) -> Self {
        Player {
            id,
            role,
            alive: true,
            ejected: false,
            location: spawn_room.to_string(),
            emergency_meetings_remaining: emergency_meetings,
            kill_cooldown: 0,
            last_action: "wait".to_string(),
        }
    }

    /// A ghost is dead but not ejected (spec.md §GLOSSARY).
    pub fn is_ghost(&self) -> bool {
        !self.alive && !self.ejected
    }
}

/// A crewmate's assigned task instance.
#[derive(Debug, Clone)]
pub struct TaskInstance {
    pub task_id: String,
    pub name: String,
    pub location: Room,
    pub required: u32,
    pub progress: u32,
    pub visual: bool,
}

impl TaskInstance {
    pub fn completed(&self) -> bool {
        self.progress >= self.required
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub player_id: PlayerId,
    pub location: Room,
}

#[derive(Debug, Clone)]
pub struct ActiveSabotage {
    pub sabotage_type: String,
    pub critical: bool,
    pub countdown: Option<i32>,
    pub fix_progress: BTreeMap<Room, u32>,
    pub fix_required: BTreeMap<Room, u32>,
}

impl ActiveSabotage {
    pub fn is_fully_fixed(&self) -> bool {
        self.fix_required
            .iter()
            .all(|(room, required)| self.fix_progress.get(room).copied().unwrap_or(0) >= *required)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: PlayerId,
    pub rotation: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingTrigger {
    BodyReport,
    EmergencyMeeting,
}

/// The meeting currently in progress (installed by `resolve_round`'s step 7,
/// consumed by `meeting::run_meeting`).
#[derive(Debug, Clone)]
pub struct MeetingContext {
    pub trigger: MeetingTrigger,
    pub caller: PlayerId,
    pub body_found: Option<PlayerId>,
    pub body_location: Option<Room>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoteChoice {
    Player(PlayerId),
    Skip,
}

/// An archived, completed meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub trigger: MeetingTrigger,
    pub caller: PlayerId,
    pub body_found: Option<PlayerId>,
    pub transcript: Vec<ChatMessage>,
    pub votes: BTreeMap<PlayerId, VoteChoice>,
    pub ejected_player: Option<PlayerId>,
    /// `None` when nobody was ejected, or when `confirm_ejects` is false.
    pub role_revealed: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub reason: Option<String>,
}

impl ActionResult {
    pub fn ok(action: impl Into<String>) -> Self {
        ActionResult {
            action: action.into(),
            success: true,
            reason: None,
        }
    }

    pub fn fail(action: impl Into<String>, reason: impl Into<String>) -> Self {
        ActionResult {
            action: action.into(),
            success: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementEntry {
    pub round: u32,
    pub location: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingEntry {
    pub round: u32,
    pub observed_id: PlayerId,
    pub location: Room,
    pub observed_last_action: String,
}

/// A fixed-capacity FIFO used for the per-player movement/sighting memories
/// (spec.md §3: "bounded ring buffers of configurable caps").
#[derive(Debug, Clone, Default)]
pub struct RingBuffer<T> {
    cap: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(cap: usize) -> Self {
        RingBuffer {
            cap,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The aggregate mutable state of one game in progress.
pub struct GameState {
    pub catalog: Arc<RulesCatalog>,
    pub config: GameConfig,
    pub phase: Phase,
    pub round_number: u32,

    pub players: BTreeMap<PlayerId, Player>,
    /// Per-player task instances; only crewmates (and ghosts, if
    /// ghost-tasks are enabled) have real entries, impostors get a
    /// cosmetic/fake list generated by the observation layer instead.
    pub tasks: BTreeMap<PlayerId, Vec<TaskInstance>>,

    pub bodies: Vec<Body>,
    pub active_sabotage: Option<ActiveSabotage>,
    pub sabotage_cooldown: u32,

    pub meeting_context: Option<MeetingContext>,
    pub chat_history: Vec<ChatMessage>,

    /// Events generated for each player during the last resolved round.
    pub events_last_round: BTreeMap<PlayerId, Vec<String>>,
    pub admin_table_snapshot: BTreeMap<PlayerId, BTreeMap<Room, u32>>,
    pub action_results: BTreeMap<PlayerId, ActionResult>,

    pub movement_history: BTreeMap<PlayerId, RingBuffer<MovementEntry>>,
    pub sighting_history: BTreeMap<PlayerId, RingBuffer<SightingEntry>>,
    pub meeting_history: Vec<MeetingRecord>,

    pub game_log: Vec<RoundLogEntry>,

    pub winner: Option<Winner>,
    pub win_cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Crewmates,
    Impostors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundLogEntry {
    pub round: u32,
    pub results: BTreeMap<PlayerId, ActionResult>,
}

impl GameState {
    pub fn living_crewmates(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.alive && p.role == Role::Crewmate)
            .count()
    }

    pub fn living_impostors(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.alive && p.role == Role::Impostor)
            .count()
    }

    /// Sum of `min(progress, required)` over crewmate tasks, divided by the
    /// sum of `required`; `0.0` if there is no denominator (spec.md §4.2).
    pub fn global_task_progress(&self) -> f64 {
        let mut total = 0u32;
        let mut done = 0u32;
        for (pid, player) in &self.players {
            if player.role != Role::Crewmate {
                continue;
            }
            if let Some(tasks) = self.tasks.get(pid) {
                for task in tasks {
                    total += task.required;
                    done += task.progress.min(task.required);
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            f64::from(done) / f64::from(total)
        }
    }

    pub fn is_blinded(&self, player: &Player) -> bool {
        player.role == Role::Crewmate
            && self
                .active_sabotage
                .as_ref()
                .is_some_and(|s| s.sabotage_type == "lights")
    }

    pub fn ordered_player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().cloned().collect()
    }
}
