//! The action resolver: a pure transition function `(state, actions) ->
//! state'` advancing a game by exactly one round (spec.md §4.3).
//!
//! `resolve_round` is decomposed into one private function per numbered
//! phase, mirroring the teacher's `Evaluator::evaluate` (a handful of
//! numbered steps, each delegated to a small private method) rather than one
//! long procedure.

use std::collections::{BTreeMap, BTreeSet};

use crate::map::Room;
use crate::state::{
    ActionResult, ActiveSabotage, Body, GameState, MeetingContext, MeetingTrigger, Phase, Player,
    PlayerId, Role, RoundLogEntry, Winner,
};

/// The room in which `use_admin` is legal. Fixed by the canonical map
/// (SPEC_FULL.md §3); not a catalog-level concept because no other room
/// plays this role.
const ADMIN_ROOM: &str = "Admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionLabel {
    Move,
    DoTask,
    FakeTask,
    Kill,
    Report,
    CallEmergency,
    Sabotage,
    FixSabotage,
    UseAdmin,
    Wait,
}

impl ActionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLabel::Move => "move",
            ActionLabel::DoTask => "do_task",
            ActionLabel::FakeTask => "fake_task",
            ActionLabel::Kill => "kill",
            ActionLabel::Report => "report",
            ActionLabel::CallEmergency => "call_emergency",
            ActionLabel::Sabotage => "sabotage",
            ActionLabel::FixSabotage => "fix_sabotage",
            ActionLabel::UseAdmin => "use_admin",
            ActionLabel::Wait => "wait",
        }
    }
}

/// A tagged action record (spec.md §4.3): a label plus an optional target,
/// whose meaning depends on the label (room name for `move`, task id for
/// `do_task`, player id for `kill`, sabotage name for `sabotage`, etc.).
///
/// Malformed agent replies (missing label, wrong shape) are not represented
/// here: the `Agent` boundary in `agent.rs`/`engine.rs` collapses those to
/// `Action::wait()` before the resolver ever sees them, matching spec.md
/// §7's `AgentBadOutput -> wait` rule.
#[derive(Debug, Clone)]
pub struct Action {
    pub label: ActionLabel,
    pub target: Option<String>,
}

impl Action {
    pub fn wait() -> Self {
        Action {
            label: ActionLabel::Wait,
            target: None,
        }
    }

    pub fn with_target(label: ActionLabel, target: impl Into<String>) -> Self {
        Action {
            label,
            target: Some(target.into()),
        }
    }

    pub fn without_target(label: ActionLabel) -> Self {
        Action { label, target: None }
    }
}

mod validate {
    use super::*;

    /// Validates one player's submitted action against spec.md §4.3.1,
    /// returning the accepted action (possibly downgraded to `wait`) and the
    /// `ActionResult` to record.
    pub fn validate_one(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        if player.is_ghost() {
            return validate_ghost(state, player, action);
        }
        validate_living(state, player, action)
    }

    fn validate_ghost(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        // Design note (spec.md §9, ghost-task semantics open question):
        // ghosts may always move; may do_task iff ghost_tasks_enabled;
        // everything else fails.
        match action.label {
            ActionLabel::Move => validate_move(state, player, action),
            ActionLabel::DoTask if state.config.ghost_tasks_enabled => {
                validate_do_task(state, player, action)
            }
            ActionLabel::Wait => (Action::wait(), ActionResult::ok("wait")),
            _ => (
                Action::wait(),
                ActionResult::fail(action.label.as_str(), "ghosts may only move or wait"),
            ),
        }
    }

    fn validate_living(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        match action.label {
            ActionLabel::Wait => (Action::wait(), ActionResult::ok("wait")),
            ActionLabel::Move => validate_move(state, player, action),
            ActionLabel::DoTask => validate_do_task(state, player, action),
            ActionLabel::FakeTask => {
                if player.role == Role::Impostor {
                    (action.clone(), ActionResult::ok("fake_task"))
                } else {
                    (
                        Action::wait(),
                        ActionResult::fail("fake_task", "role mismatch"),
                    )
                }
            }
            ActionLabel::Kill => validate_kill(state, player, action),
            ActionLabel::Report => {
                let has_body = state.bodies.iter().any(|b| b.location == player.location);
                if has_body {
                    (action.clone(), ActionResult::ok("report"))
                } else {
                    (Action::wait(), ActionResult::fail("report", "no body"))
                }
            }
            ActionLabel::CallEmergency => validate_call_emergency(state, player),
            ActionLabel::Sabotage => validate_sabotage(state, player, action),
            ActionLabel::FixSabotage => validate_fix_sabotage(state, player),
            ActionLabel::UseAdmin => {
                if player.location == ADMIN_ROOM {
                    (action.clone(), ActionResult::ok("use_admin"))
                } else {
                    (
                        Action::wait(),
                        ActionResult::fail("use_admin", "wrong room"),
                    )
                }
            }
        }
    }

    fn validate_move(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        match &action.target {
            Some(target) if state.catalog.map.is_adjacent(&player.location, target) => {
                (action.clone(), ActionResult::ok("move"))
            }
            _ => (Action::wait(), ActionResult::fail("move", "invalid target")),
        }
    }

    fn validate_do_task(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        if player.role != Role::Crewmate {
            return (
                Action::wait(),
                ActionResult::fail("do_task", "role mismatch"),
            );
        }
        let Some(target) = &action.target else {
            return (Action::wait(), ActionResult::fail("do_task", "not owned"));
        };
        let Some(task) = state
            .tasks
            .get(&player.id)
            .and_then(|tasks| tasks.iter().find(|t| &t.task_id == target))
        else {
            return (Action::wait(), ActionResult::fail("do_task", "not owned"));
        };
        if task.completed() {
            return (
                Action::wait(),
                ActionResult::fail("do_task", "already done"),
            );
        }
        if task.location != player.location {
            return (Action::wait(), ActionResult::fail("do_task", "wrong room"));
        }
        (action.clone(), ActionResult::ok("do_task"))
    }

    fn validate_kill(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        if player.role != Role::Impostor {
            return (Action::wait(), ActionResult::fail("kill", "role mismatch"));
        }
        if player.kill_cooldown != 0 {
            return (Action::wait(), ActionResult::fail("kill", "cooldown"));
        }
        let Some(target_id) = &action.target else {
            return (Action::wait(), ActionResult::fail("kill", "invalid target"));
        };
        let Some(target) = state.players.get(target_id) else {
            return (Action::wait(), ActionResult::fail("kill", "invalid target"));
        };
        if !target.alive {
            return (Action::wait(), ActionResult::fail("kill", "invalid target"));
        }
        if target.role == Role::Impostor {
            return (Action::wait(), ActionResult::fail("kill", "teammate"));
        }
        (action.clone(), ActionResult::ok("kill"))
    }

    fn validate_call_emergency(state: &GameState, player: &Player) -> (Action, ActionResult) {
        if player.location != state.catalog.map.spawn_room() {
            return (
                Action::wait(),
                ActionResult::fail("call_emergency", "wrong room"),
            );
        }
        if player.emergency_meetings_remaining == 0 {
            return (
                Action::wait(),
                ActionResult::fail("call_emergency", "none left"),
            );
        }
        if state.active_sabotage.as_ref().is_some_and(|s| s.critical) {
            return (
                Action::wait(),
                ActionResult::fail("call_emergency", "critical active"),
            );
        }
        (
            Action::without_target(ActionLabel::CallEmergency),
            ActionResult::ok("call_emergency"),
        )
    }

    fn validate_sabotage(state: &GameState, player: &Player, action: &Action) -> (Action, ActionResult) {
        if player.role != Role::Impostor {
            return (
                Action::wait(),
                ActionResult::fail("sabotage", "role mismatch"),
            );
        }
        if state.active_sabotage.is_some() {
            return (
                Action::wait(),
                ActionResult::fail("sabotage", "already active"),
            );
        }
        if state.sabotage_cooldown != 0 {
            return (Action::wait(), ActionResult::fail("sabotage", "cooldown"));
        }
        match &action.target {
            Some(target) if state.catalog.sabotage_catalog.contains_key(target) => {
                (action.clone(), ActionResult::ok("sabotage"))
            }
            _ => (Action::wait(), ActionResult::fail("sabotage", "unknown")),
        }
    }

    fn validate_fix_sabotage(state: &GameState, player: &Player) -> (Action, ActionResult) {
        let Some(sabotage) = &state.active_sabotage else {
            return (
                Action::wait(),
                ActionResult::fail("fix_sabotage", "no sabotage"),
            );
        };
        if !sabotage.fix_required.contains_key(&player.location) {
            return (
                Action::wait(),
                ActionResult::fail("fix_sabotage", "wrong room"),
            );
        }
        (
            Action::without_target(ActionLabel::FixSabotage),
            ActionResult::ok("fix_sabotage"),
        )
    }
}

/// Advances `state` by exactly one round given a bag of submitted actions,
/// keyed by player id. Missing ids default to `wait` with a successful
/// result (spec.md §4.3 step 3). No-ops once `state.winner` is set.
pub fn resolve_round(state: &mut GameState, actions: BTreeMap<PlayerId, Action>) {
    if state.winner.is_some() {
        return;
    }

    step0_reset(state);
    step1_cooldowns(state);
    if step2_sabotage_countdown(state) {
        return;
    }

    let validated = step3_validate(state, actions);
    step4_movement(state, &validated);
    step5_kills(state, &validated);
    if check_win_condition(state) {
        step13_log(state, &validated);
        return;
    }

    step6_tasks(state, &validated);
    if check_win_condition(state) {
        step13_log(state, &validated);
        return;
    }

    if step7_meetings(state, &validated) {
        return;
    }

    step8_sabotage_trigger(state, &validated);
    step9_fix(state, &validated);
    step10_admin(state, &validated);
    step11_last_action_fill(state, &validated);
    step12_sighting_history(state);
    step13_log(state, &validated);
    check_win_condition(state);
}

fn step0_reset(state: &mut GameState) {
    state.events_last_round.clear();
    state.admin_table_snapshot.clear();
    state.action_results.clear();
    state.round_number += 1;
}

fn step1_cooldowns(state: &mut GameState) {
    for player in state.players.values_mut() {
        if player.kill_cooldown > 0 {
            player.kill_cooldown -= 1;
        }
    }
    if state.sabotage_cooldown > 0 {
        state.sabotage_cooldown -= 1;
    }
}

/// Returns `true` if the game ended this step.
fn step2_sabotage_countdown(state: &mut GameState) -> bool {
    let Some(sabotage) = &mut state.active_sabotage else {
        return false;
    };
    let Some(countdown) = &mut sabotage.countdown else {
        return false;
    };
    *countdown -= 1;
    if *countdown <= 0 {
        let sabotage_type = sabotage.sabotage_type.clone();
        state.winner = Some(Winner::Impostors);
        state.win_cause = Some(format!("sabotage_{sabotage_type}"));
        state.phase = Phase::GameOver;
        return true;
    }
    false
}

fn step3_validate(state: &mut GameState, mut actions: BTreeMap<PlayerId, Action>) -> BTreeMap<PlayerId, Action> {
    let mut validated = BTreeMap::new();
    let ids: Vec<PlayerId> = state.players.keys().cloned().collect();
    for id in ids {
        let action = actions.remove(&id).unwrap_or_else(Action::wait);
        let player = &state.players[&id];
        let (accepted, result) = validate::validate_one(state, player, &action);
        validated.insert(id.clone(), accepted);
        state.action_results.insert(id, result);
    }
    validated
}

fn step4_movement(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    let movers: BTreeMap<PlayerId, (Room, Room)> = validated
        .iter()
        .filter(|(_, action)| action.label == ActionLabel::Move)
        .map(|(id, action)| {
            let origin = state.players[id].location.clone();
            let target = action.target.clone().expect("validated move has a target");
            (id.clone(), (origin, target))
        })
        .collect();

    for (id, (_, target)) in &movers {
        let player = state.players.get_mut(id).expect("mover exists");
        player.location = target.clone();
        player.last_action = "moving".to_string();
        state
            .movement_history
            .entry(id.clone())
            .or_insert_with(|| crate::state::RingBuffer::with_capacity(state.config.memory_movement_cap))
            .push(crate::state::MovementEntry {
                round: state.round_number,
                location: target.clone(),
            });
    }

    let non_movers: Vec<PlayerId> = state
        .players
        .keys()
        .filter(|id| !movers.contains_key(*id))
        .cloned()
        .collect();

    for (mover_id, (origin, target)) in &movers {
        for obs_id in &non_movers {
            let obs_location = state.players[obs_id].location.clone();
            if &obs_location == origin {
                push_event(state, obs_id, format!("{mover_id} left toward {target}"));
            }
            if &obs_location == target {
                push_event(state, obs_id, format!("{mover_id} arrived from {origin}"));
            }
        }
    }

    let mover_ids: Vec<PlayerId> = movers.keys().cloned().collect();
    for (i, a) in mover_ids.iter().enumerate() {
        let (origin_a, target_a) = &movers[a];
        for b in &mover_ids[i + 1..] {
            let (origin_b, target_b) = &movers[b];
            if origin_a == target_b && target_a == origin_b {
                push_event(state, a, format!("passed {b}"));
                push_event(state, b, format!("passed {a}"));
            }
        }
    }
}

fn push_event(state: &mut GameState, player_id: &str, event: String) {
    state
        .events_last_round
        .entry(player_id.to_string())
        .or_default()
        .push(event);
}

fn step5_kills(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    let killers: Vec<(PlayerId, PlayerId)> = validated
        .iter()
        .filter(|(_, action)| action.label == ActionLabel::Kill)
        .map(|(id, action)| (id.clone(), action.target.clone().expect("validated kill has a target")))
        .collect();

    for (killer_id, victim_id) in killers {
        let killer_loc = state.players[&killer_id].location.clone();
        let victim_alive = state.players[&victim_id].alive;
        let victim_loc = state.players[&victim_id].location.clone();
        if !victim_alive || victim_loc != killer_loc {
            state.action_results.insert(
                killer_id,
                ActionResult::fail("kill", "target not in room after movement"),
            );
            continue;
        }

        let witnesses: Vec<PlayerId> = state
            .players
            .values()
            .filter(|p| {
                p.id != killer_id
                    && p.id != victim_id
                    && p.alive
                    && p.location == killer_loc
                    && !state.is_blinded(p)
            })
            .map(|p| p.id.clone())
            .collect();

        {
            let victim = state.players.get_mut(&victim_id).expect("victim exists");
            victim.alive = false;
        }
        state.bodies.push(Body {
            player_id: victim_id.clone(),
            location: killer_loc,
        });
        {
            let killer = state.players.get_mut(&killer_id).expect("killer exists");
            killer.kill_cooldown = state.config.kill_cooldown;
        }
        for witness in witnesses {
            push_event(state, &witness, format!("{victim_id} was killed!"));
        }
        state.action_results.insert(killer_id, ActionResult::ok("kill"));
    }
}

fn step6_tasks(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    for (id, action) in validated {
        match action.label {
            ActionLabel::DoTask => {
                let target = action.target.clone().expect("validated do_task has a target");
                let player_loc = state.players[id].location.clone();
                let Some(tasks) = state.tasks.get_mut(id) else {
                    continue;
                };
                let Some(task) = tasks.iter_mut().find(|t| t.task_id == target) else {
                    continue;
                };
                let was_complete = task.completed();
                task.progress += 1;
                let newly_completed = !was_complete && task.completed();
                let visual = task.visual;
                let name = task.name.clone();
                if newly_completed && visual {
                    let witnesses: Vec<PlayerId> = state
                        .players
                        .values()
                        .filter(|p| {
                            p.id != *id && p.alive && p.location == player_loc && !state.is_blinded(p)
                        })
                        .map(|p| p.id.clone())
                        .collect();
                    for witness in witnesses {
                        push_event(state, &witness, format!("{id} completed visual task {name}"));
                    }
                }
                if let Some(player) = state.players.get_mut(id) {
                    player.last_action = "doing_task".to_string();
                }
            }
            ActionLabel::FakeTask => {
                if let Some(player) = state.players.get_mut(id) {
                    player.last_action = "doing_task".to_string();
                }
            }
            _ => {}
        }
    }
}

/// Returns `true` if a meeting was installed (phase transitioned to
/// DISCUSSION) and the round must return immediately without running steps
/// 8-13 (spec.md §4.3 step 7).
fn step7_meetings(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) -> bool {
    let reporters: Vec<PlayerId> = validated
        .iter()
        .filter(|(_, a)| a.label == ActionLabel::Report)
        .map(|(id, _)| id.clone())
        .collect();
    let emergencies: Vec<PlayerId> = validated
        .iter()
        .filter(|(_, a)| a.label == ActionLabel::CallEmergency)
        .map(|(id, _)| id.clone())
        .collect();

    if reporters.is_empty() && emergencies.is_empty() {
        return false;
    }

    let (caller, trigger, superseded) = if !reporters.is_empty() {
        let caller = reporters[0].clone();
        let mut superseded = reporters[1..].to_vec();
        superseded.extend(emergencies.iter().cloned());
        (caller, MeetingTrigger::BodyReport, superseded)
    } else {
        let caller = emergencies[0].clone();
        (
            caller,
            MeetingTrigger::EmergencyMeeting,
            emergencies[1..].to_vec(),
        )
    };

    let (body_found, body_location) = if trigger == MeetingTrigger::BodyReport {
        let caller_loc = state.players[&caller].location.clone();
        let idx = state.bodies.iter().position(|b| b.location == caller_loc);
        match idx {
            Some(idx) => {
                let body = state.bodies.remove(idx);
                (Some(body.player_id), Some(body.location))
            }
            None => (None, None),
        }
    } else {
        if let Some(player) = state.players.get_mut(&caller) {
            player.emergency_meetings_remaining -= 1;
        }
        (None, None)
    };

    state.meeting_context = Some(MeetingContext {
        trigger,
        caller,
        body_found,
        body_location,
    });
    state.phase = Phase::Discussion;

    for id in superseded {
        let label = validated
            .get(&id)
            .map(|a| a.label.as_str())
            .unwrap_or("report")
            .to_string();
        state.action_results.insert(
            id,
            ActionResult::fail(&label, "superseded by another meeting"),
        );
    }

    true
}

fn step8_sabotage_trigger(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    if state.active_sabotage.is_some() {
        return;
    }
    let Some((_, action)) = validated
        .iter()
        .find(|(_, a)| a.label == ActionLabel::Sabotage)
    else {
        return;
    };
    let sabotage_type = action.target.clone().expect("validated sabotage has a target");
    let Some(definition) = state.catalog.sabotage_catalog.get(&sabotage_type) else {
        return;
    };
    let critical = definition.is_critical();
    let fix_required = definition.fix_locations.clone();
    let fix_progress = fix_required.keys().map(|room| (room.clone(), 0)).collect();
    state.active_sabotage = Some(ActiveSabotage {
        sabotage_type,
        critical,
        countdown: critical.then_some(state.config.sabotage_countdown),
        fix_progress,
        fix_required,
    });
}

fn step9_fix(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    for (id, action) in validated {
        if action.label != ActionLabel::FixSabotage {
            continue;
        }
        let location = state.players[id].location.clone();
        if let Some(player) = state.players.get_mut(id) {
            player.last_action = "fixing".to_string();
        }
        let Some(sabotage) = &mut state.active_sabotage else {
            continue;
        };
        let Some(required) = sabotage.fix_required.get(&location).copied() else {
            continue;
        };
        let progress = sabotage.fix_progress.entry(location).or_insert(0);
        *progress = (*progress + 1).min(required);
    }

    if state
        .active_sabotage
        .as_ref()
        .is_some_and(ActiveSabotage::is_fully_fixed)
    {
        state.active_sabotage = None;
        state.sabotage_cooldown = state.config.sabotage_cooldown;
    }
}

fn step10_admin(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    let callers: Vec<PlayerId> = validated
        .iter()
        .filter(|(_, a)| a.label == ActionLabel::UseAdmin)
        .map(|(id, _)| id.clone())
        .collect();
    if callers.is_empty() {
        return;
    }

    let mut snapshot: BTreeMap<Room, u32> = BTreeMap::new();
    for player in state.players.values() {
        if player.alive {
            *snapshot.entry(player.location.clone()).or_insert(0) += 1;
        }
    }
    for id in callers {
        if let Some(player) = state.players.get_mut(&id) {
            player.last_action = "admin".to_string();
        }
        state.admin_table_snapshot.insert(id, snapshot.clone());
    }
}

fn step11_last_action_fill(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    for (id, action) in validated {
        if matches!(
            action.label,
            ActionLabel::Wait | ActionLabel::Report | ActionLabel::CallEmergency | ActionLabel::Sabotage
        ) {
            if let Some(player) = state.players.get_mut(id) {
                player.last_action = "idle".to_string();
            }
        }
    }
}

fn step12_sighting_history(state: &mut GameState) {
    let ids: Vec<PlayerId> = state.players.keys().cloned().collect();
    let mut entries: Vec<(PlayerId, crate::state::SightingEntry)> = Vec::new();
    for id in &ids {
        let player = &state.players[id];
        if !player.alive || state.is_blinded(player) {
            continue;
        }
        for other in state.players.values() {
            if other.id == *id || !other.alive || other.location != player.location {
                continue;
            }
            entries.push((
                id.clone(),
                crate::state::SightingEntry {
                    round: state.round_number,
                    observed_id: other.id.clone(),
                    location: other.location.clone(),
                    observed_last_action: other.last_action.clone(),
                },
            ));
        }
    }
    for (id, entry) in entries {
        state
            .sighting_history
            .entry(id)
            .or_insert_with(|| crate::state::RingBuffer::with_capacity(state.config.memory_sighting_cap))
            .push(entry);
    }
}

fn step13_log(state: &mut GameState, validated: &BTreeMap<PlayerId, Action>) {
    let _ = validated;
    state.game_log.push(RoundLogEntry {
        round: state.round_number,
        results: state.action_results.clone(),
    });
}

/// Evaluates the five win conditions in order (spec.md §4.3.2); sets
/// `winner`/`win_cause`/`phase` and returns `true` on the first one that
/// holds. A no-op if a winner is already set.
pub fn check_win_condition(state: &mut GameState) -> bool {
    if state.winner.is_some() {
        return true;
    }
    let living_impostors = state.living_impostors();
    let living_crewmates = state.living_crewmates();

    if living_impostors == 0 {
        state.winner = Some(Winner::Crewmates);
        state.win_cause = Some("all_impostors_eliminated".to_string());
        state.phase = Phase::GameOver;
        return true;
    }
    if living_impostors >= living_crewmates {
        state.winner = Some(Winner::Impostors);
        state.win_cause = Some("impostors_majority".to_string());
        state.phase = Phase::GameOver;
        return true;
    }
    if let Some(sabotage) = &state.active_sabotage {
        if sabotage.critical && sabotage.countdown.is_some_and(|c| c <= 0) {
            let sabotage_type = sabotage.sabotage_type.clone();
            state.winner = Some(Winner::Impostors);
            state.win_cause = Some(format!("sabotage_{sabotage_type}"));
            state.phase = Phase::GameOver;
            return true;
        }
    }
    if state.global_task_progress() >= 1.0 {
        state.winner = Some(Winner::Crewmates);
        state.win_cause = Some("all_tasks_completed".to_string());
        state.phase = Phase::GameOver;
        return true;
    }
    if state.round_number >= state.config.max_total_rounds {
        state.winner = Some(Winner::Crewmates);
        state.win_cause = Some("timeout".to_string());
        state.phase = Phase::GameOver;
        return true;
    }
    false
}
