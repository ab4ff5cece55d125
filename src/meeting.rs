//! The discussion + voting sub-flow run once `resolve_round` installs a
//! `meeting_context` (spec.md §4.4).

use std::collections::BTreeMap;

use crate::observation::{generate_discussion_observation, generate_voting_observation, DiscussionObservation, VotingObservation};
use crate::resolver::check_win_condition;
use crate::state::{ChatMessage, GameState, MeetingRecord, Phase, PlayerId, VoteChoice};

/// Runs one full meeting: `discussion_rotations` rounds of speaking, then a
/// single vote, then ejection/archival. `query_discussion`/`query_vote` are
/// supplied by the engine so that agent timeouts stay centralized there;
/// this module only knows the meeting's own sequencing.
pub fn run_meeting(
    state: &mut GameState,
    mut query_discussion: impl FnMut(&GameState, &DiscussionObservation) -> String,
    mut query_vote: impl FnMut(&GameState, &VotingObservation) -> VoteChoice,
) {
    let ctx = state
        .meeting_context
        .clone()
        .expect("run_meeting called without an installed meeting");

    // Speaker order is fixed at meeting start: lexicographic order of alive
    // players, starting from the caller (spec.md §4.4).
    let mut speaker_order: Vec<PlayerId> = state
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| p.id.clone())
        .collect();
    speaker_order.sort();
    if let Some(pos) = speaker_order.iter().position(|id| *id == ctx.caller) {
        speaker_order.rotate_left(pos);
    }

    for rotation in 0..state.config.discussion_rotations {
        for speaker in &speaker_order {
            let obs = generate_discussion_observation(state, speaker, rotation);
            let text = query_discussion(state, &obs);
            let text: String = text.chars().take(state.config.message_char_limit).collect();
            state.chat_history.push(ChatMessage {
                speaker: speaker.clone(),
                rotation,
                text,
            });
        }
    }

    state.phase = Phase::Voting;

    let mut tally: BTreeMap<VoteChoice, u32> = BTreeMap::new();
    let mut votes: BTreeMap<PlayerId, VoteChoice> = BTreeMap::new();
    for voter in &speaker_order {
        let obs = generate_voting_observation(state, voter);
        let choice = query_vote(state, &obs);
        *tally.entry(choice.clone()).or_insert(0) += 1;
        votes.insert(voter.clone(), choice);
    }

    let winner = strict_plurality_winner(&tally);
    let mut ejected_player = None;
    let mut role_revealed = None;
    if let Some(VoteChoice::Player(target)) = &winner {
        if let Some(player) = state.players.get_mut(target) {
            player.ejected = true;
            player.alive = false;
            ejected_player = Some(target.clone());
            if state.config.confirm_ejects {
                role_revealed = Some(player.role);
            }
        }
    }

    state.meeting_history.push(MeetingRecord {
        trigger: ctx.trigger,
        caller: ctx.caller.clone(),
        body_found: ctx.body_found.clone(),
        transcript: state.chat_history.clone(),
        votes,
        ejected_player,
        role_revealed,
    });
    state.chat_history.clear();
    state.meeting_context = None;
    state.phase = Phase::Task;

    check_win_condition(state);
}

/// The option with strict plurality wins; any tie (including a tie against
/// `skip`) or a winning `skip` results in no ejection (spec.md §4.4).
fn strict_plurality_winner(tally: &BTreeMap<VoteChoice, u32>) -> Option<VoteChoice> {
    if tally.is_empty() {
        return None;
    }
    let max = *tally.values().max().expect("tally is non-empty");
    let leaders: Vec<&VoteChoice> = tally.iter().filter(|(_, count)| **count == max).map(|(choice, _)| choice).collect();
    if leaders.len() != 1 {
        return None;
    }
    match leaders[0] {
        VoteChoice::Skip => None,
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::map::{default_map, default_sabotage_catalog, default_task_pool, RulesCatalog};
    use crate::state::{MeetingContext, MeetingTrigger, Player, Role};
    use std::collections::BTreeMap as Map;

    fn three_player_state_in_meeting() -> GameState {
        let config = GameConfig::default().with_num_players(3).with_num_impostors(1);
        let catalog = std::sync::Arc::new(RulesCatalog {
            map: default_map(),
            task_pool: default_task_pool(),
            sabotage_catalog: default_sabotage_catalog(
                config.sabotage_fix_cost_critical,
                config.sabotage_fix_cost_disruptive,
            ),
        });
        let mut players = Map::new();
        for id in ["a", "b", "c"] {
            let role = if id == "c" { Role::Impostor } else { Role::Crewmate };
            players.insert(id.to_string(), Player::new(id.to_string(), role, "Cafeteria", 1));
        }
        GameState {
            catalog,
            config,
            phase: Phase::Discussion,
            round_number: 1,
            players,
            tasks: Map::new(),
            bodies: Vec::new(),
            active_sabotage: None,
            sabotage_cooldown: 0,
            meeting_context: Some(MeetingContext {
                trigger: MeetingTrigger::EmergencyMeeting,
                caller: "a".to_string(),
                body_found: None,
                body_location: None,
            }),
            chat_history: Vec::new(),
            events_last_round: Map::new(),
            admin_table_snapshot: Map::new(),
            action_results: Map::new(),
            movement_history: Map::new(),
            sighting_history: Map::new(),
            meeting_history: Vec::new(),
            game_log: Vec::new(),
            winner: None,
            win_cause: None,
        }
    }

    #[test]
    fn strict_plurality_ejects_winner() {
        let mut state = three_player_state_in_meeting();
        run_meeting(
            &mut state,
            |_, _| String::new(),
            |_, obs| {
                if obs.player_id == "a" {
                    VoteChoice::Skip
                } else {
                    VoteChoice::Player("c".to_string())
                }
            },
        );
        assert!(state.players["c"].ejected);
        assert!(!state.players["c"].alive);
        assert_eq!(state.players["c"].role, Role::Impostor);
        assert_eq!(
            state.meeting_history[0].role_revealed,
            Some(Role::Impostor)
        );
        assert!(state.chat_history.is_empty());
        assert_eq!(state.phase, Phase::Task);
    }

    #[test]
    fn tie_results_in_no_ejection() {
        let mut state = three_player_state_in_meeting();
        run_meeting(
            &mut state,
            |_, _| String::new(),
            |_, obs| match obs.player_id.as_str() {
                "a" => VoteChoice::Player("b".to_string()),
                "b" => VoteChoice::Player("c".to_string()),
                _ => VoteChoice::Skip,
            },
        );
        assert!(state.players.values().all(|p| p.alive));
        assert_eq!(state.meeting_history[0].ejected_player, None);
    }

    #[test]
    fn confirm_ejects_false_hides_role() {
        let mut state = three_player_state_in_meeting();
        state.config.confirm_ejects = false;
        run_meeting(
            &mut state,
            |_, _| String::new(),
            |_, obs| {
                if obs.player_id == "a" {
                    VoteChoice::Skip
                } else {
                    VoteChoice::Player("c".to_string())
                }
            },
        );
        assert_eq!(state.meeting_history[0].ejected_player, Some("c".to_string()));
        assert_eq!(state.meeting_history[0].role_revealed, None);
    }
}
