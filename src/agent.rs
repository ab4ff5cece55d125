//! The `Agent` extension point (spec.md §6) and the two built-in,
//! non-LLM implementors needed to exercise and fill out a tournament
//! (spec.md §9: `Random`, `RuleBased` tagged variants).
//!
//! Grounded on the original implementation's `engine/agents.py::RandomBot`/
//! `RuleBasedBot`. The original's `PersonalityAgent`/`OpenRouterWrapper`
//! (LLM-backed, network calls) are out of scope per spec.md §1 and are not
//! reimplemented; any external crate may still implement `Agent` to wrap an
//! LLM client without this crate shipping one.

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::observation::{
    DiscussionObservation, GameEndInfo, GameStartInfo, TaskObservation, TaskPhaseObservation,
    VotingObservation,
};
use crate::resolver::{Action, ActionLabel};
use crate::state::VoteChoice;

/// The five capabilities every seat-filling decision policy must provide
/// (spec.md §6). `Send` because the tournament runner moves agents across
/// `std::thread::spawn` boundaries (SPEC_FULL.md §5).
pub trait Agent: Send {
    fn on_game_start(&mut self, info: &GameStartInfo);
    fn on_task_phase(&mut self, obs: &TaskPhaseObservation) -> Action;
    fn on_discussion(&mut self, obs: &DiscussionObservation) -> String;
    fn on_vote(&mut self, obs: &VotingObservation) -> VoteChoice;
    fn on_game_end(&mut self, result: &GameEndInfo);
}

/// Moves to a random adjacent room or waits; never reports, kills, or votes
/// deliberately. Grounded on `RandomBot`.
pub struct RandomAgent {
    rng: ChaCha8Rng,
}

impl RandomAgent {
    /// `seed` should come from the caller's master RNG so that a game's
    /// overall determinism is preserved (SPEC_FULL.md §2 "Determinism").
    pub fn new(seed: u64) -> Self {
        RandomAgent {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn act_for(&mut self, obs: &TaskObservation) -> Action {
        if self.rng.next_u32() % 2 == 0 && !obs.adjacent_rooms.is_empty() {
            let room = obs
                .adjacent_rooms
                .choose(&mut self.rng)
                .expect("adjacent_rooms is non-empty")
                .clone();
            Action::with_target(ActionLabel::Move, room)
        } else {
            Action::wait()
        }
    }
}

impl Agent for RandomAgent {
    fn on_game_start(&mut self, _info: &GameStartInfo) {}

    fn on_task_phase(&mut self, obs: &TaskPhaseObservation) -> Action {
        match obs {
            TaskPhaseObservation::Alive(task_obs) => self.act_for(task_obs),
            TaskPhaseObservation::Ghost(_) => Action::wait(),
        }
    }

    fn on_discussion(&mut self, _obs: &DiscussionObservation) -> String {
        "No comment.".to_string()
    }

    fn on_vote(&mut self, _obs: &VotingObservation) -> VoteChoice {
        VoteChoice::Skip
    }

    fn on_game_end(&mut self, _result: &GameEndInfo) {}
}

/// Reports bodies when possible, kills when possible (as an impostor), does
/// its own tasks when possible (as a crewmate), and otherwise moves
/// randomly. Grounded on `RuleBasedBot`.
pub struct RuleBasedAgent {
    rng: ChaCha8Rng,
}

impl RuleBasedAgent {
    pub fn new(seed: u64) -> Self {
        RuleBasedAgent {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn random_move_or_wait(&mut self, obs: &TaskObservation) -> Action {
        match obs.adjacent_rooms.choose(&mut self.rng) {
            Some(room) => Action::with_target(ActionLabel::Move, room.clone()),
            None => Action::wait(),
        }
    }

    fn act_for(&mut self, obs: &TaskObservation) -> Action {
        if obs.available_actions.can_report {
            return Action::without_target(ActionLabel::Report);
        }
        if obs.kill_cooldown.is_some() && obs.available_actions.can_kill {
            if let Some(victim) = obs.players_present.first() {
                return Action::with_target(ActionLabel::Kill, victim.clone());
            }
        }
        if obs.kill_cooldown.is_none() {
            if let crate::observation::TaskListView::Real(tasks) = &obs.tasks {
                if let Some(task) = tasks
                    .iter()
                    .find(|t| t.location == obs.location && t.progress < t.required)
                {
                    return Action::with_target(ActionLabel::DoTask, task.task_id.clone());
                }
            }
        }
        self.random_move_or_wait(obs)
    }
}

impl Agent for RuleBasedAgent {
    fn on_game_start(&mut self, _info: &GameStartInfo) {}

    fn on_task_phase(&mut self, obs: &TaskPhaseObservation) -> Action {
        match obs {
            TaskPhaseObservation::Alive(task_obs) => self.act_for(task_obs),
            TaskPhaseObservation::Ghost(_) => Action::wait(),
        }
    }

    fn on_discussion(&mut self, _obs: &DiscussionObservation) -> String {
        "No comment.".to_string()
    }

    fn on_vote(&mut self, _obs: &VotingObservation) -> VoteChoice {
        VoteChoice::Skip
    }

    fn on_game_end(&mut self, _result: &GameEndInfo) {}
}

/// The label recorded in standings for the deterministic bot the tournament
/// scheduler uses to fill quota gaps (spec.md §4.6, GLOSSARY "Fallback
/// bot"). Not a team name any real agent class may register under.
pub const FALLBACK_BOT_TEAM: &str = "__FallbackBot__";

/// A fresh fallback bot for one seat. Deterministic given `seed`, per
/// `GameEngine`'s master RNG, like every other "random" choice in the crate.
pub fn fallback_bot(seed: u64) -> Box<dyn Agent> {
    Box::new(RuleBasedAgent::new(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::AvailableActions;

    fn sample_obs(can_report: bool) -> TaskObservation {
        TaskObservation {
            player_id: "p1".to_string(),
            round_number: 1,
            location: "Cafeteria".to_string(),
            players_present: vec!["p2".to_string()],
            bodies_present: Vec::new(),
            adjacent_rooms: vec!["Admin".to_string(), "Medbay".to_string()],
            tasks: crate::observation::TaskListView::Disabled,
            teammates: Vec::new(),
            kill_cooldown: None,
            available_actions: AvailableActions {
                can_report,
                can_emergency: false,
                can_kill: false,
                can_sabotage: false,
                can_fix: false,
            },
            previous_action_result: None,
            events: Vec::new(),
            admin_table: None,
            active_sabotage: None,
            sabotage_cooldown: 0,
        }
    }

    #[test]
    fn rule_based_reports_when_possible() {
        let mut agent = RuleBasedAgent::new(1);
        let action = agent.act_for(&sample_obs(true));
        assert_eq!(action.label, ActionLabel::Report);
    }

    #[test]
    fn random_agent_is_deterministic_given_seed() {
        let mut a = RandomAgent::new(42);
        let mut b = RandomAgent::new(42);
        let obs = sample_obs(false);
        let action_a = a.act_for(&obs);
        let action_b = b.act_for(&obs);
        assert_eq!(action_a.label, action_b.label);
        assert_eq!(action_a.target, action_b.target);
    }
}
