use std::collections::BTreeMap;
use std::sync::Arc;

use deduction_arena::config::GameConfig;
use deduction_arena::map::{default_map, default_sabotage_catalog, default_task_pool, RulesCatalog};
use deduction_arena::state::{GameState, Phase, Player, PlayerId};

pub fn catalog(config: &GameConfig) -> Arc<RulesCatalog> {
    Arc::new(RulesCatalog {
        map: default_map(),
        task_pool: default_task_pool(),
        sabotage_catalog: default_sabotage_catalog(
            config.sabotage_fix_cost_critical,
            config.sabotage_fix_cost_disruptive,
        ),
    })
}

/// An otherwise-empty game state seeded with the given players, ready to feed
/// into `resolver::resolve_round` or `observation::generate_task_observation`.
pub fn base_state(config: GameConfig, players: BTreeMap<PlayerId, Player>) -> GameState {
    let catalog = catalog(&config);
    GameState {
        catalog,
        config,
        phase: Phase::Task,
        round_number: 0,
        players,
        tasks: BTreeMap::new(),
        bodies: Vec::new(),
        active_sabotage: None,
        sabotage_cooldown: 0,
        meeting_context: None,
        chat_history: Vec::new(),
        events_last_round: BTreeMap::new(),
        admin_table_snapshot: BTreeMap::new(),
        action_results: BTreeMap::new(),
        movement_history: BTreeMap::new(),
        sighting_history: BTreeMap::new(),
        meeting_history: Vec::new(),
        game_log: Vec::new(),
        winner: None,
        win_cause: None,
    }
}
