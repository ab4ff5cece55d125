//! # deduction-arena
//!
//! A headless, deterministic simulation engine for a hidden-role
//! social-deduction game in the style of *Among Us*, plus a tournament
//! runner that schedules balanced matchups across agent classes and
//! tracks Elo.
//!
//! It provides:
//! - A static [`map::RulesCatalog`] (room graph, task pool, sabotage
//!   catalog) shared read-only across every game.
//! - A [`state::GameState`] and a 13-phase [`resolver::resolve_round`]
//!   that advances it one round at a time.
//! - Per-player, information-asymmetric views via [`observation`].
//! - An [`agent::Agent`] extension point any decision policy implements,
//!   with two deterministic built-ins ([`agent::RandomAgent`],
//!   [`agent::RuleBasedAgent`]).
//! - A [`engine::GameEngine`] that drives one game end to end under
//!   per-call agent timeouts.
//! - A [`tournament::TournamentRunner`] that deals role-balanced lobbies
//!   across registered agent classes, runs them concurrently, and
//!   produces Elo-ranked [`tournament::Standing`]s.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deduction_arena::agent::{Agent, RandomAgent};
//! use deduction_arena::config::GameConfig;
//! use deduction_arena::engine::GameEngine;
//! use deduction_arena::map::{default_map, default_sabotage_catalog, default_task_pool, RulesCatalog};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = GameConfig::default().with_num_players(5).with_num_impostors(1);
//!     let catalog = Arc::new(RulesCatalog {
//!         map: default_map(),
//!         task_pool: default_task_pool(),
//!         sabotage_catalog: default_sabotage_catalog(
//!             config.sabotage_fix_cost_critical,
//!             config.sabotage_fix_cost_disruptive,
//!         ),
//!     });
//!
//!     let mut rng = ChaCha8Rng::seed_from_u64(42);
//!     let mut agents = std::collections::BTreeMap::new();
//!     for i in 0..config.num_players {
//!         agents.insert(format!("p{i}"), Box::new(RandomAgent::new(i as u64)) as Box<dyn Agent>);
//!     }
//!
//!     let engine = GameEngine::new(config, catalog, agents, &mut rng)?;
//!     let result = engine.run();
//!     println!("{:?} win by {}", result.winner, result.win_cause);
//!     Ok(())
//! }
//! ```
//!
//! # Running a tournament
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deduction_arena::agent::{Agent, RandomAgent, RuleBasedAgent};
//! use deduction_arena::config::GameConfig;
//! use deduction_arena::map::{default_map, default_sabotage_catalog, default_task_pool, RulesCatalog};
//! use deduction_arena::tournament::{TeamEntry, TournamentConfig, TournamentRunner};
//!
//! fn main() -> anyhow::Result<()> {
//!     let game_config = GameConfig::default().with_num_players(6).with_num_impostors(2);
//!     let catalog = Arc::new(RulesCatalog {
//!         map: default_map(),
//!         task_pool: default_task_pool(),
//!         sabotage_catalog: default_sabotage_catalog(
//!             game_config.sabotage_fix_cost_critical,
//!             game_config.sabotage_fix_cost_disruptive,
//!         ),
//!     });
//!
//!     let teams = vec![
//!         TeamEntry::new("random", Arc::new(|seed| Box::new(RandomAgent::new(seed)) as Box<dyn Agent>)),
//!         TeamEntry::new("rule-based", Arc::new(|seed| Box::new(RuleBasedAgent::new(seed)) as Box<dyn Agent>)),
//!     ];
//!
//!     let runner = TournamentRunner::new(TournamentConfig::new(game_config, 20), catalog, teams, 7)?;
//!     for row in runner.run() {
//!         println!("{:>2}. {:<12} elo={:.0} games={}", row.rank, row.team, row.elo, row.games);
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod engine;
pub mod logging;
pub mod map;
pub mod meeting;
pub mod observation;
pub mod resolver;
pub mod state;
pub mod tournament;

pub use anyhow;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use deduction_arena::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, RandomAgent, RuleBasedAgent};
    pub use crate::config::GameConfig;
    pub use crate::engine::GameEngine;
    pub use crate::map::{default_map, default_sabotage_catalog, default_task_pool, RulesCatalog};
    pub use crate::state::{GameState, Phase, Role, Winner};
    pub use crate::tournament::{Standing, TeamEntry, TournamentConfig, TournamentRunner};
}
