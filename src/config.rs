//! Tunable numeric parameters for a game, and the Map & Rules Catalog
//! validation predicate.
//!
//! Mirrors the teacher crate's `Configuration`: a builder-pattern struct with
//! chainable `with_*` setters, plus an override loader that reads a JSON file
//! (spec.md §6: "Any unknown key is ignored; any invalid value fails the
//! validation predicate").

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Numeric parameters shared by the Map & Rules Catalog (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub num_players: u32,
    pub num_impostors: u32,
    pub max_total_rounds: u32,
    pub kill_cooldown: u32,
    pub discussion_rotations: u32,
    pub message_char_limit: usize,
    pub emergency_meetings_per_player: u32,
    pub sabotage_countdown: i32,
    pub sabotage_cooldown: u32,
    pub sabotage_fix_cost_critical: u32,
    pub sabotage_fix_cost_disruptive: u32,
    pub tasks_per_crewmate: u32,
    pub visual_tasks_per_crewmate: u32,
    pub confirm_ejects: bool,
    pub ghost_tasks_enabled: bool,
    pub agent_timeout_seconds: u64,
    pub memory_sighting_cap: usize,
    pub memory_movement_cap: usize,
}

impl Default for GameConfig {
    /// Defaults match the original implementation's `GameConfig` dataclass.
    fn default() -> Self {
        GameConfig {
            num_players: 7,
            num_impostors: 2,
            max_total_rounds: 60,
            kill_cooldown: 6,
            discussion_rotations: 3,
            message_char_limit: 500,
            emergency_meetings_per_player: 1,
            sabotage_countdown: 12,
            sabotage_cooldown: 8,
            sabotage_fix_cost_critical: 4,
            sabotage_fix_cost_disruptive: 3,
            tasks_per_crewmate: 8,
            visual_tasks_per_crewmate: 1,
            confirm_ejects: true,
            ghost_tasks_enabled: true,
            agent_timeout_seconds: 30,
            memory_sighting_cap: 20,
            memory_movement_cap: 15,
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the validation predicate from spec.md §4.1.
    ///
    /// # Errors
    /// Returns a `ConfigError`-shaped message (spec.md §7) when any rule is
    /// violated; the caller is expected to treat this as fatal before the
    /// game starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.num_players >= 4, "num_players must be >= 4");
        anyhow::ensure!(self.num_impostors >= 1, "num_impostors must be >= 1");
        anyhow::ensure!(
            (self.num_impostors as f64) < (self.num_players as f64) / 2.0,
            "num_impostors must be less than num_players / 2"
        );
        anyhow::ensure!(
            self.visual_tasks_per_crewmate <= self.tasks_per_crewmate,
            "visual_tasks_per_crewmate cannot exceed tasks_per_crewmate"
        );
        anyhow::ensure!(
            self.max_total_rounds >= 10,
            "max_total_rounds must be >= 10"
        );
        Ok(())
    }

    /// Loads numeric overrides from a JSON object, merging them over
    /// `self`. Unknown keys are ignored; after merging, the predicate in
    /// [`GameConfig::validate`] must still pass.
    pub fn with_overrides_from_json_str(mut self, json: &str) -> anyhow::Result<Self> {
        let overrides: serde_json::Value =
            serde_json::from_str(json).map_err(|e| anyhow::anyhow!("invalid config JSON: {e}"))?;
        self.apply_overrides(&overrides)?;
        self.validate()?;
        Ok(self)
    }

    pub fn with_overrides_from_json_file(self, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.as_ref().display()))?;
        self.with_overrides_from_json_str(&content)
    }

    fn apply_overrides(&mut self, overrides: &serde_json::Value) -> anyhow::Result<()> {
        let serde_json::Value::Object(map) = overrides else {
            anyhow::bail!("config override must be a JSON object");
        };
        // Round-trip through serde_json::Value so unknown keys are silently
        // ignored and known keys keep their native type.
        let mut current = serde_json::to_value(&*self)?;
        let serde_json::Value::Object(current_map) = &mut current else {
            unreachable!("GameConfig always serializes to an object");
        };
        for (key, value) in map {
            if current_map.contains_key(key) {
                current_map.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(current)
            .map_err(|e| anyhow::anyhow!("invalid value in config override: {e}"))?;
        Ok(())
    }

    pub fn with_num_players(mut self, value: u32) -> Self {
        self.num_players = value;
        self
    }

    pub fn with_num_impostors(mut self, value: u32) -> Self {
        self.num_impostors = value;
        self
    }

    pub fn with_max_total_rounds(mut self, value: u32) -> Self {
        self.max_total_rounds = value;
        self
    }

    pub fn with_kill_cooldown(mut self, value: u32) -> Self {
        self.kill_cooldown = value;
        self
    }

    pub fn with_confirm_ejects(mut self, value: bool) -> Self {
        self.confirm_ejects = value;
        self
    }

    pub fn with_ghost_tasks_enabled(mut self, value: bool) -> Self {
        self.ghost_tasks_enabled = value;
        self
    }

    pub fn with_agent_timeout_seconds(mut self, value: u64) -> Self {
        self.agent_timeout_seconds = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_too_few_players() {
        let cfg = GameConfig::default().with_num_players(3);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_too_many_impostors() {
        let cfg = GameConfig::default().with_num_players(8).with_num_impostors(4);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_short_games() {
        let cfg = GameConfig::default().with_max_total_rounds(5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_ignore_unknown_keys_and_keep_defaults() {
        let cfg = GameConfig::default()
            .with_overrides_from_json_str(r#"{"kill_cooldown": 3, "totally_unknown": true}"#)
            .unwrap();
        assert_eq!(cfg.kill_cooldown, 3);
        assert_eq!(cfg.num_players, GameConfig::default().num_players);
    }

    #[test]
    fn overrides_rejecting_invalid_value_fails_validation() {
        let result = GameConfig::default().with_overrides_from_json_str(r#"{"num_impostors": 0}"#);
        assert!(result.is_err());
    }
}
