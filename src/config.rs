use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::block::Position;
use crate::board::{DEFAULT_COLS, DEFAULT_ROWS};

pub const MAX_LEVEL: u8 = 4;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub spawn_row: i32,
    pub spawn_col: i32,
    pub star_col: i32,
    pub start_level: u8,
    pub seed: Option<u64>,
    pub script_file1: PathBuf,
    pub script_file2: PathBuf,
    /// Level 4 drops a star after this many consecutive locks without a clear.
    pub star_interval: u32,
    /// Rows a heavy-afflicted block falls after each sideways move.
    pub heavy_drop_rows: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            spawn_row: 6,
            spawn_col: 0,
            star_col: 5,
            start_level: 0,
            seed: None,
            script_file1: PathBuf::from("biquadris_sequence1.txt"),
            script_file2: PathBuf::from("biquadris_sequence2.txt"),
            star_interval: 5,
            heavy_drop_rows: 2,
        }
    }
}

impl GameConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: GameConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.clamped())
    }

    /// Start level forced into `0..=4`, board at least one cell in each
    /// direction, spawn cells moved inside the board.
    pub fn clamped(mut self) -> Self {
        self.start_level = self.start_level.min(MAX_LEVEL);
        self.rows = self.rows.max(1);
        self.cols = self.cols.max(1);
        let last_row = i32::try_from(self.rows - 1).unwrap_or(i32::MAX);
        let last_col = i32::try_from(self.cols - 1).unwrap_or(i32::MAX);
        self.spawn_row = self.spawn_row.clamp(0, last_row);
        self.spawn_col = self.spawn_col.clamp(0, last_col);
        self.star_col = self.star_col.clamp(0, last_col);
        self
    }

    pub fn spawn_position(&self) -> Position {
        Position::new(self.spawn_row, self.spawn_col)
    }

    pub fn star_position(&self) -> Position {
        Position::new(self.spawn_row, self.star_col)
    }

    pub fn script_file(&self, player: usize) -> &Path {
        if player == 0 {
            &self.script_file1
        } else {
            &self.script_file2
        }
    }

    /// Random source for one player. With a seed both players are
    /// reproducible but draw from distinct streams.
    pub fn player_rng(&self, player: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                StdRng::seed_from_u64(seed ^ (player as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "start_level": 9, "seed": 42 }"#).unwrap();
        let config = config.clamped();
        assert_eq!(config.start_level, 4);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.rows, 21);
        assert_eq!(config.cols, 11);
        assert_eq!(config.star_position(), Position::new(6, 5));
    }

    #[test]
    fn zero_sized_board_is_clamped() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "rows": 0, "cols": 0, "spawn_row": 40, "star_col": -3 }"#)
                .unwrap();
        let config = config.clamped();
        assert_eq!((config.rows, config.cols), (1, 1));
        assert_eq!(config.spawn_position(), Position::new(0, 0));
        assert_eq!(config.star_position(), Position::new(0, 0));

        let config = GameConfig::default().clamped();
        assert_eq!(config, GameConfig::default());
    }

    fn draws(mut rng: StdRng) -> Vec<u32> {
        (0..8).map(|_| rng.next_u32()).collect()
    }

    #[test]
    fn seeded_player_streams_are_reproducible_and_distinct() {
        let config = GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        };
        assert_eq!(draws(config.player_rng(0)), draws(config.player_rng(0)));
        assert_ne!(draws(config.player_rng(0)), draws(config.player_rng(1)));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let path = std::env::temp_dir().join("biquadris_missing_config_for_test.json");
        assert!(GameConfig::from_json_file(&path).is_err());
    }
}
