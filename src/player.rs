use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::block::{Block, BlockKind, Position};
use crate::board::Board;
use crate::config::{GameConfig, MAX_LEVEL};
use crate::level::{Level, LevelSettings};

/// A single-row/column move or quarter turn of the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Left,
    Right,
    Down,
    Clockwise,
    CounterClockwise,
}

impl Step {
    fn apply(self, block: &mut Block) {
        match self {
            Step::Left => block.move_left(),
            Step::Right => block.move_right(),
            Step::Down => block.move_down(),
            Step::Clockwise => block.rotate_cw(),
            Step::CounterClockwise => block.rotate_ccw(),
        }
    }

    fn undo(self, block: &mut Block) {
        match self {
            Step::Left => block.move_right(),
            Step::Right => block.move_left(),
            Step::Down => block.move_up(),
            Step::Clockwise => block.rotate_ccw(),
            Step::CounterClockwise => block.rotate_cw(),
        }
    }
}

/// Where the most recently locked block landed, kept until the bonus check.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LockedBlock {
    kind: BlockKind,
    cells: Vec<Position>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PlayerView {
    pub level: u8,
    pub score: u32,
    /// Locked cells with the current block drawn over them; `' '` is empty.
    pub field: Vec<Vec<char>>,
    pub next: Option<BlockKind>,
    pub heavy: bool,
    pub blind: bool,
}

pub struct Player {
    score: u32,
    board: Board,
    level: Level,
    settings: LevelSettings,
    rng: StdRng,
    current: Option<Block>,
    next: Option<Block>,
    current_spawn_level: u8,
    last_locked: Option<LockedBlock>,
    heavy: bool,
    blind: bool,
    spawn: Position,
    star_spawn: Position,
}

impl Player {
    /// Player `index` (0 or 1) with its script file and seed from `config`.
    pub fn new(config: &GameConfig, index: usize) -> Self {
        Self::with_rng(config, config.script_file(index).to_path_buf(), config.player_rng(index))
    }

    pub fn with_rng(config: &GameConfig, script_file: PathBuf, mut rng: StdRng) -> Self {
        let settings = LevelSettings {
            script_file,
            no_random_file: None,
            star_interval: config.star_interval,
        };
        let start = config.start_level.min(MAX_LEVEL);
        let level = Level::new(start, &settings, StdRng::seed_from_u64(rng.next_u64()));
        Self {
            score: 0,
            board: Board::new(config.rows, config.cols),
            level,
            settings,
            rng,
            current: None,
            next: None,
            current_spawn_level: 0,
            last_locked: None,
            heavy: false,
            blind: false,
            spawn: config.spawn_position(),
            star_spawn: config.star_position(),
        }
    }

    pub fn level(&self) -> u8 {
        self.level.tier()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.current.as_ref()
    }

    pub fn next_block(&self) -> Option<&Block> {
        self.next.as_ref()
    }

    /// Level at which the current block was promoted.
    pub fn spawn_level(&self) -> u8 {
        self.current_spawn_level
    }

    pub fn has_heavy_effect(&self) -> bool {
        self.heavy
    }

    pub fn has_blind_effect(&self) -> bool {
        self.blind
    }

    pub fn is_heavy_level(&self) -> bool {
        self.level.is_heavy()
    }

    pub fn no_random_file(&self) -> Option<&std::path::Path> {
        self.settings.no_random_file.as_deref()
    }

    fn build_level(&mut self, tier: u8) -> Level {
        let rng = StdRng::seed_from_u64(self.rng.next_u64());
        Level::new(tier, &self.settings, rng)
    }

    /// Swaps in a fresh policy for `level`. Out-of-range requests are ignored.
    pub fn set_level(&mut self, level: u8) -> bool {
        if level > MAX_LEVEL {
            return false;
        }
        self.level = self.build_level(level);
        debug!(level, "player level changed");
        true
    }

    pub fn spawn_initial_blocks(&mut self) {
        self.current = Some(self.level.next_block(self.spawn));
        self.current_spawn_level = self.level();
        self.next = Some(self.level.next_block(self.spawn));
    }

    /// Promotes next to current, draws a new next and clears effects.
    pub fn spawn_next_block(&mut self) {
        self.current = self.next.take();
        if self.current.is_none() {
            self.current = Some(self.level.next_block(self.spawn));
        }
        self.current_spawn_level = self.level();
        self.next = Some(self.level.next_block(self.spawn));
        self.clear_effects();
    }

    pub fn can_place_current_block(&self) -> bool {
        self.current
            .as_ref()
            .is_none_or(|block| self.board.can_place(block))
    }

    /// Applies `step` to the current block, undoing it if the block no longer
    /// fits. Returns whether the step stuck.
    pub fn try_step(&mut self, step: Step) -> bool {
        let Some(block) = self.current.as_mut() else {
            return false;
        };
        step.apply(block);
        if self.board.can_place(block) {
            true
        } else {
            step.undo(block);
            false
        }
    }

    pub fn note_ccw_rotation(&mut self) {
        if let Some(block) = self.current.as_mut() {
            block.note_ccw_rotation();
        }
    }

    pub fn hard_drop(&mut self) {
        if let Some(block) = self.current.as_mut() {
            self.board.drop_to_bottom(block);
        }
    }

    /// Locks the current block, clears rows and runs the level hooks,
    /// including an immediate star drop when one is pending. Returns the rows
    /// cleared by the block itself; star clears are scored here.
    pub fn lock_current_block(&mut self) -> usize {
        let Some(block) = self.current.as_ref() else {
            return 0;
        };
        let locked = LockedBlock {
            kind: block.kind(),
            cells: block.absolute_cells(),
        };
        self.board.lock_block(block);
        let rows = self.board.clear_full_rows();
        self.last_locked = Some(locked);

        self.level.on_block_locked(rows);
        if self.level.should_drop_star() {
            self.drop_star_block();
            self.level.clear_star_pending();
        }
        rows
    }

    fn drop_star_block(&mut self) {
        let mut star = Block::new(BlockKind::Star, self.star_spawn);
        if self.board.can_place(&star) {
            self.board.drop_to_bottom(&mut star);
        } else {
            // spawn cell is taken: it settles just above
            star.move_up();
        }
        self.board.lock_block(&star);
        let rows = self.board.clear_full_rows();
        info!(col = star.anchor().col, row = star.anchor().row, rows, "star block dropped");
        if rows > 0 {
            self.update_score(rows);
        }
    }

    /// Awards `(spawn level + 1)^2` when none of the last locked block's
    /// cells still hold its kind. Returns the bonus.
    ///
    /// The check compares cell contents, so a same-kind block shifted into a
    /// saved cell hides the elimination.
    pub fn check_and_score_completed_block(&mut self) -> u32 {
        let Some(locked) = self.last_locked.take() else {
            return 0;
        };
        let vanished = locked
            .cells
            .iter()
            .all(|p| self.board.cell(p.row, p.col) != Some(locked.kind));
        if !vanished {
            return 0;
        }
        let base = u32::from(self.current_spawn_level) + 1;
        let bonus = base * base;
        self.score = self.score.saturating_add(bonus);
        bonus
    }

    /// Awards `(level + rows)^2` for a direct clear. Returns the points.
    pub fn update_score(&mut self, rows: usize) -> u32 {
        let base = u32::from(self.level()) + rows as u32;
        let points = base * base;
        self.score = self.score.saturating_add(points);
        points
    }

    /// Testing override: swaps the current block without touching the
    /// spawn-level bookkeeping.
    pub fn replace_current_block(&mut self, kind: BlockKind) {
        self.current = Some(Block::new(kind, self.spawn));
    }

    /// Opponent's force action. Placement is the caller's to check.
    pub fn apply_force_effect(&mut self, kind: BlockKind) {
        self.replace_current_block(kind);
    }

    pub fn apply_heavy_effect(&mut self) {
        self.heavy = true;
    }

    pub fn apply_blind_effect(&mut self) {
        self.blind = true;
    }

    pub fn clear_effects(&mut self) {
        self.heavy = false;
        self.blind = false;
    }

    /// Remembers `file` as this player's fixed sequence if the active level
    /// accepts it and the file yields blocks.
    pub fn set_no_random(&mut self, file: PathBuf) -> bool {
        let accepted = self.level.set_no_random(&file);
        self.settings.no_random_file = accepted.then_some(file);
        accepted
    }

    pub fn set_random(&mut self) {
        self.level.set_random();
        self.settings.no_random_file = None;
    }

    /// Fresh board and strategy at `level`; identity and script file survive.
    pub fn reset(&mut self, level: u8) {
        let level = level.min(MAX_LEVEL);
        self.board = Board::new(self.board.rows(), self.board.cols());
        self.score = 0;
        self.current = None;
        self.next = None;
        self.current_spawn_level = 0;
        self.last_locked = None;
        self.settings.no_random_file = None;
        self.level = self.build_level(level);
        self.clear_effects();
    }

    pub fn view(&self) -> PlayerView {
        let mut field: Vec<Vec<char>> = self
            .board
            .grid()
            .iter()
            .map(|row| row.iter().map(|c| c.map_or(' ', BlockKind::symbol)).collect())
            .collect();
        if let Some(block) = &self.current {
            for p in block.absolute_cells() {
                if p.row < 0 || p.col < 0 {
                    continue;
                }
                if let Some(cell) = field
                    .get_mut(p.row as usize)
                    .and_then(|row| row.get_mut(p.col as usize))
                {
                    *cell = block.symbol();
                }
            }
        }
        PlayerView {
            level: self.level(),
            score: self.score,
            field,
            next: self.next.as_ref().map(Block::kind),
            heavy: self.heavy,
            blind: self.blind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn player_at(level: u8) -> Player {
        let config = GameConfig {
            start_level: level,
            seed: Some(11),
            ..GameConfig::default()
        };
        let script = std::env::temp_dir().join("biquadris_player_tests_no_script.txt");
        Player::with_rng(&config, script, config.player_rng(0))
    }

    fn fill_row_except(board: &mut Board, row: i32, gap: std::ops::Range<i32>) {
        for col in 0..board.cols() as i32 {
            if !gap.contains(&col) {
                board.set_cell(row, col, Some(BlockKind::O));
            }
        }
    }

    #[test]
    fn direct_clear_scores_level_plus_rows_squared() {
        let mut player = player_at(1);
        assert_eq!(player.update_score(2), 9);
        assert_eq!(player.score(), 9);
        let mut player = player_at(0);
        assert_eq!(player.update_score(1), 1);
    }

    #[test]
    fn vanished_block_scores_spawn_level_bonus() {
        let mut player = player_at(2);
        player.spawn_initial_blocks();
        player.replace_current_block(BlockKind::I);
        fill_row_except(player.board_mut(), 20, 0..4);

        player.hard_drop();
        assert_eq!(player.lock_current_block(), 1);
        assert_eq!(player.check_and_score_completed_block(), 9);
        assert_eq!(player.score(), 9);
        assert!(player.board().is_row_empty(20));
    }

    #[test]
    fn bonus_uses_level_at_spawn_not_current_level() {
        let mut player = player_at(2);
        player.spawn_initial_blocks();
        player.replace_current_block(BlockKind::I);
        assert!(player.set_level(0));
        fill_row_except(player.board_mut(), 20, 0..4);
        player.hard_drop();
        let rows = player.lock_current_block();
        assert_eq!(player.update_score(rows), 1);
        assert_eq!(player.check_and_score_completed_block(), 9);
    }

    #[test]
    fn partially_surviving_block_earns_no_bonus() {
        let mut player = player_at(0);
        player.spawn_initial_blocks();
        player.replace_current_block(BlockKind::J);
        // J's bottom row covers cols 8..=10 of row 20; its top cell survives
        fill_row_except(player.board_mut(), 20, 8..11);
        for _ in 0..8 {
            assert!(player.try_step(Step::Right));
        }
        player.hard_drop();
        assert_eq!(player.lock_current_block(), 1);
        assert_eq!(player.check_and_score_completed_block(), 0);
        assert_eq!(player.board().cell(20, 8), Some(BlockKind::J));
    }

    #[test]
    fn rejected_step_is_undone() {
        let mut player = player_at(0);
        player.spawn_initial_blocks();
        player.replace_current_block(BlockKind::O);
        let before = player.current_block().cloned();
        assert!(!player.try_step(Step::Left));
        assert_eq!(player.current_block().cloned(), before);
    }

    #[test]
    fn spawn_next_promotes_and_clears_effects() {
        let mut player = player_at(1);
        player.spawn_initial_blocks();
        let next = player.next_block().map(Block::kind);
        player.apply_heavy_effect();
        player.apply_blind_effect();
        assert!(player.set_level(3));
        player.spawn_next_block();
        assert_eq!(player.current_block().map(Block::kind), next);
        assert_eq!(player.spawn_level(), 3);
        assert!(!player.has_heavy_effect());
        assert!(!player.has_blind_effect());
    }

    #[test]
    fn level_changes_are_bounded() {
        let mut player = player_at(4);
        assert!(!player.set_level(5));
        assert_eq!(player.level(), 4);
        assert!(player.is_heavy_level());
        assert!(player.set_level(2));
        assert!(!player.is_heavy_level());
    }

    #[test]
    fn no_random_survives_level_round_trip() {
        let path = std::env::temp_dir().join(format!("biquadris_player_norandom_{}.txt", std::process::id()));
        fs::write(&path, "L").unwrap();
        let mut player = player_at(3);
        assert!(player.set_no_random(path.clone()));
        assert!(player.set_level(4));
        player.spawn_initial_blocks();
        assert_eq!(player.current_block().map(Block::kind), Some(BlockKind::L));
        assert_eq!(player.next_block().map(Block::kind), Some(BlockKind::L));

        player.set_random();
        assert_eq!(player.no_random_file(), None);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn level4_drops_star_after_five_quiet_locks() {
        let mut player = player_at(4);
        for _ in 0..5 {
            player.replace_current_block(BlockKind::O);
            // park each O in its own column pair so nothing clears
            player.hard_drop();
            assert_eq!(player.lock_current_block(), 0);
            for row in 0..21 {
                for col in 0..2 {
                    player.board_mut().set_cell(row, col, None);
                }
            }
        }
        assert_eq!(player.board().cell(20, 5), Some(BlockKind::Star));
    }

    #[test]
    fn star_clear_is_scored_inline() {
        let mut player = player_at(4);
        fill_row_except(player.board_mut(), 20, 5..6);
        for _ in 0..5 {
            player.replace_current_block(BlockKind::O);
            player.hard_drop();
            player.lock_current_block();
        }
        // the star filled the gap at (20, 5) and cleared the row: (4 + 1)^2
        assert_eq!(player.score(), 25);
        assert_eq!(player.board().cell(20, 5), None);
    }

    #[test]
    fn reset_rebuilds_board_and_score() {
        let mut player = player_at(1);
        player.spawn_initial_blocks();
        player.update_score(3);
        player.board_mut().set_cell(20, 0, Some(BlockKind::T));
        player.reset(2);
        assert_eq!(player.score(), 0);
        assert_eq!(player.level(), 2);
        assert!(player.current_block().is_none());
        assert!(player.board().is_row_empty(20));
    }

    #[test]
    fn view_overlays_current_block() {
        let mut player = player_at(0);
        player.spawn_initial_blocks();
        player.replace_current_block(BlockKind::T);
        player.apply_blind_effect();
        let view = player.view();
        assert_eq!(view.field[6][0..3], ['T', 'T', 'T']);
        assert_eq!(view.field[7][1], 'T');
        assert_eq!(view.field[7][0], ' ');
        assert!(view.blind);
        assert_eq!(view.next, Some(BlockKind::J));
    }
}
