use std::fs;
use std::io::BufRead;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::block::BlockKind;
use crate::command::{parse_line, resolve, split_multiplier, Command};
use crate::config::{GameConfig, MAX_LEVEL};
use crate::display::Display;
use crate::player::{Player, Step};

/// Nested `sequence` files beyond this depth are skipped.
const MAX_SEQUENCE_DEPTH: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Winner {
    PlayerOne,
    PlayerTwo,
}

impl Winner {
    fn from_index(idx: usize) -> Self {
        if idx == 0 {
            Winner::PlayerOne
        } else {
            Winner::PlayerTwo
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Winner::PlayerOne => "Player 1",
            Winner::PlayerTwo => "Player 2",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    AwaitingCommand,
    BlockLocked,
    SpecialActionPending,
    GameOver { winner: Winner },
    InputEnded,
}

/// What a movement or rotation command did to the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Rejected,
    Locked,
}

/// Effect an attacker may apply to the opponent after a multi-row clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialAction {
    Blind,
    Heavy,
    Force(BlockKind),
}

impl SpecialAction {
    /// Parses `blind`, `heavy` or `force <symbol>`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        match (words.next()?, words.next(), words.next()) {
            ("blind", None, None) => Some(SpecialAction::Blind),
            ("heavy", None, None) => Some(SpecialAction::Heavy),
            ("force", Some(symbol), None) => {
                let mut chars = symbol.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => BlockKind::from_symbol(c).map(SpecialAction::Force),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// One line without its terminator. Bytes that aren't UTF-8 are replaced
/// rather than rejected; `None` means end of input or a failed read.
fn read_input_line(input: &mut dyn BufRead) -> Option<String> {
    let mut buf = Vec::new();
    match input.read_until(b'\n', &mut buf) {
        Ok(0) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(&buf);
            Some(line.trim_end_matches(['\n', '\r']).to_string())
        }
        Err(err) => {
            warn!(%err, "input read failed");
            None
        }
    }
}

fn opp(idx: usize) -> usize {
    1 - idx
}

pub struct Game<D: Display> {
    players: [Player; 2],
    current: usize,
    high_score: u32,
    state: GameState,
    config: GameConfig,
    display: D,
    sequence_depth: u32,
}

impl<D: Display> Game<D> {
    pub fn new(config: GameConfig, display: D) -> Self {
        let config = config.clamped();
        let players = [Player::new(&config, 0), Player::new(&config, 1)];
        Self {
            players,
            current: 0,
            high_score: 0,
            state: GameState::AwaitingCommand,
            config,
            display,
            sequence_depth: 0,
        }
    }

    pub fn player(&self, idx: usize) -> &Player {
        &self.players[idx]
    }

    pub fn player_mut(&mut self, idx: usize) -> &mut Player {
        &mut self.players[idx]
    }

    /// Index of the player whose turn it is.
    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn into_display(self) -> D {
        self.display
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, GameState::GameOver { .. })
    }

    fn message(&mut self, text: &str) {
        self.display.message(text);
    }

    fn render(&mut self) {
        let p1 = self.players[0].view();
        let p2 = self.players[1].view();
        self.display.render(&p1, &p2);
    }

    /// Resets both players at `level` (clamped to 0..=4) and hands the
    /// first turn to player 1. The high score survives.
    pub fn start_new_game(&mut self, level: u8) {
        let level = level.min(MAX_LEVEL);
        for player in self.players.iter_mut() {
            player.reset(level);
            player.spawn_initial_blocks();
        }
        self.current = 0;
        self.state = GameState::AwaitingCommand;
        info!(level, "new game started");
        self.message(&format!(
            "New game started at level {level}. Player 1 moves first."
        ));
    }

    /// Reads command lines until the game ends or input runs out. An empty
    /// line counts as the end of input. Emits the final score summary and
    /// returns the terminal state.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> GameState {
        self.render();
        while !self.is_over() {
            let line = match read_input_line(&mut input) {
                Some(line) if !line.is_empty() => line,
                _ => {
                    self.state = GameState::InputEnded;
                    break;
                }
            };
            self.process_line(&line, &mut input);
        }

        let summary = format!(
            "Final scores - Player 1: {}, Player 2: {}",
            self.players[0].score(),
            self.players[1].score()
        );
        match self.state {
            GameState::GameOver { winner } => {
                info!(winner = winner.label(), "game over");
                self.message(&format!("Game over! {summary}"));
            }
            _ => {
                info!("input ended");
                self.message(&format!("Input ended. {summary}"));
            }
        }
        self.state
    }

    /// Runs every command on `line`, stopping early at game over, then
    /// redraws. `input` supplies the special-action choice if one comes up.
    pub fn process_line(&mut self, line: &str, input: &mut dyn BufRead) {
        for command in parse_line(line) {
            self.execute(command, input);
            if self.is_over() {
                break;
            }
        }
        self.render();
    }

    fn execute(&mut self, command: Command, input: &mut dyn BufRead) {
        debug!(player = self.current + 1, ?command, "executing");
        match command {
            Command::Left => {
                self.shift(Step::Left, input);
            }
            Command::Right => {
                self.shift(Step::Right, input);
            }
            Command::Down => {
                self.move_down();
            }
            Command::Drop => {
                self.drop_and_lock(input);
            }
            Command::Clockwise => {
                self.rotate(Step::Clockwise, input);
            }
            Command::CounterClockwise => {
                self.rotate(Step::CounterClockwise, input);
            }
            Command::LevelUp => self.level_up(),
            Command::LevelDown => self.level_down(),
            Command::Restart => self.restart(),
            Command::NoRandom(file) => self.set_no_random(&file),
            Command::Random => self.set_random(),
            Command::Sequence(file) => self.execute_sequence(&file, input),
            Command::Replace(kind) => {
                self.players[self.current].replace_current_block(kind);
                self.message(&format!("Current block replaced with {}.", kind.symbol()));
            }
        }
        if !self.is_over() {
            self.state = GameState::AwaitingCommand;
        }
    }

    fn shift(&mut self, step: Step, input: &mut dyn BufRead) -> MoveOutcome {
        let idx = self.current;
        if self.players[idx].current_block().is_none() {
            return MoveOutcome::Rejected;
        }
        if !self.players[idx].try_step(step) {
            let side = if step == Step::Left { "left" } else { "right" };
            self.message(&format!(
                "Invalid move: cannot move current block further {side}."
            ));
            return MoveOutcome::Rejected;
        }

        if self.players[idx].has_heavy_effect() {
            for _ in 0..self.config.heavy_drop_rows {
                if !self.players[idx].try_step(Step::Down) {
                    return self.lock_and_resolve("Heavy effect: block locked after falling.", input);
                }
            }
        }
        self.level_gravity("Auto-drop: block locked after falling.", input)
    }

    fn rotate(&mut self, step: Step, input: &mut dyn BufRead) -> MoveOutcome {
        let idx = self.current;
        if self.players[idx].current_block().is_none() {
            return MoveOutcome::Rejected;
        }
        if !self.players[idx].try_step(step) {
            let direction = if step == Step::Clockwise {
                "clockwise"
            } else {
                "counter-clockwise"
            };
            self.message(&format!(
                "Invalid rotation: cannot rotate block {direction} here."
            ));
            return MoveOutcome::Rejected;
        }
        if step == Step::CounterClockwise {
            self.players[idx].note_ccw_rotation();
        }
        self.level_gravity("Auto-drop: block locked after rotation.", input)
    }

    // Levels 3 and 4 pull the block down a row after each move or turn.
    fn level_gravity(&mut self, notice: &str, input: &mut dyn BufRead) -> MoveOutcome {
        let idx = self.current;
        if self.players[idx].is_heavy_level() && !self.players[idx].try_step(Step::Down) {
            return self.lock_and_resolve(notice, input);
        }
        MoveOutcome::Moved
    }

    fn move_down(&mut self) -> MoveOutcome {
        let idx = self.current;
        if self.players[idx].current_block().is_none() {
            return MoveOutcome::Rejected;
        }
        if self.players[idx].try_step(Step::Down) {
            MoveOutcome::Moved
        } else {
            self.message("Invalid move: block cannot move further down. Use 'drop' to lock it.");
            MoveOutcome::Rejected
        }
    }

    fn drop_and_lock(&mut self, input: &mut dyn BufRead) -> MoveOutcome {
        let idx = self.current;
        if self.players[idx].current_block().is_none() {
            return MoveOutcome::Rejected;
        }
        self.players[idx].hard_drop();
        self.lock_and_resolve("Block dropped and locked.", input)
    }

    fn lock_and_resolve(&mut self, notice: &str, input: &mut dyn BufRead) -> MoveOutcome {
        let rows = self.players[self.current].lock_current_block();
        self.message(notice);
        self.on_block_locked(rows, input);
        MoveOutcome::Locked
    }

    fn on_block_locked(&mut self, rows: usize, input: &mut dyn BufRead) {
        self.state = GameState::BlockLocked;
        let idx = self.current;
        let player = &mut self.players[idx];
        if rows > 0 {
            player.update_score(rows);
        }
        player.check_and_score_completed_block();
        let score = player.score();

        if score > self.high_score {
            self.high_score = score;
            self.message(&format!("New high score: {score}!"));
        }
        if rows > 0 {
            self.message(&format!("Block locked: cleared {rows} line(s)."));
        } else {
            self.message("Block locked: no lines cleared.");
        }

        if rows >= 2 {
            self.special_action(rows, input);
            if self.is_over() {
                return;
            }
        }

        self.players[idx].spawn_next_block();
        if !self.players[idx].can_place_current_block() {
            let winner = Winner::from_index(opp(idx));
            self.state = GameState::GameOver { winner };
            self.message(&format!(
                "{} wins! No space for the next block.",
                winner.label()
            ));
            return;
        }
        self.switch_turn();
    }

    fn special_action(&mut self, rows: usize, input: &mut dyn BufRead) {
        self.state = GameState::SpecialActionPending;
        self.message(&format!(
            "Special action! (cleared {rows} row(s)). Choose action: blind / heavy / force <block>."
        ));

        let Some(line) = read_input_line(input) else {
            self.message("No special action chosen. Skipped.");
            return;
        };
        let choice = line.trim();
        let attacker = self.current;
        let defender = opp(attacker);
        let Some(action) = SpecialAction::parse(choice) else {
            self.message(&format!(
                "Invalid special action: '{choice}'. No special effect applied."
            ));
            return;
        };
        info!(attacker = attacker + 1, ?action, "special action");

        match action {
            SpecialAction::Blind => {
                self.players[defender].apply_blind_effect();
                self.message("Special: BLIND applied to opponent's board.");
            }
            SpecialAction::Heavy => {
                self.players[defender].apply_heavy_effect();
                self.message("Special: HEAVY applied. Opponent's blocks will fall faster.");
            }
            SpecialAction::Force(kind) => {
                self.players[defender].apply_force_effect(kind);
                self.message(&format!(
                    "Special: FORCE applied. Opponent's next block is {}.",
                    kind.symbol()
                ));
                if !self.players[defender].can_place_current_block() {
                    let winner = Winner::from_index(attacker);
                    self.state = GameState::GameOver { winner };
                    self.message(&format!(
                        "{} wins! Forced block could not be placed.",
                        winner.label()
                    ));
                }
            }
        }
    }

    fn switch_turn(&mut self) {
        self.current = opp(self.current);
    }

    fn level_up(&mut self) {
        let level = self.players[self.current].level();
        if level < MAX_LEVEL && self.players[self.current].set_level(level + 1) {
            self.message(&format!("Level increased to {}.", level + 1));
        } else {
            self.message(&format!(
                "Level up not possible: already at maximum level {MAX_LEVEL}."
            ));
        }
    }

    fn level_down(&mut self) {
        let level = self.players[self.current].level();
        if level > 0 && self.players[self.current].set_level(level - 1) {
            self.message(&format!("Level decreased to {}.", level - 1));
        } else {
            self.message("Level down not possible: already at minimum level 0.");
        }
    }

    fn restart(&mut self) {
        self.start_new_game(0);
        self.message(&format!(
            "Game restarted at level 0. High score is preserved: {}.",
            self.high_score
        ));
    }

    fn set_no_random(&mut self, file: &str) {
        let level = self.players[self.current].level();
        if level < 3 {
            self.message(&format!(
                "norandom only works for levels 3 and 4. Current level is {level}."
            ));
            return;
        }
        if self.players[self.current].set_no_random(PathBuf::from(file)) {
            self.message(&format!(
                "Non-random mode enabled at level {level} using file {file}."
            ));
        } else {
            self.message(&format!(
                "Could not read blocks from {file}. Random mode kept."
            ));
        }
    }

    fn set_random(&mut self) {
        let level = self.players[self.current].level();
        if level < 3 {
            self.message(&format!(
                "random only works for levels 3 and 4. Current level is {level}."
            ));
            return;
        }
        self.players[self.current].set_random();
        self.message(&format!("Random mode restored at level {level}."));
    }

    /// Runs each whitespace-separated token of `file` as a command line.
    /// `norandom` and `sequence` take the following token as their filename.
    fn execute_sequence(&mut self, file: &str, input: &mut dyn BufRead) {
        if self.sequence_depth >= MAX_SEQUENCE_DEPTH {
            self.message(&format!("Sequence files nested too deeply. Skipping {file}."));
            return;
        }
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(err) => {
                warn!(file, %err, "could not open sequence file");
                self.message(&format!("Error: could not open sequence file {file}."));
                return;
            }
        };
        self.message(&format!("Executing command sequence from file {file}."));

        self.sequence_depth += 1;
        let mut tokens = text.split_whitespace();
        while let Some(token) = tokens.next() {
            let takes_file = matches!(
                resolve(split_multiplier(token).1),
                Some("norandom" | "sequence")
            );
            let argument = if takes_file { tokens.next() } else { None };
            let line = match argument {
                Some(arg) => format!("{token} {arg}"),
                None => token.to_string(),
            };
            self.process_line(&line, input);
            if self.is_over() {
                break;
            }
        }
        self.sequence_depth -= 1;

        if !self.is_over() {
            self.message(&format!("Finished executing sequence from {file}."));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingDisplay;
    use std::io::{self, Cursor};

    fn game_at(level: u8) -> Game<RecordingDisplay> {
        let missing = std::env::temp_dir().join("biquadris_game_unit_no_script.txt");
        let config = GameConfig {
            seed: Some(3),
            script_file1: missing.clone(),
            script_file2: missing,
            ..GameConfig::default()
        };
        let mut game = Game::new(config, RecordingDisplay::default());
        game.start_new_game(level);
        game
    }

    fn no_input() -> Cursor<&'static [u8]> {
        Cursor::new(&b""[..])
    }

    #[test]
    fn special_action_parsing() {
        assert_eq!(SpecialAction::parse("blind"), Some(SpecialAction::Blind));
        assert_eq!(SpecialAction::parse("  heavy "), Some(SpecialAction::Heavy));
        assert_eq!(
            SpecialAction::parse("force Z"),
            Some(SpecialAction::Force(BlockKind::Z))
        );
        assert_eq!(SpecialAction::parse("force"), None);
        assert_eq!(SpecialAction::parse("force ZZ"), None);
        assert_eq!(SpecialAction::parse("force *"), None);
        assert_eq!(SpecialAction::parse("blinding"), None);
        assert_eq!(SpecialAction::parse(""), None);
    }

    #[test]
    fn rejected_shift_reports_and_keeps_turn() {
        let mut game = game_at(0);
        assert_eq!(game.shift(Step::Left, &mut no_input()), MoveOutcome::Rejected);
        assert!(game.display().contains("further left"));
        assert_eq!(game.current_player(), 0);
    }

    #[test]
    fn heavy_level_shift_falls_one_row() {
        let mut game = game_at(3);
        assert_eq!(game.shift(Step::Right, &mut no_input()), MoveOutcome::Moved);
        let anchor = game.player(0).current_block().map(|b| b.anchor());
        assert_eq!(anchor, Some(crate::block::Position::new(7, 1)));
    }

    #[test]
    fn heavy_effect_locks_when_block_cannot_fall() {
        let mut game = game_at(0);
        let player = game.player_mut(0);
        player.replace_current_block(BlockKind::I);
        for _ in 0..6 {
            assert!(player.try_step(Step::Right));
        }
        player.apply_heavy_effect();
        // ledge under the right side of the spawn row
        for col in 5..10 {
            player.board_mut().set_cell(7, col, Some(BlockKind::O));
        }
        assert_eq!(game.shift(Step::Right, &mut no_input()), MoveOutcome::Locked);
        assert!(game.display().contains("Heavy effect: block locked"));
        assert_eq!(game.current_player(), 1);
    }

    // Parks an I on columns 6..=9 of the spawn row with a ledge under it,
    // leaving the spawn corner free for the next block.
    fn i_block_on_ledge(game: &mut Game<RecordingDisplay>, ledge: std::ops::Range<i32>) {
        let player = game.player_mut(0);
        player.replace_current_block(BlockKind::I);
        for _ in 0..6 {
            assert!(player.try_step(Step::Right));
        }
        for col in ledge {
            player.board_mut().set_cell(7, col, Some(BlockKind::O));
        }
    }

    #[test]
    fn heavy_level_shift_locks_on_a_ledge() {
        let mut game = game_at(3);
        i_block_on_ledge(&mut game, 7..11);
        assert_eq!(game.shift(Step::Right, &mut no_input()), MoveOutcome::Locked);
        assert!(game.display().contains("Auto-drop: block locked after falling."));
        assert_eq!(game.player(0).board().cell(6, 10), Some(BlockKind::I));
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn heavy_level_rotation_locks_on_a_ledge() {
        let mut game = game_at(3);
        i_block_on_ledge(&mut game, 6..10);
        assert_eq!(game.rotate(Step::Clockwise, &mut no_input()), MoveOutcome::Locked);
        assert!(game.display().contains("Auto-drop: block locked after rotation."));
        // stood up on its left end
        assert_eq!(game.player(0).board().cell(3, 6), Some(BlockKind::I));
        assert_eq!(game.player(0).board().cell(6, 7), None);
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn blocked_rotation_leaves_block_in_place() {
        let mut game = game_at(0);
        game.player_mut(0).replace_current_block(BlockKind::I);
        game.player_mut(0).board_mut().set_cell(5, 0, Some(BlockKind::T));
        let before = game.player(0).current_block().cloned();

        for step in [Step::Clockwise, Step::CounterClockwise] {
            assert_eq!(game.rotate(step, &mut no_input()), MoveOutcome::Rejected);
            assert_eq!(game.player(0).current_block().cloned(), before);
        }
        assert!(game.display().contains("cannot rotate block clockwise here"));
        assert!(game.display().contains("cannot rotate block counter-clockwise here"));
        assert_eq!(game.current_player(), 0);
    }

    #[test]
    fn down_never_locks() {
        let mut game = game_at(0);
        for _ in 0..14 {
            assert_eq!(game.move_down(), MoveOutcome::Moved);
        }
        assert_eq!(game.move_down(), MoveOutcome::Rejected);
        assert_eq!(game.current_player(), 0);
    }

    #[test]
    fn unreadable_special_choice_means_no_action() {
        struct Broken;
        impl io::Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }
        }
        let mut game = game_at(0);
        let mut input = io::BufReader::new(Broken);
        game.special_action(2, &mut input);
        assert!(game.display().contains("No special action chosen"));
        assert!(!game.player(1).has_blind_effect());
        assert!(!game.player(1).has_heavy_effect());
    }

    #[test]
    fn level_bounds_are_reported() {
        let mut game = game_at(0);
        game.process_line("leveldown", &mut no_input());
        assert!(game.display().contains("Level down not possible"));
        game.process_line("5levelu", &mut no_input());
        assert_eq!(game.player(0).level(), 4);
        assert!(game.display().contains("Level up not possible"));
    }

    #[test]
    fn winner_labels() {
        assert_eq!(Winner::from_index(0).label(), "Player 1");
        assert_eq!(Winner::from_index(1), Winner::PlayerTwo);
    }
}
