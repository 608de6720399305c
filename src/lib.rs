pub mod block;
pub mod board;
pub mod command;
pub mod config;
pub mod display;
pub mod game;
pub mod level;
pub mod player;

pub use block::{Block, BlockKind, Position};
pub use board::Board;
pub use command::{parse_line, Command};
pub use config::GameConfig;
pub use display::{Display, RecordingDisplay, TextDisplay};
pub use game::{Game, GameState, MoveOutcome, SpecialAction, Winner};
pub use level::{Level, LevelSettings};
pub use player::{Player, PlayerView, Step};
