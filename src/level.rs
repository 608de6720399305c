use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::block::{Block, BlockKind, Position};

// S and Z once, everything else twice.
const LEVEL1_POOL: [BlockKind; 12] = [
    BlockKind::S,
    BlockKind::Z,
    BlockKind::I,
    BlockKind::I,
    BlockKind::J,
    BlockKind::J,
    BlockKind::L,
    BlockKind::L,
    BlockKind::O,
    BlockKind::O,
    BlockKind::T,
    BlockKind::T,
];

// S and Z at 2/9 each, the rest at 1/9.
const LEVEL4_POOL: [BlockKind; 9] = [
    BlockKind::S,
    BlockKind::S,
    BlockKind::Z,
    BlockKind::Z,
    BlockKind::I,
    BlockKind::J,
    BlockKind::L,
    BlockKind::O,
    BlockKind::T,
];

/// Per-player inputs every level is rebuilt from. Lives on the player so a
/// level change never forgets an active override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSettings {
    pub script_file: PathBuf,
    pub no_random_file: Option<PathBuf>,
    pub star_interval: u32,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            script_file: PathBuf::new(),
            no_random_file: None,
            star_interval: 5,
        }
    }
}

/// Block symbols read from a file, replayed in order and wrapping around.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    symbols: Vec<char>,
    idx: usize,
}

impl Sequence {
    pub fn from_symbols(symbols: Vec<char>) -> Self {
        Self { symbols, idx: 0 }
    }

    /// Reads whitespace-separated tokens; only the first character of each is
    /// kept. An unreadable file gives an empty sequence.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_symbols(
                text.split_whitespace()
                    .filter_map(|token| token.chars().next())
                    .collect(),
            ),
            Err(err) => {
                warn!(file = %path.display(), %err, "could not read block sequence");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn next(&mut self) -> Option<char> {
        let symbol = *self.symbols.get(self.idx)?;
        self.idx += 1;
        if self.idx >= self.symbols.len() {
            self.idx = 0;
        }
        Some(symbol)
    }
}

/// Block generation policy and hazards for one difficulty tier.
#[derive(Clone, Debug)]
pub enum Level {
    /// Scripted sequence from the player's script file.
    Zero { script: Sequence },
    /// Weighted draw favouring everything but S and Z.
    One { rng: StdRng },
    /// Uniform draw.
    Two { rng: StdRng },
    /// Uniform draw, heavy, overridable with a fixed sequence.
    Three {
        rng: StdRng,
        no_random: Option<Sequence>,
    },
    /// S/Z-weighted draw, heavy, overridable, drops a star after
    /// `star_interval` consecutive locks without a clear.
    Four {
        rng: StdRng,
        no_random: Option<Sequence>,
        locks_without_clear: u32,
        star_interval: u32,
        star_pending: bool,
    },
}

impl Level {
    /// Builds the policy for `tier`. Anything above 4 falls back to tier 0.
    pub fn new(tier: u8, settings: &LevelSettings, rng: StdRng) -> Self {
        let no_random = || {
            settings
                .no_random_file
                .as_deref()
                .map(Sequence::load)
                .filter(|seq| !seq.is_empty())
        };
        let level = match tier {
            1 => Level::One { rng },
            2 => Level::Two { rng },
            3 => Level::Three {
                rng,
                no_random: no_random(),
            },
            4 => Level::Four {
                rng,
                no_random: no_random(),
                locks_without_clear: 0,
                star_interval: settings.star_interval,
                star_pending: false,
            },
            _ => {
                let mut script = Sequence::load(&settings.script_file);
                if script.is_empty() {
                    script = Sequence::from_symbols(
                        BlockKind::STANDARD.iter().map(|k| k.symbol()).collect(),
                    );
                }
                Level::Zero { script }
            }
        };
        debug!(tier = level.tier(), "level constructed");
        level
    }

    pub fn tier(&self) -> u8 {
        match self {
            Level::Zero { .. } => 0,
            Level::One { .. } => 1,
            Level::Two { .. } => 2,
            Level::Three { .. } => 3,
            Level::Four { .. } => 4,
        }
    }

    pub fn next_kind(&mut self) -> BlockKind {
        match self {
            Level::Zero { script } => script.next().map_or(BlockKind::T, symbol_to_kind),
            Level::One { rng } => draw(&LEVEL1_POOL, rng),
            Level::Two { rng } => draw(&BlockKind::STANDARD, rng),
            Level::Three { rng, no_random } => match no_random.as_mut().and_then(Sequence::next) {
                Some(symbol) => symbol_to_kind(symbol),
                None => draw(&BlockKind::STANDARD, rng),
            },
            Level::Four { rng, no_random, .. } => match no_random.as_mut().and_then(Sequence::next) {
                Some(symbol) => symbol_to_kind(symbol),
                None => draw(&LEVEL4_POOL, rng),
            },
        }
    }

    pub fn next_block(&mut self, spawn: Position) -> Block {
        Block::new(self.next_kind(), spawn)
    }

    pub fn on_block_locked(&mut self, rows_cleared: usize) {
        if let Level::Four {
            locks_without_clear,
            star_interval,
            star_pending,
            ..
        } = self
        {
            if rows_cleared > 0 {
                *locks_without_clear = 0;
            } else {
                *locks_without_clear += 1;
                if *star_interval > 0 && *locks_without_clear % *star_interval == 0 {
                    *star_pending = true;
                }
            }
        }
    }

    pub fn is_heavy(&self) -> bool {
        matches!(self, Level::Three { .. } | Level::Four { .. })
    }

    /// Switches to a fixed sequence read from `file`. Returns whether a
    /// non-empty sequence is now active; tiers 0 to 2 ignore the request.
    pub fn set_no_random(&mut self, file: &Path) -> bool {
        match self {
            Level::Three { no_random, .. } | Level::Four { no_random, .. } => {
                let seq = Sequence::load(file);
                *no_random = (!seq.is_empty()).then_some(seq);
                no_random.is_some()
            }
            Level::Zero { .. } | Level::One { .. } | Level::Two { .. } => false,
        }
    }

    pub fn set_random(&mut self) {
        if let Level::Three { no_random, .. } | Level::Four { no_random, .. } = self {
            *no_random = None;
        }
    }

    pub fn should_drop_star(&self) -> bool {
        matches!(self, Level::Four { star_pending: true, .. })
    }

    pub fn clear_star_pending(&mut self) {
        if let Level::Four { star_pending, .. } = self {
            *star_pending = false;
        }
    }
}

fn draw(pool: &[BlockKind], rng: &mut StdRng) -> BlockKind {
    pool.choose(rng).copied().unwrap_or(BlockKind::T)
}

// Unknown symbols in a sequence file become T blocks.
fn symbol_to_kind(symbol: char) -> BlockKind {
    BlockKind::from_symbol(symbol).unwrap_or(BlockKind::T)
}
