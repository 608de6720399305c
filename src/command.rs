use tracing::debug;

use crate::block::BlockKind;

/// Full command names, matched by unique prefix.
pub const VOCABULARY: [&str; 12] = [
    "left",
    "right",
    "down",
    "drop",
    "clockwise",
    "counterclockwise",
    "levelup",
    "leveldown",
    "restart",
    "norandom",
    "random",
    "sequence",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Left,
    Right,
    Down,
    Drop,
    Clockwise,
    CounterClockwise,
    LevelUp,
    LevelDown,
    Restart,
    NoRandom(String),
    Random,
    Sequence(String),
    /// Replace the current block (testing aid).
    Replace(BlockKind),
}

const BLOCK_WORDS: [&str; 7] = ["I", "J", "L", "O", "S", "Z", "T"];

/// Repeat counts above this are clamped.
pub const MAX_REPEAT: u32 = 1_000;

/// Resolves a command word to its full name. Block letters must match
/// exactly; anything else must be a prefix of exactly one vocabulary entry.
pub fn resolve(word: &str) -> Option<&'static str> {
    if word.is_empty() {
        return None;
    }
    if let Some(block) = BLOCK_WORDS.iter().copied().find(|b| *b == word) {
        return Some(block);
    }
    let mut matches = VOCABULARY.iter().copied().filter(|name| name.starts_with(word));
    match (matches.next(), matches.next()) {
        (Some(name), None) => Some(name),
        _ => None,
    }
}

/// Splits a leading run of decimal digits off `word`. No digits means a
/// multiplier of one.
pub fn split_multiplier(word: &str) -> (u32, &str) {
    let digits = word.len() - word.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return (1, word);
    }
    let multiplier = word[..digits].bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });
    (multiplier, &word[digits..])
}

/// Turns one input line into the commands it stands for, in execution order.
/// Unknown, ambiguous or incomplete lines give no commands.
pub fn parse_line(line: &str) -> Vec<Command> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Vec::new();
    };
    let argument = words.next();
    let (multiplier, word) = split_multiplier(first);
    let Some(name) = resolve(word) else {
        debug!(line, "unrecognised command");
        return Vec::new();
    };

    let single = match name {
        "restart" => Some(Command::Restart),
        "random" => Some(Command::Random),
        "norandom" => match argument {
            Some(file) => Some(Command::NoRandom(file.to_string())),
            None => return Vec::new(),
        },
        "sequence" => match argument {
            Some(file) => Some(Command::Sequence(file.to_string())),
            None => return Vec::new(),
        },
        _ => None,
    };
    if let Some(command) = single {
        return vec![command];
    }

    let command = match name {
        "left" => Command::Left,
        "right" => Command::Right,
        "down" => Command::Down,
        "drop" => Command::Drop,
        "clockwise" => Command::Clockwise,
        "counterclockwise" => Command::CounterClockwise,
        "levelup" => Command::LevelUp,
        "leveldown" => Command::LevelDown,
        other => match other.chars().next().and_then(BlockKind::from_symbol) {
            Some(kind) => Command::Replace(kind),
            None => return Vec::new(),
        },
    };
    let repeat = multiplier.min(MAX_REPEAT);
    debug!(?command, repeat, "resolved command");
    vec![command; repeat as usize]
}
