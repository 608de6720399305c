use std::io::{self, Write};

use crate::block::{Block, BlockKind, Position};
use crate::player::PlayerView;

/// Consumer of engine output. Nothing it does feeds back into the game.
pub trait Display {
    fn message(&mut self, text: &str);
    fn render(&mut self, p1: &PlayerView, p2: &PlayerView);
}

const RESERVE_ROWS: usize = 3;
const GAP: &str = "    ";

/// Side-by-side text boards, written to any `Write` (stdout by default).
pub struct TextDisplay<W: Write = io::Stdout> {
    out: W,
}

impl TextDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TextDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn board_line(view: &PlayerView, row: usize) -> String {
        view.field[row]
            .iter()
            .enumerate()
            .map(|(col, &c)| if view.blind && is_blinded(row, col) { '?' } else { c })
            .collect()
    }

    fn write_frame(&mut self, p1: &PlayerView, p2: &PlayerView) -> io::Result<()> {
        let width = p1.field.first().map_or(0, Vec::len);
        let rule = "-".repeat(width);
        let level = format!("Level:{:>5}", p1.level);
        let score = format!("Score:{:>5}", p1.score);
        writeln!(self.out, "{level:<width$}{GAP}Level:{:>5}", p2.level)?;
        writeln!(self.out, "{score:<width$}{GAP}Score:{:>5}", p2.score)?;
        writeln!(self.out, "{rule}{GAP}{rule}")?;
        let rows = p1.field.len().min(p2.field.len());
        for row in RESERVE_ROWS.min(rows)..rows {
            writeln!(
                self.out,
                "{}{GAP}{}",
                Self::board_line(p1, row),
                Self::board_line(p2, row)
            )?;
        }
        writeln!(self.out, "{rule}{GAP}{rule}")?;
        writeln!(self.out, "{:<width$}{GAP}Next:", "Next:")?;
        let left = preview(p1.next);
        let right = preview(p2.next);
        for (l, r) in left.iter().zip(right.iter()) {
            writeln!(self.out, "{l:<width$}{GAP}{r}")?;
        }
        self.out.flush()
    }
}

impl<W: Write> Display for TextDisplay<W> {
    fn message(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn render(&mut self, p1: &PlayerView, p2: &PlayerView) {
        let _ = self.write_frame(p1, p2);
    }
}

// Blind covers columns 2..=8 of rows 6..=18.
fn is_blinded(row: usize, col: usize) -> bool {
    (6..=18).contains(&row) && (2..=8).contains(&col)
}

/// Two text rows showing a block in spawn orientation.
fn preview(kind: Option<BlockKind>) -> [String; 2] {
    let mut lines = [String::new(), String::new()];
    let Some(kind) = kind else {
        return lines;
    };
    let block = Block::new(kind, Position::new(0, 0));
    for (row, line) in lines.iter_mut().enumerate() {
        let cols: Vec<i32> = block
            .cells()
            .iter()
            .filter(|p| p.row == row as i32)
            .map(|p| p.col)
            .collect();
        if let Some(&max) = cols.iter().max() {
            *line = (0..=max)
                .map(|c| if cols.contains(&c) { kind.symbol() } else { ' ' })
                .collect();
        }
    }
    lines
}

/// Keeps every message and counts renders; for tests and headless drivers.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub messages: Vec<String>,
    pub renders: usize,
    pub last_frame: Option<(PlayerView, PlayerView)>,
}

impl RecordingDisplay {
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl Display for RecordingDisplay {
    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn render(&mut self, p1: &PlayerView, p2: &PlayerView) {
        self.renders += 1;
        self.last_frame = Some((p1.clone(), p2.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(blind: bool, next: Option<BlockKind>) -> PlayerView {
        let mut field = vec![vec![' '; 11]; 21];
        field[10][4] = 'Z';
        field[20][0] = 'I';
        PlayerView {
            level: 3,
            score: 42,
            field,
            next,
            heavy: false,
            blind,
        }
    }

    fn render_text(p1: &PlayerView, p2: &PlayerView) -> Vec<String> {
        let mut display = TextDisplay::new(Vec::new());
        display.render(p1, p2);
        String::from_utf8(display.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn renders_both_boards_without_reserve_rows() {
        let lines = render_text(&view(false, Some(BlockKind::L)), &view(false, None));
        assert!(lines[0].starts_with("Level:    3"));
        assert!(lines[1].contains("Score:   42"));
        // header, score, rule, 18 board rows, rule, "Next:", two preview rows
        assert_eq!(lines.len(), 3 + 18 + 1 + 1 + 2);
        assert_eq!(lines[3 + 7], format!("{0}    {0}", "    Z      "));
        assert_eq!(lines[23].trim_end(), "  L");
        assert_eq!(lines[24].trim_end(), "LLL");
    }

    #[test]
    fn blind_masks_the_middle_of_the_board() {
        let lines = render_text(&view(true, None), &view(false, None));
        let row10 = &lines[3 + 7];
        assert_eq!(&row10[..11], "  ???????  ");
        assert_eq!(&row10[15..], "    Z      ");
        // bottom rows stay visible
        assert_eq!(&lines[3 + 17][..11], "I          ");
    }

    #[test]
    fn recording_display_keeps_messages() {
        let mut display = RecordingDisplay::default();
        display.message("hello there");
        display.render(&view(false, None), &view(false, None));
        assert!(display.contains("hello"));
        assert_eq!(display.renders, 1);
        assert!(display.last_frame.is_some());
    }
}
