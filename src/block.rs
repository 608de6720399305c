use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    I,
    J,
    L,
    O,
    S,
    Z,
    T,
    Star,
}

impl BlockKind {
    /// The seven tetrominoes, in canonical sequence order.
    pub const STANDARD: [BlockKind; 7] = [
        BlockKind::I,
        BlockKind::J,
        BlockKind::L,
        BlockKind::O,
        BlockKind::S,
        BlockKind::Z,
        BlockKind::T,
    ];

    pub fn symbol(self) -> char {
        match self {
            BlockKind::I => 'I',
            BlockKind::J => 'J',
            BlockKind::L => 'L',
            BlockKind::O => 'O',
            BlockKind::S => 'S',
            BlockKind::Z => 'Z',
            BlockKind::T => 'T',
            BlockKind::Star => '*',
        }
    }

    /// Parses a tetromino symbol. The star is never produced here: it only
    /// enters play through the level-4 hazard.
    pub fn from_symbol(symbol: char) -> Option<BlockKind> {
        match symbol {
            'I' => Some(BlockKind::I),
            'J' => Some(BlockKind::J),
            'L' => Some(BlockKind::L),
            'O' => Some(BlockKind::O),
            'S' => Some(BlockKind::S),
            'Z' => Some(BlockKind::Z),
            'T' => Some(BlockKind::T),
            _ => None,
        }
    }

    /// Spawn-orientation cells as (row, col), row growing downwards.
    fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            // IIII
            BlockKind::I => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            // J
            // JJJ
            BlockKind::J => &[(0, 0), (1, 0), (1, 1), (1, 2)],
            //   L
            // LLL
            BlockKind::L => &[(0, 2), (1, 0), (1, 1), (1, 2)],
            // OO
            // OO
            BlockKind::O => &[(0, 0), (0, 1), (1, 0), (1, 1)],
            //  SS
            // SS
            BlockKind::S => &[(0, 1), (0, 2), (1, 0), (1, 1)],
            // ZZ
            //  ZZ
            BlockKind::Z => &[(0, 0), (0, 1), (1, 1), (1, 2)],
            // TTT
            //  T
            BlockKind::T => &[(0, 0), (0, 1), (0, 2), (1, 1)],
            BlockKind::Star => &[(0, 0)],
        }
    }
}

/// A falling piece: an anchor plus cell offsets relative to it.
///
/// Offsets are kept normalized (minimum row and column are both zero), so the
/// anchor is always the top-left corner of the piece's bounding box. Moves
/// never check validity; that is the board's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    anchor: Position,
    cells: Vec<Position>,
    ccw_rotations: u32,
}

impl Block {
    pub fn new(kind: BlockKind, anchor: Position) -> Self {
        let cells = kind
            .offsets()
            .iter()
            .map(|&(row, col)| Position::new(row, col))
            .collect();
        Self {
            kind,
            anchor,
            cells,
            ccw_rotations: 0,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn symbol(&self) -> char {
        self.kind.symbol()
    }

    pub fn anchor(&self) -> Position {
        self.anchor
    }

    pub fn cells(&self) -> &[Position] {
        &self.cells
    }

    pub fn ccw_rotations(&self) -> u32 {
        self.ccw_rotations
    }

    pub fn note_ccw_rotation(&mut self) {
        self.ccw_rotations = self.ccw_rotations.saturating_add(1);
    }

    pub fn move_left(&mut self) {
        self.anchor.col -= 1;
    }

    pub fn move_right(&mut self) {
        self.anchor.col += 1;
    }

    pub fn move_down(&mut self) {
        self.anchor.row += 1;
    }

    pub fn move_up(&mut self) {
        self.anchor.row -= 1;
    }

    pub fn absolute_cells(&self) -> Vec<Position> {
        self.cells
            .iter()
            .map(|p| Position::new(self.anchor.row + p.row, self.anchor.col + p.col))
            .collect()
    }

    /// Quarter turn clockwise, `(r, c) -> (c, -r)`, keeping the bottom-left
    /// corner of the bounding box where it was.
    pub fn rotate_cw(&mut self) {
        self.rotate_about_bottom_left(|p| Position::new(p.col, -p.row));
    }

    /// Exact inverse of [`Block::rotate_cw`], offsets and anchor included.
    pub fn rotate_ccw(&mut self) {
        self.rotate_about_bottom_left(|p| Position::new(-p.col, p.row));
    }

    fn rotate_about_bottom_left(&mut self, transform: impl Fn(Position) -> Position) {
        let (old_min, old_max) = bounds(&self.cells);
        let bottom = self.anchor.row + old_max.row;
        let left = self.anchor.col + old_min.col;

        for p in self.cells.iter_mut() {
            *p = transform(*p);
        }
        self.normalize();

        let (_, new_max) = bounds(&self.cells);
        self.anchor = Position::new(bottom - new_max.row, left);
    }

    fn normalize(&mut self) {
        let (min, _) = bounds(&self.cells);
        for p in self.cells.iter_mut() {
            p.row -= min.row;
            p.col -= min.col;
        }
    }
}

fn bounds(cells: &[Position]) -> (Position, Position) {
    let mut min = Position::new(i32::MAX, i32::MAX);
    let mut max = Position::new(i32::MIN, i32::MIN);
    for p in cells {
        min.row = min.row.min(p.row);
        min.col = min.col.min(p.col);
        max.row = max.row.max(p.row);
        max.col = max.col.max(p.col);
    }
    (min, max)
}
