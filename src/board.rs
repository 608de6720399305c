use crate::block::{Block, BlockKind};

pub const DEFAULT_ROWS: usize = 21;
pub const DEFAULT_COLS: usize = 11;

/// Occupancy grid, row 0 at the top. Each cell is empty or remembers the kind
/// of block that was locked into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Option<BlockKind>>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl Board {
    /// Both dimensions are raised to at least one.
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![vec![None; cols]; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn grid(&self) -> &[Vec<Option<BlockKind>>] {
        &self.cells
    }

    fn index(&self, row: i32, col: i32) -> Option<(usize, usize)> {
        if row < 0 || col < 0 {
            return None;
        }
        let (r, c) = (row as usize, col as usize);
        if r >= self.rows || c >= self.cols {
            return None;
        }
        Some((r, c))
    }

    /// Out-of-bounds reads as empty.
    pub fn cell(&self, row: i32, col: i32) -> Option<BlockKind> {
        self.index(row, col).and_then(|(r, c)| self.cells[r][c])
    }

    pub fn set_cell(&mut self, row: i32, col: i32, value: Option<BlockKind>) {
        if let Some((r, c)) = self.index(row, col) {
            self.cells[r][c] = value;
        }
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        self.cells
            .get(row)
            .is_none_or(|cells| cells.iter().all(Option::is_none))
    }

    pub fn can_place(&self, block: &Block) -> bool {
        block.absolute_cells().iter().all(|p| match self.index(p.row, p.col) {
            Some((r, c)) => self.cells[r][c].is_none(),
            None => false,
        })
    }

    /// Writes the block's kind into every cell it covers. Cells outside the
    /// grid are dropped; callers gate on [`Board::can_place`].
    pub fn lock_block(&mut self, block: &Block) {
        let kind = block.kind();
        for p in block.absolute_cells() {
            if let Some((r, c)) = self.index(p.row, p.col) {
                self.cells[r][c] = Some(kind);
            }
        }
    }

    /// Removes every full row, compacting the rows above it downwards.
    /// Returns how many rows were cleared.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        let mut r = self.rows;
        while r > 0 {
            let row = r - 1;
            if self.cells[row].iter().all(Option::is_some) {
                cleared += 1;
                // move everything above this row down by one
                for pull in (1..=row).rev() {
                    self.cells[pull] = self.cells[pull - 1].clone();
                }
                self.cells[0] = vec![None; self.cols];
                // do not advance: the row above has just shifted into `row`
            } else {
                r -= 1;
            }
        }
        cleared
    }

    /// Moves the block down until the next step would be invalid.
    pub fn drop_to_bottom(&self, block: &mut Block) {
        loop {
            block.move_down();
            if !self.can_place(block) {
                block.move_up();
                break;
            }
        }
    }
}
