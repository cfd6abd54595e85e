//! Table detection over positioned lines.
//!
//! A line is a list of cells with horizontal positions. Consecutive lines
//! with two or more cells form a table; columns are anchored on the widest
//! row and every other row's cells snap to the nearest anchor.

/// Minimum run of consecutive spaces treated as a column gap inside one string.
const MIN_SPACE_GAP: usize = 3;

/// Minimum number of multi-cell lines for a block to count as a table.
const MIN_TABLE_ROWS: usize = 2;

/// A cell of text at a horizontal position (PDF points).
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f32,
    pub text: String,
}

/// A line of cells sharing a baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub y: f32,
    pub cells: Vec<Cell>,
}

impl Line {
    pub fn is_multi_cell(&self) -> bool {
        self.cells.len() >= 2
    }

    /// Cells joined with single spaces.
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split a string into cells on tabs, pipes, or runs of 3+ spaces.
///
/// Returns `(char_offset, text)` pairs with empty segments dropped, so
/// `"| K | 4.2 |"` yields two cells.
pub fn split_cells(text: &str) -> Vec<(usize, String)> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut space_run = 0usize;

    for (i, ch) in text.chars().enumerate() {
        match ch {
            '\t' | '|' => {
                flush(&mut current, start, &mut cells);
                start = i + 1;
                space_run = 0;
            }
            ' ' => {
                space_run += 1;
                current.push(ch);
                if space_run == MIN_SPACE_GAP {
                    let keep = current.chars().count() - MIN_SPACE_GAP;
                    let head: String = current.chars().take(keep).collect();
                    current = head;
                    flush(&mut current, start, &mut cells);
                    start = i + 1;
                } else if space_run > MIN_SPACE_GAP {
                    current.clear();
                    start = i + 1;
                }
            }
            _ => {
                space_run = 0;
                current.push(ch);
            }
        }
    }
    flush(&mut current, start, &mut cells);

    cells
}

fn flush(current: &mut String, start: usize, cells: &mut Vec<(usize, String)>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        let lead = current.chars().take_while(|c| c.is_whitespace()).count();
        cells.push((start + lead, trimmed.to_string()));
    }
    current.clear();
}

/// Group lines into tables: maximal runs of consecutive multi-cell lines.
pub fn detect_tables(lines: &[Line]) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut block: Vec<&Line> = Vec::new();

    for line in lines {
        if line.is_multi_cell() {
            block.push(line);
        } else {
            if block.len() >= MIN_TABLE_ROWS {
                tables.push(align_rows(&block));
            }
            block.clear();
        }
    }
    if block.len() >= MIN_TABLE_ROWS {
        tables.push(align_rows(&block));
    }

    tables
}

/// Snap each row's cells onto the column anchors of the widest row.
fn align_rows(block: &[&Line]) -> Vec<Vec<String>> {
    let anchors: Vec<f32> = block
        .iter()
        .max_by_key(|line| line.cells.len())
        .map(|line| line.cells.iter().map(|c| c.x).collect())
        .unwrap_or_default();

    block
        .iter()
        .map(|line| {
            let mut row = vec![String::new(); anchors.len()];
            for cell in &line.cells {
                let column = nearest_anchor(&anchors, cell.x);
                if row[column].is_empty() {
                    row[column] = cell.text.clone();
                } else {
                    row[column].push(' ');
                    row[column].push_str(&cell.text);
                }
            }
            row
        })
        .collect()
}

fn nearest_anchor(anchors: &[f32], x: f32) -> usize {
    anchors
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
