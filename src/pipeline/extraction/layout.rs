//! Table-aware page parsing from content streams.
//!
//! Walks each page's content operators with lopdf, tracking the text and
//! graphics matrices to place every shown string on the page. Runs are
//! grouped into lines by baseline, lines into cells by horizontal gaps,
//! and consecutive multi-cell lines into tables.
//!
//! Shown strings are decoded through each font's `/Encoding` or
//! `/ToUnicode` map. Glyph widths are estimated (no font metrics), which is
//! enough to tell a word gap from a column gap.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};

use super::pdf::decode_pdf_string;
use super::table_detect::{detect_tables, split_cells, Cell, Line};
use super::types::{LayoutPage, TableParser};
use super::ExtractionError;

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH_EM: f32 = 0.5;

/// Horizontal gap (in ems) above which two runs are separate cells.
const CELL_GAP_EM: f32 = 2.0;

/// Horizontal gap (in ems) above which two runs are separate words.
const WORD_GAP_EM: f32 = 0.15;

/// TJ adjustment (thousandths of an em) treated as a word space.
const TJ_WORD_SPACE: f32 = 200.0;

/// TJ adjustment treated as a column jump.
const TJ_COLUMN_JUMP: f32 = 1500.0;

const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Table-aware parser backed by lopdf content streams.
pub struct LopdfLayoutParser;

impl TableParser for LopdfLayoutParser {
    fn parse_pages(
        &self,
        pdf_bytes: &[u8],
    ) -> Result<Vec<Result<LayoutPage, ExtractionError>>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::DocumentOpen(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(ExtractionError::DocumentOpen("document is encrypted".into()));
        }

        let pages = doc
            .get_pages()
            .into_iter()
            .enumerate()
            .map(|(idx, (_, page_id))| {
                let page_number = idx + 1;
                let content = doc
                    .get_page_content(page_id)
                    .map_err(|e| ExtractionError::PageExtraction {
                        page: page_number,
                        reason: format!("unreadable content stream: {e}"),
                    })?;
                let operations = Content::decode(&content)
                    .map_err(|e| ExtractionError::PageExtraction {
                        page: page_number,
                        reason: format!("content stream decode failed: {e}"),
                    })?
                    .operations;

                let fonts = PageFonts::load(&doc, page_id);
                let runs = collect_text_runs(&operations, &fonts);
                Ok(build_layout_page(page_number, runs))
            })
            .collect();

        Ok(pages)
    }
}

/// Affine matrix in PDF row-vector form `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let n: Vec<f32> = operands.iter().filter_map(number).collect();
        if n.len() != 6 {
            return None;
        }
        Some(Self {
            a: n[0],
            b: n[1],
            c: n[2],
            d: n[3],
            e: n[4],
            f: n[5],
        })
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// A string shown on the page, in device space.
#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    x: f32,
    y: f32,
    width: f32,
    size: f32,
    text: String,
}

/// Text state while walking one content stream.
struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    runs: Vec<TextRun>,
    pending: Option<TextRun>,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: DEFAULT_FONT_SIZE,
            leading: 0.0,
            runs: Vec::new(),
            pending: None,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.flush();
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn set_text_matrix(&mut self, m: Matrix) {
        self.flush();
        self.tlm = m;
        self.tm = m;
    }

    /// Append shown text at the current position and advance.
    fn show(&mut self, text: &str) {
        let glyphs = text.chars().count() as f32;
        let advance = glyphs * self.font_size * AVG_GLYPH_WIDTH_EM;
        let device = self.tm.then(&self.ctm);
        let size = self.font_size * device.vertical_scale();
        let width = advance * device.horizontal_scale();

        match self.pending.as_mut() {
            Some(run) => {
                run.text.push_str(text);
                run.width += width;
            }
            None => {
                self.pending = Some(TextRun {
                    x: device.e,
                    y: device.f,
                    width,
                    size,
                    text: text.to_string(),
                });
            }
        }

        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);
    }

    /// Apply a TJ position adjustment (thousandths of an em, positive moves left).
    fn adjust(&mut self, amount: f32) {
        let advance = -amount / 1000.0 * self.font_size;
        if -amount >= TJ_COLUMN_JUMP {
            self.flush();
        } else if -amount >= TJ_WORD_SPACE {
            if let Some(run) = self.pending.as_mut() {
                run.text.push(' ');
            }
        }
        if let Some(run) = self.pending.as_mut() {
            run.width += advance * self.tm.then(&self.ctm).horizontal_scale();
        }
        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);
    }

    fn flush(&mut self) {
        if let Some(run) = self.pending.take() {
            if !run.text.trim().is_empty() {
                self.runs.push(run);
            }
        }
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Text encodings of the fonts in a page's resources, keyed by resource name.
#[derive(Default)]
struct PageFonts<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
}

impl<'a> PageFonts<'a> {
    /// Fonts that cannot be resolved are left out; their strings fall back
    /// to plain byte decoding.
    fn load(doc: &'a Document, page_id: ObjectId) -> Self {
        let fonts = match doc.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                tracing::debug!(error = %e, "Page font resources unreadable");
                return Self::default();
            }
        };

        let encodings = fonts
            .into_iter()
            .filter_map(|(name, font)| match font.get_font_encoding(doc) {
                Ok(encoding) => Some((name, encoding)),
                Err(e) => {
                    tracing::debug!(
                        font = %String::from_utf8_lossy(&name),
                        error = %e,
                        "Font encoding unresolved"
                    );
                    None
                }
            })
            .collect();

        Self { encodings }
    }

    fn decode(&self, font: Option<&[u8]>, obj: &Object) -> Option<String> {
        let Object::String(bytes, _) = obj else {
            return None;
        };
        font.and_then(|name| self.encodings.get(name))
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .or_else(|| decode_pdf_string(bytes))
    }
}

/// Walk content operators and collect positioned text runs.
fn collect_text_runs(operations: &[lopdf::content::Operation], fonts: &PageFonts<'_>) -> Vec<TextRun> {
    let mut state = TextState::new();
    let mut font: Option<Vec<u8>> = None;

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                state.flush();
                if let Some(ctm) = state.ctm_stack.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.flush();
                    state.ctm = m.then(&state.ctm);
                }
            }
            "BT" => {
                state.flush();
                state.tm = Matrix::IDENTITY;
                state.tlm = Matrix::IDENTITY;
            }
            "ET" => state.flush(),
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    font = Some(name.clone());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = -ty;
                }
                state.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.set_text_matrix(m);
                }
            }
            "T*" => {
                let leading = state.leading;
                state.move_line(0.0, -leading);
            }
            "Tj" => {
                if let Some(text) = operands.first().and_then(|o| fonts.decode(font.as_deref(), o)) {
                    state.show(&text);
                }
            }
            "'" => {
                let leading = state.leading;
                state.move_line(0.0, -leading);
                if let Some(text) = operands.first().and_then(|o| fonts.decode(font.as_deref(), o)) {
                    state.show(&text);
                }
            }
            "\"" => {
                let leading = state.leading;
                state.move_line(0.0, -leading);
                if let Some(text) = operands.get(2).and_then(|o| fonts.decode(font.as_deref(), o)) {
                    state.show(&text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        if let Some(amount) = number(item) {
                            state.adjust(amount);
                        } else if let Some(text) = fonts.decode(font.as_deref(), item) {
                            state.show(&text);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    state.flush();
    state.runs
}

/// Group runs into lines (top to bottom) and cells (left to right).
fn group_lines(mut runs: Vec<TextRun>) -> Vec<Line> {
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut grouped: Vec<Vec<TextRun>> = Vec::new();
    for run in runs {
        let same_line = grouped.last().is_some_and(|line| {
            let anchor = &line[0];
            let tolerance = anchor.size.max(run.size) * 0.5;
            (anchor.y - run.y).abs() <= tolerance
        });
        if same_line {
            if let Some(line) = grouped.last_mut() {
                line.push(run);
            }
        } else {
            grouped.push(vec![run]);
        }
    }

    grouped
        .into_iter()
        .map(|mut line_runs| {
            line_runs.sort_by(|a, b| a.x.total_cmp(&b.x));
            let y = line_runs[0].y;
            Line {
                y,
                cells: runs_to_cells(&line_runs),
            }
        })
        .collect()
}

/// Merge adjacent runs into cells, splitting on wide gaps and on
/// tab/pipe/multi-space separators inside a run.
fn runs_to_cells(runs: &[TextRun]) -> Vec<Cell> {
    let mut merged: Vec<TextRun> = Vec::new();

    for run in runs {
        match merged.last_mut() {
            Some(prev) => {
                let gap = run.x - (prev.x + prev.width);
                let em = prev.size.max(run.size).max(1.0);
                if gap > CELL_GAP_EM * em {
                    merged.push(run.clone());
                } else {
                    if gap > WORD_GAP_EM * em && !prev.text.ends_with(' ') {
                        prev.text.push(' ');
                    }
                    prev.text.push_str(&run.text);
                    prev.width = (run.x + run.width) - prev.x;
                }
            }
            None => merged.push(run.clone()),
        }
    }

    merged
        .iter()
        .flat_map(|run| {
            let glyph = run.size * AVG_GLYPH_WIDTH_EM;
            split_cells(&run.text)
                .into_iter()
                .map(move |(offset, text)| Cell {
                    x: run.x + offset as f32 * glyph,
                    text,
                })
        })
        .collect()
}

fn build_layout_page(page_number: usize, runs: Vec<TextRun>) -> LayoutPage {
    let lines = group_lines(runs);
    let text = lines
        .iter()
        .map(Line::text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let tables = detect_tables(&lines);

    LayoutPage {
        page_number,
        text,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::test_pdf::{
        content_for, make_identity_h_pdf, make_pdf, make_pdf_from_contents,
    };

    fn run(x: f32, y: f32, text: &str) -> TextRun {
        TextRun {
            x,
            y,
            width: text.chars().count() as f32 * 6.0,
            size: 12.0,
            text: text.to_string(),
        }
    }

    // --- matrix ---

    #[test]
    fn translate_then_scale() {
        let m = Matrix::translate(10.0, 20.0).then(&Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        });
        assert_eq!((m.e, m.f), (20.0, 40.0));
        assert_eq!(m.horizontal_scale(), 2.0);
    }

    // --- content stream walking ---

    #[test]
    fn td_positions_runs() {
        let ops = Content::decode(&content_for(&[(72, 700, "Drug"), (300, 700, "Dose")]))
            .unwrap()
            .operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].x, runs[0].y), (72.0, 700.0));
        assert_eq!(runs[0].text, "Drug");
        assert_eq!((runs[1].x, runs[1].y), (300.0, 700.0));
    }

    #[test]
    fn tm_and_cm_combine() {
        let content = b"q 1 0 0 1 50 50 cm BT /F1 1 Tf 12 0 0 12 22 650 Tm (Aspirin) Tj ET Q".to_vec();
        let ops = Content::decode(&content).unwrap().operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].x, runs[0].y), (72.0, 700.0));
        assert_eq!(runs[0].size, 12.0);
    }

    #[test]
    fn t_star_moves_down_by_leading() {
        let content = b"BT /F1 12 Tf 14 TL 72 700 Td (Line one) Tj T* (Line two) Tj ET".to_vec();
        let ops = Content::decode(&content).unwrap().operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].y, 686.0);
        assert_eq!(runs[1].x, 72.0);
    }

    #[test]
    fn tj_array_spacing_and_column_jump() {
        let content =
            b"BT /F1 12 Tf 72 700 Td [(Once) -250 (daily) -3000 (10mg)] TJ ET".to_vec();
        let ops = Content::decode(&content).unwrap().operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Once daily");
        assert_eq!(runs[1].text, "10mg");
        assert!(runs[1].x > runs[0].x + runs[0].width);
    }

    #[test]
    fn q_restores_graphics_matrix() {
        let content =
            b"q 1 0 0 1 100 0 cm Q BT /F1 12 Tf 72 700 Td (Plain) Tj ET".to_vec();
        let ops = Content::decode(&content).unwrap().operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs[0].x, 72.0);
    }

    // --- grouping ---

    #[test]
    fn runs_on_same_baseline_share_a_line() {
        let lines = group_lines(vec![
            run(300.0, 700.0, "10mg"),
            run(72.0, 701.0, "Lisinopril"),
            run(72.0, 680.0, "Next"),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].cells.len(), 2);
        assert_eq!(lines[0].cells[0].text, "Lisinopril");
        assert_eq!(lines[1].text(), "Next");
    }

    #[test]
    fn adjacent_runs_merge_into_one_cell() {
        let lines = group_lines(vec![run(72.0, 700.0, "Blood"), run(105.0, 700.0, "pressure")]);
        assert_eq!(lines[0].cells.len(), 1);
        assert_eq!(lines[0].cells[0].text, "Blood pressure");
    }

    #[test]
    fn multi_space_run_splits_into_cells() {
        let lines = group_lines(vec![run(72.0, 700.0, "Metformin    500mg")]);
        assert_eq!(lines[0].cells.len(), 2);
        assert_eq!(lines[0].cells[1].text, "500mg");
        assert_eq!(lines[0].cells[1].x, 72.0 + 13.0 * 6.0);
    }

    // --- full parser ---

    #[test]
    fn parses_table_and_text_from_pdf() {
        let pdf = make_pdf(&[vec![
            (72, 720, "Medication List"),
            (72, 700, "Drug"),
            (300, 700, "Dose"),
            (72, 685, "Lisinopril"),
            (300, 685, "10mg"),
            (72, 670, "Metformin"),
            (300, 670, "500 mg"),
        ]]);
        let pages = LopdfLayoutParser.parse_pages(&pdf).unwrap();
        assert_eq!(pages.len(), 1);
        let page = pages[0].as_ref().unwrap();
        assert_eq!(page.page_number, 1);
        assert_eq!(
            page.text,
            "Medication List\nDrug Dose\nLisinopril 10mg\nMetformin 500 mg"
        );
        assert_eq!(page.tables.len(), 1);
        assert_eq!(
            page.tables[0],
            vec![
                vec!["Drug", "Dose"],
                vec!["Lisinopril", "10mg"],
                vec!["Metformin", "500 mg"],
            ]
        );
    }

    #[test]
    fn page_without_text_yields_empty_page() {
        let pdf = make_pdf(&[vec![(72, 700, "Only page one")], vec![]]);
        let pages = LopdfLayoutParser.parse_pages(&pdf).unwrap();
        assert_eq!(pages.len(), 2);
        let second = pages[1].as_ref().unwrap();
        assert_eq!(second.page_number, 2);
        assert!(second.text.is_empty());
        assert!(second.tables.is_empty());
    }

    #[test]
    fn broken_page_does_not_affect_others() {
        let good = content_for(&[(72, 700, "Readable")]);
        let bad = b"BT /F1 12 Tf 72 700 Td (unterminated Tj ET".to_vec();
        let pdf = make_pdf_from_contents(&[good, bad], None);
        let pages = LopdfLayoutParser.parse_pages(&pdf).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].as_ref().unwrap().text, "Readable");
        match &pages[1] {
            Ok(page) => assert!(page.tables.is_empty()),
            Err(e) => assert!(matches!(e, ExtractionError::PageExtraction { page: 2, .. })),
        }
    }

    #[test]
    fn identity_h_font_decoded_through_to_unicode() {
        let pdf = make_identity_h_pdf("Lisinopril 10mg");
        let pages = LopdfLayoutParser.parse_pages(&pdf).unwrap();
        assert_eq!(pages[0].as_ref().unwrap().text, "Lisinopril 10mg");
    }

    #[test]
    fn unknown_font_falls_back_to_raw_bytes() {
        let content = b"BT /F7 12 Tf 72 700 Td (Warfarin) Tj ET".to_vec();
        let ops = Content::decode(&content).unwrap().operations;
        let runs = collect_text_runs(&ops, &PageFonts::default());
        assert_eq!(runs[0].text, "Warfarin");
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let result = LopdfLayoutParser.parse_pages(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractionError::DocumentOpen(_))));
    }
}
