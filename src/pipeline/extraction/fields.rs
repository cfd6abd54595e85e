//! Medication field recognition.
//!
//! Text mode runs an ordered list of [`FieldMatcher`]s over page text; the
//! first matcher to capture a name wins. Table mode reads name and dosage
//! columns located by header keywords.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{ExtractedTable, Provenance, RecognizedField};

/// One to four capitalized words, then amount and unit.
static CAPITALIZED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<name>[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,3})[ \t]+(?P<amount>\d+(?:\.\d+)?)[ \t]*(?P<unit>(?i:mcg|mg|ml|g|units?))\b",
    )
    .unwrap()
});

/// All-caps brand token(s), then amount and unit.
static BRAND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<name>[A-Z]{2,}(?:[ \t]+[A-Z]{2,})*)[ \t]+(?P<amount>\d+(?:\.\d+)?)[ \t]*(?P<unit>(?i:mcg|mg|ml|g|units?))\b",
    )
    .unwrap()
});

/// One to three words, amount, unit, then an administration cue.
static ADMINISTRATION_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<name>[A-Za-z][A-Za-z0-9-]*(?:[ \t]+[A-Za-z][A-Za-z0-9-]*){0,2})[ \t]+(?P<amount>\d+(?:\.\d+)?)[ \t]*(?P<unit>(?i:mcg|mg|ml|g|units?))[ \t]+(?i:take|taken|daily|twice|once)\b",
    )
    .unwrap()
});

/// Amount and unit at the start of a table dosage cell.
static DOSAGE_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<amount>\d+(?:\.\d+)?)\s*(?P<unit>(?i:mcg|mg|ml|g|units?))\b").unwrap()
});

/// Instruction words stripped from the front of captured names.
const INSTRUCTION_WORDS: &[&str] = &[
    "take", "taken", "takes", "give", "use", "apply", "inject", "inhale", "once", "twice",
    "daily",
];

const NAME_HEADERS: &[&str] = &["drug", "medication", "name"];
const DOSAGE_HEADERS: &[&str] = &["dose", "strength", "amount"];
const NULL_LIKE: &[&str] = &["none", "null", "n/a"];

/// A text-mode recognizer. Matchers are independent and run in order.
pub trait FieldMatcher: Send + Sync {
    fn label(&self) -> &str;

    /// Fields found in `text`, in order of appearance.
    fn find(&self, text: &str) -> Vec<RecognizedField>;
}

/// Regex matcher with `name`, `amount` and `unit` capture groups.
pub struct PatternMatcher {
    label: String,
    pattern: Regex,
}

impl PatternMatcher {
    pub fn new(label: impl Into<String>, pattern: Regex) -> Self {
        Self {
            label: label.into(),
            pattern,
        }
    }

    pub fn capitalized_name() -> Self {
        Self::new("capitalized_name", CAPITALIZED_NAME.clone())
    }

    pub fn brand_name() -> Self {
        Self::new("brand_name", BRAND_NAME.clone())
    }

    pub fn administration_cue() -> Self {
        Self::new("administration_cue", ADMINISTRATION_CUE.clone())
    }
}

impl FieldMatcher for PatternMatcher {
    fn label(&self) -> &str {
        &self.label
    }

    fn find(&self, text: &str) -> Vec<RecognizedField> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let name = clean_name(caps.name("name")?.as_str())?;
                let amount = caps.name("amount")?.as_str().to_string();
                let unit = caps.name("unit")?.as_str().to_string();
                Some(RecognizedField {
                    name,
                    dosage: format!("{amount} {unit}"),
                    dosage_amount: Some(amount),
                    dosage_unit: Some(unit),
                    provenance: Provenance::Text,
                })
            })
            .collect()
    }
}

/// Collapse whitespace and strip leading instruction words.
/// `None` when nothing but instruction words remains.
fn clean_name(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .skip_while(|w| INSTRUCTION_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Ordered set of matchers plus table-mode recognition.
pub struct FieldRecognizer {
    matchers: Vec<Box<dyn FieldMatcher>>,
}

impl Default for FieldRecognizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PatternMatcher::capitalized_name()),
            Box::new(PatternMatcher::brand_name()),
            Box::new(PatternMatcher::administration_cue()),
        ])
    }
}

impl FieldRecognizer {
    pub fn new(matchers: Vec<Box<dyn FieldMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn matcher_labels(&self) -> Vec<&str> {
        self.matchers.iter().map(|m| m.label()).collect()
    }

    /// Text-mode recognition, deduplicated by name.
    pub fn recognize_text(&self, text: &str) -> Vec<RecognizedField> {
        dedup_fields(self.matchers.iter().flat_map(|m| m.find(text)))
    }

    /// Table-mode recognition over every table, in table order.
    pub fn recognize_tables(&self, tables: &[ExtractedTable]) -> Vec<RecognizedField> {
        dedup_fields(tables.iter().flat_map(|t| fields_from_table(&t.rows)))
    }

    /// Table fields first, then text fields, deduplicated.
    pub fn recognize(&self, text: &str, tables: &[ExtractedTable]) -> Vec<RecognizedField> {
        let table_fields = self.recognize_tables(tables);
        let text_fields = self.recognize_text(text);
        dedup_fields(table_fields.into_iter().chain(text_fields))
    }
}

/// Keep the first field per case-insensitive name.
fn dedup_fields(fields: impl IntoIterator<Item = RecognizedField>) -> Vec<RecognizedField> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .filter(|f| seen.insert(f.name.to_lowercase()))
        .collect()
}

fn header_column(header: &[String], keywords: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let cell = cell.to_lowercase();
        keywords.iter().any(|k| cell.contains(k))
    })
}

fn fields_from_table(rows: &[Vec<String>]) -> Vec<RecognizedField> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };

    let name_col = header_column(header, NAME_HEADERS).unwrap_or(0);
    let dosage_col = header_column(header, DOSAGE_HEADERS).unwrap_or(1);

    body.iter()
        .filter_map(|row| {
            let name = row.get(name_col)?.trim();
            if name.is_empty() || NULL_LIKE.contains(&name.to_lowercase().as_str()) {
                return None;
            }
            let dosage = row.get(dosage_col).map(|d| d.trim()).unwrap_or_default();
            let parsed = DOSAGE_CELL.captures(dosage);
            Some(RecognizedField {
                name: name.to_string(),
                dosage: dosage.to_string(),
                dosage_amount: parsed
                    .as_ref()
                    .and_then(|c| c.name("amount"))
                    .map(|m| m.as_str().to_string()),
                dosage_unit: parsed
                    .as_ref()
                    .and_then(|c| c.name("unit"))
                    .map(|m| m.as_str().to_string()),
                provenance: Provenance::Table,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(fields: &[RecognizedField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn table(rows: &[&[&str]]) -> ExtractedTable {
        ExtractedTable::new(
            1,
            1,
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    // --- text mode ---

    #[test]
    fn lisinopril_sentence_yields_one_field() {
        let fields = FieldRecognizer::default()
            .recognize_text("Take Lisinopril 10mg once daily for blood pressure");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Lisinopril");
        assert_eq!(fields[0].dosage, "10 mg");
        assert_eq!(fields[0].dosage_amount.as_deref(), Some("10"));
        assert_eq!(fields[0].dosage_unit.as_deref(), Some("mg"));
        assert_eq!(fields[0].provenance, Provenance::Text);
    }

    #[test]
    fn fields_in_discovery_order() {
        let fields = FieldRecognizer::default()
            .recognize_text("Aspirin 81 mg\nMetformin 500mg with meals\nLevothyroxine 0.125 mg");
        assert_eq!(names(&fields), vec!["Aspirin", "Metformin", "Levothyroxine"]);
        assert_eq!(fields[2].dosage_amount.as_deref(), Some("0.125"));
    }

    #[test]
    fn names_do_not_span_lines() {
        let fields = FieldRecognizer::default().recognize_text("Patient\nAspirin 81 mg");
        assert_eq!(names(&fields), vec!["Aspirin"]);
    }

    #[test]
    fn multi_word_capitalized_name() {
        let fields = FieldRecognizer::default().recognize_text("Insulin Glargine 20 units at bedtime");
        assert_eq!(names(&fields), vec!["Insulin Glargine"]);
        assert_eq!(fields[0].dosage_unit.as_deref(), Some("units"));
    }

    #[test]
    fn brand_names_in_capitals() {
        let fields = FieldRecognizer::default().recognize_text("dispense TYLENOL 500 MG as needed");
        assert_eq!(names(&fields), vec!["TYLENOL"]);
        assert_eq!(fields[0].dosage, "500 MG");
    }

    #[test]
    fn cue_pattern_catches_lowercase_names() {
        let fields =
            FieldRecognizer::default().recognize_text("take metformin 500 mg twice a day with food");
        assert_eq!(names(&fields), vec!["metformin"]);
    }

    #[test]
    fn microgram_and_millilitre_units() {
        let fields = FieldRecognizer::default()
            .recognize_text("Cyanocobalamin 1000 mcg\nAmoxicillin 5 mL three times a day");
        assert_eq!(fields[0].dosage_unit.as_deref(), Some("mcg"));
        assert_eq!(fields[1].dosage_unit.as_deref(), Some("mL"));
    }

    #[test]
    fn instruction_words_only_is_dropped() {
        let fields = FieldRecognizer::default().recognize_text("Take 10 mg daily");
        assert!(fields.is_empty(), "got {fields:?}");
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let fields = FieldRecognizer::default()
            .recognize_text("Aspirin 81 mg in the morning.\nASPIRIN 325 mg if pain.");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].dosage_amount.as_deref(), Some("81"));
    }

    #[test]
    fn no_dosage_no_field() {
        let fields = FieldRecognizer::default().recognize_text("Patient reports no allergies.");
        assert!(fields.is_empty());
    }

    #[test]
    fn default_matcher_order() {
        assert_eq!(
            FieldRecognizer::default().matcher_labels(),
            vec!["capitalized_name", "brand_name", "administration_cue"]
        );
    }

    #[test]
    fn custom_matcher_list() {
        let recognizer = FieldRecognizer::new(vec![Box::new(PatternMatcher::brand_name())]);
        let fields = recognizer.recognize_text("Aspirin 81 mg and PLAVIX 75 mg");
        assert_eq!(names(&fields), vec!["PLAVIX"]);
    }

    #[test]
    fn clean_name_strips_instruction_words() {
        assert_eq!(clean_name("Take  Lisinopril").as_deref(), Some("Lisinopril"));
        assert_eq!(clean_name("give use Heparin").as_deref(), Some("Heparin"));
        assert_eq!(clean_name("Once Daily"), None);
    }

    // --- table mode ---

    #[test]
    fn table_header_drug_dose() {
        let fields = FieldRecognizer::default()
            .recognize_tables(&[table(&[&["Drug", "Dose"], &["Lisinopril", "10mg"]])]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Lisinopril");
        assert_eq!(fields[0].dosage, "10mg");
        assert_eq!(fields[0].dosage_amount.as_deref(), Some("10"));
        assert_eq!(fields[0].dosage_unit.as_deref(), Some("mg"));
        assert_eq!(fields[0].provenance, Provenance::Table);
    }

    #[test]
    fn table_columns_located_by_header() {
        let fields = FieldRecognizer::default().recognize_tables(&[table(&[
            &["Strength", "Frequency", "Medication Name"],
            &["500 mg", "twice daily", "Metformin"],
        ])]);
        assert_eq!(fields[0].name, "Metformin");
        assert_eq!(fields[0].dosage, "500 mg");
    }

    #[test]
    fn table_defaults_to_first_two_columns() {
        let fields = FieldRecognizer::default().recognize_tables(&[table(&[
            &["Item", "Qty", "Notes"],
            &["Warfarin", "5 mg", "INR weekly"],
        ])]);
        assert_eq!(fields[0].name, "Warfarin");
        assert_eq!(fields[0].dosage, "5 mg");
    }

    #[test]
    fn table_skips_blank_and_null_like_names() {
        let fields = FieldRecognizer::default().recognize_tables(&[table(&[
            &["Drug", "Dose"],
            &["", "5 mg"],
            &["N/A", "-"],
            &["none", ""],
            &["NULL", "1 g"],
            &["Atorvastatin", "as directed"],
        ])]);
        assert_eq!(names(&fields), vec!["Atorvastatin"]);
        assert_eq!(fields[0].dosage, "as directed");
        assert!(fields[0].dosage_amount.is_none());
        assert!(fields[0].dosage_unit.is_none());
    }

    #[test]
    fn header_only_table_has_no_fields() {
        let fields = FieldRecognizer::default().recognize_tables(&[table(&[&["Drug", "Dose"]])]);
        assert!(fields.is_empty());
    }

    #[test]
    fn recognize_puts_table_fields_first() {
        let tables = [table(&[&["Drug", "Dose"], &["Metformin", "500mg"]])];
        let fields = FieldRecognizer::default()
            .recognize("Aspirin 81 mg\nMetformin 850 mg", &tables);
        assert_eq!(names(&fields), vec!["Metformin", "Aspirin"]);
        assert_eq!(fields[0].provenance, Provenance::Table);
        assert_eq!(fields[0].dosage, "500mg");
    }
}
