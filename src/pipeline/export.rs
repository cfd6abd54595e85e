//! Result renderings: CareTend plain-text medication list and JSON.

use chrono::{DateTime, TimeZone};

use super::extraction::{ExtractionResult, RecognizedField};

pub const NO_MEDICATIONS: &str = "No medications found for CareTend conversion.";

const CARETEND_NOTES: [&str; 4] = [
    "This list was automatically extracted from PDF document",
    "Please verify all medications and dosages with patient",
    "Suitable for insurance submission and medical record keeping",
    "CareTend compatible format",
];

/// Render fields as a CareTend medication list.
pub fn format_caretend<Tz>(
    fields: &[RecognizedField],
    filename: &str,
    generated_at: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if fields.is_empty() {
        return NO_MEDICATIONS.to_string();
    }

    let mut lines = vec![
        "CareTend Format Medication List".to_string(),
        format!("Source: {filename}"),
        format!("Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        format!("Total Medications: {}", fields.len()),
        String::new(),
        "--- MEDICATION LIST ---".to_string(),
    ];

    for (i, field) in fields.iter().enumerate() {
        let dosage = match field.dosage.trim() {
            "" => "Not specified",
            d => d,
        };
        lines.extend([
            String::new(),
            format!("{}. Medication: {}", i + 1, field.name),
            format!("   Dosage: {dosage}"),
            "   Status: Active".to_string(),
            "   Source: PDF Document Processing".to_string(),
        ]);
    }

    lines.extend([
        String::new(),
        "--- END MEDICATION LIST ---".to_string(),
        String::new(),
        "Notes:".to_string(),
    ]);
    lines.extend(CARETEND_NOTES.iter().map(|note| format!("- {note}")));
    lines.join("\n")
}

/// Pretty-printed JSON of the whole result.
pub fn to_json(result: &ExtractionResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}
