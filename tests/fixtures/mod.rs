//! Canned engine artifacts in the exact JSON shape the engine writes.

use phone_validator_api::services::translator::{
    INVALID_ARTIFACT, SUMMARY_ARTIFACT, VALID_ARTIFACT,
};

/// A valid record as the engine emits it: camelCase keys, explicit
/// nulls for absent fields.
pub fn valid_record_json(row: u32, phone: &str, region: &str) -> String {
    format!(
        r#"{{
  "rowNumber": {row},
  "id": "lead-{row}",
  "email": null,
  "name": null,
  "originalPhoneNumber": "{phone}",
  "originalCountry": null,
  "platform": "fb",
  "e164": "{phone}",
  "international": "{phone}",
  "national": "{phone}",
  "countryCode": "+1",
  "region": "{region}",
  "type": "MOBILE",
  "validationMethod": "original",
  "error": null
}}"#
    )
}

pub fn invalid_record_json(row: u32, phone: &str) -> String {
    format!(
        r#"{{
  "rowNumber": {row},
  "id": "lead-{row}",
  "email": null,
  "name": null,
  "originalPhoneNumber": "{phone}",
  "originalCountry": null,
  "platform": "fb",
  "error": "Number is not valid (tried: auto-detect, US, forceful)"
}}"#
    )
}

pub fn summary_json(total: u64, by_country: &[(&str, u64)]) -> String {
    let breakdown = by_country
        .iter()
        .map(|(code, n)| format!(r#""{code}": {n}"#))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"{{
  "timestamp": "2025-03-01 14:12:00",
  "total_numbers": {total},
  "valid_count": 0,
  "invalid_count": 0,
  "success_rate": "0%",
  "valid_by_country": {{{breakdown}}}
}}"#
    )
}

/// Artifact set for a three-row run: two valid numbers (one US, one
/// BR) and one invalid. The summary deliberately self-reports wrong
/// counts, which the pipeline must ignore.
pub fn standard_artifacts() -> Vec<(String, String)> {
    vec![
        (
            VALID_ARTIFACT.to_string(),
            format!(
                "[{},\n{}]",
                valid_record_json(1, "+13105551234", "US"),
                valid_record_json(2, "+5511987654321", "BR")
            ),
        ),
        (
            INVALID_ARTIFACT.to_string(),
            format!("[{}]", invalid_record_json(3, "12345")),
        ),
        (
            SUMMARY_ARTIFACT.to_string(),
            summary_json(3, &[("US", 1), ("BR", 1)]),
        ),
    ]
}

/// Artifact set for a run over an empty input.
pub fn empty_artifacts() -> Vec<(String, String)> {
    vec![
        (VALID_ARTIFACT.to_string(), "[]".to_string()),
        (INVALID_ARTIFACT.to_string(), "[]".to_string()),
        (SUMMARY_ARTIFACT.to_string(), summary_json(0, &[])),
    ]
}
