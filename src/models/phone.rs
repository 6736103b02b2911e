use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input row's validation outcome, in the JSON shape the engine
/// writes (camelCase field names, nulls serialized explicitly).
///
/// Identity fields are carried through from the input unchanged. The
/// formatting fields are populated only when the row validated;
/// `error` only when it did not. The two sets are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRecord {
    /// 1-based position of the row in the source file.
    pub row_number: u32,
    /// Caller-supplied record identifier, may be empty.
    #[serde(default)]
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub original_phone_number: String,
    /// Country hint the row carried into the engine, if any.
    #[serde(default)]
    pub original_country: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,

    // Populated only when validation succeeded for this record.
    #[serde(default)]
    pub e164: Option<String>,
    #[serde(default)]
    pub international: Option<String>,
    #[serde(default)]
    pub national: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "type")]
    pub number_type: Option<String>,
    /// How the engine arrived at the result: `original`,
    /// `country_code`, `us_fallback` or `forceful`.
    #[serde(default)]
    pub validation_method: Option<String>,

    // Populated only when validation failed for this record.
    #[serde(default)]
    pub error: Option<String>,
}

/// The `summary.json` artifact as the engine writes it.
///
/// The engine also self-reports `valid_count`, `invalid_count` and a
/// percent-formatted `success_rate` string; those are untrusted and
/// deliberately not deserialized; counts are recomputed from the
/// record lists and only `total_numbers` is kept as the rate's
/// denominator hint.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSummary {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub total_numbers: u64,
    #[serde(default)]
    pub valid_by_country: BTreeMap<String, u64>,
}

/// Assembled result of one validation run, stored on the job record
/// and returned to pollers (or directly for synchronous runs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: String,
    pub total_numbers: u64,
    pub valid_count: u64,
    pub invalid_count: u64,
    /// Percentage in [0, 100]; 0 when `total_numbers` is 0.
    pub success_rate: f64,
    pub valid_numbers: Vec<PhoneRecord>,
    pub invalid_numbers: Vec<PhoneRecord>,
    /// Region code -> count of valid records, omitting zero counts.
    pub country_breakdown: BTreeMap<String, u64>,
    pub timestamp: String,
}
