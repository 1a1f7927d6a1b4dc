//! Insurance quote tool.
//!
//! Exposed to the primary backend as `get_quote`. Premiums are computed in
//! basis points over a fixed base so the result is exact to the cent.

use crate::error::ToolError;
use crate::tool::{ToolDefinition, ToolHandler};
use serde::Deserialize;
use serde_json::Value as JsonValue;

const TOOL_NAME: &str = "get_quote";

/// Monthly base premium in cents.
const BASE_PREMIUM_CENTS: u64 = 10_000;
/// Year vehicle age is measured from.
const REFERENCE_YEAR: i64 = 2025;
const AGE_BP_PER_YEAR: u64 = 150;
const AGE_BP_CAP: u64 = 3_000;
const LUXURY_BP: u64 = 2_500;
const HIGH_COST_REGION_BP: u64 = 1_000;

const LUXURY_MAKES: &[&str] = &["audi", "bmw", "lexus", "mercedes", "porsche", "tesla"];
const HIGH_COST_ZIP_PREFIXES: &[char] = &['0', '1', '9'];

#[derive(Debug, Deserialize)]
struct QuoteInput {
    make: String,
    #[allow(dead_code)]
    model: String,
    #[serde(deserialize_with = "lenient_year")]
    year: i64,
    zip_code: String,
}

fn lenient_year<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("year must be an integer")),
        JsonValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("year `{s}` is not a number"))),
        other => Err(D::Error::custom(format!("unexpected year value {other}"))),
    }
}

/// A quote for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Monthly premium in cents.
    pub monthly_cents: u64,
}

impl Quote {
    /// Computes the monthly premium for a vehicle.
    #[must_use]
    pub fn compute(make: &str, year: i64, zip_code: &str) -> Self {
        let age = u64::try_from(REFERENCE_YEAR.saturating_sub(year)).unwrap_or(0);
        let mut bp = age.saturating_mul(AGE_BP_PER_YEAR).min(AGE_BP_CAP);

        if LUXURY_MAKES.contains(&make.trim().to_lowercase().as_str()) {
            bp += LUXURY_BP;
        }
        if zip_code
            .trim()
            .chars()
            .next()
            .is_some_and(|c| HIGH_COST_ZIP_PREFIXES.contains(&c))
        {
            bp += HIGH_COST_REGION_BP;
        }

        Self {
            monthly_cents: BASE_PREMIUM_CENTS * (10_000 + bp) / 10_000,
        }
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Quote generated: ${}.{:02} per month",
            self.monthly_cents / 100,
            self.monthly_cents % 100
        )
    }
}

/// The `get_quote` tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteTool;

impl ToolHandler for QuoteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Calculate the monthly insurance premium for a vehicle given its make, model, \
             year and the policy holder's ZIP code.",
        )
        .with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "make": { "type": "string", "description": "The make of the vehicle." },
                "model": { "type": "string", "description": "The model of the vehicle." },
                "year": { "type": "integer", "description": "The year the vehicle was manufactured." },
                "zip_code": { "type": "string", "description": "The ZIP code of the policy holder." }
            },
            "required": ["make", "model", "year", "zip_code"]
        }))
    }

    fn call(&self, input: &JsonValue) -> Result<String, ToolError> {
        let input = QuoteInput::deserialize(input).map_err(|e| ToolError::InvalidInput {
            name: TOOL_NAME.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Quote::compute(&input.make, input.year, &input.zip_code).to_string())
    }
}
