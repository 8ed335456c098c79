//! Recipient file ingestion handlers

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use sendloop_core::{ParseIssue, ParsedRecipient, VariantDistribution};

use crate::auth::AppState;
use crate::error::{ingest_rejection, ApiRejection, ApiResponse};

/// Parse outcome returned to the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResultResponse {
    pub valid: Vec<ParsedRecipient>,
    pub invalid: Vec<ParseIssue>,
    pub errors: Vec<String>,
    pub variant_distribution: VariantDistribution,
}

/// POST /api/v1/bulk-sender/recipients/parse
///
/// Takes the raw CSV bytes as the request body and returns the
/// valid/invalid partition without persisting anything.
pub async fn parse_recipients(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<ParseResultResponse>>, ApiRejection> {
    let parsed = state.ingestor.parse(&body).map_err(ingest_rejection)?;
    let variant_distribution = parsed.variant_distribution();

    info!(
        "Parsed recipient upload: {} valid, {} invalid",
        parsed.valid.len(),
        parsed.invalid.len()
    );

    Ok(ApiResponse::ok(ParseResultResponse {
        valid: parsed.valid,
        invalid: parsed.invalid,
        errors: parsed.errors,
        variant_distribution,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sendloop_common::types::Variant;

    #[test]
    fn test_parse_result_serializes_camel_case() {
        let response = ParseResultResponse {
            valid: vec![ParsedRecipient {
                email: "anna@example.com".to_string(),
                name: "Anna".to_string(),
                variant: Variant::A,
                result_id: None,
            }],
            invalid: vec![ParseIssue {
                row: 3,
                email: "bad@".to_string(),
                reason: "Invalid email format".to_string(),
            }],
            errors: vec!["Row 3: Invalid email format".to_string()],
            variant_distribution: VariantDistribution { a: 1, b: 0, c: 0 },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["valid"][0]["variant"], "a");
        assert_eq!(value["invalid"][0]["row"], 3);
        assert_eq!(value["variantDistribution"]["a"], 1);
    }
}
