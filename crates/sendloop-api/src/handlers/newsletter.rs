//! Newsletter campaign handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use sendloop_core::{CampaignProgress, CampaignSummary, NewCampaign, NewCampaignRecipient};
use sendloop_storage::models::CampaignStatus;
use sendloop_storage::{CampaignAggregateStats, CampaignSendCounts};

use crate::auth::AppState;
use crate::error::{campaign_rejection, ApiRejection, ApiResponse};

/// One recipient in a campaign submission
#[derive(Debug, Deserialize)]
pub struct CampaignRecipientPayload {
    pub email: String,
    pub name: String,
    pub variant: String,
}

/// Request body for starting a campaign
#[derive(Debug, Deserialize)]
pub struct SendCampaignRequest {
    #[serde(rename = "campaignName")]
    pub campaign_name: String,
    pub subject: String,
    pub recipients: Vec<CampaignRecipientPayload>,
}

/// Response payload for a started campaign
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStartedResponse {
    pub campaign_id: Uuid,
    pub status: String,
    pub message: String,
    pub total_recipients: i32,
}

/// Detailed campaign status for polling clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatusResponse {
    pub campaign_id: Uuid,
    pub name: String,
    pub subject: String,
    pub status: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub pending_count: i32,
    pub success_rate: String,
    pub failure_rate: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sends: SendCountsPayload,
}

/// Per-status send counts
#[derive(Debug, Serialize)]
pub struct SendCountsPayload {
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
}

impl From<CampaignSendCounts> for SendCountsPayload {
    fn from(counts: CampaignSendCounts) -> Self {
        Self {
            sent: counts.sent,
            failed: counts.failed,
            pending: counts.pending,
        }
    }
}

/// Query parameters for the campaign list
#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// Response payload for the campaign list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignListResponse {
    pub campaigns: Vec<CampaignSummary>,
    pub total: i64,
    pub has_more: bool,
}

/// Aggregate statistics payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsResponse {
    pub total_campaigns: i64,
    pub total_emails_sent: i64,
    pub total_emails_failed: i64,
    pub average_success_rate: f64,
    pub last_campaign_date: Option<DateTime<Utc>>,
}

impl From<CampaignAggregateStats> for CampaignStatsResponse {
    fn from(stats: CampaignAggregateStats) -> Self {
        Self {
            total_campaigns: stats.total_campaigns,
            total_emails_sent: stats.total_emails_sent,
            total_emails_failed: stats.total_emails_failed,
            average_success_rate: stats.average_success_rate.unwrap_or(0.0),
            last_campaign_date: stats.last_campaign_at,
        }
    }
}

/// Compact progress payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgressResponse {
    pub campaign_id: Uuid,
    pub status: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
}

impl From<CampaignProgress> for CampaignProgressResponse {
    fn from(progress: CampaignProgress) -> Self {
        Self {
            campaign_id: progress.id,
            status: progress.status,
            total_recipients: progress.total_recipients,
            sent_count: progress.sent_count,
            failed_count: progress.failed_count,
        }
    }
}

/// POST /api/v1/admin/newsletter/send
///
/// Validates and persists the campaign, then returns immediately while
/// a background worker delivers the batches.
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendCampaignRequest>,
) -> Result<Json<ApiResponse<CampaignStartedResponse>>, ApiRejection> {
    let recipients = request
        .recipients
        .into_iter()
        .map(|r| NewCampaignRecipient {
            email: r.email,
            name: r.name,
            variant: r.variant,
        })
        .collect();

    let campaign = state
        .campaigns
        .send_campaign(NewCampaign {
            name: request.campaign_name,
            subject: request.subject,
            recipients,
        })
        .await
        .map_err(campaign_rejection)?;

    Ok(ApiResponse::ok(CampaignStartedResponse {
        campaign_id: campaign.id,
        status: campaign.status,
        message: "Campaign started successfully. Emails are being sent in the background."
            .to_string(),
        total_recipients: campaign.total_recipients,
    }))
}

/// GET /api/v1/admin/newsletter/status/:campaign_id
pub async fn campaign_status(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CampaignStatusResponse>>, ApiRejection> {
    let (campaign, counts) = state
        .campaigns
        .campaign_status(campaign_id)
        .await
        .map_err(campaign_rejection)?;

    let total = campaign.total_recipients;
    let pending = (total - campaign.sent_count - campaign.failed_count).max(0);

    Ok(ApiResponse::ok(CampaignStatusResponse {
        campaign_id: campaign.id,
        name: campaign.name,
        subject: campaign.subject,
        status: campaign.status,
        total_recipients: total,
        sent_count: campaign.sent_count,
        failed_count: campaign.failed_count,
        pending_count: pending,
        success_rate: percentage(campaign.sent_count, total),
        failure_rate: percentage(campaign.failed_count, total),
        started_at: campaign.started_at,
        completed_at: campaign.completed_at,
        sends: counts.into(),
    }))
}

/// GET /api/v1/admin/newsletter/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<ApiResponse<CampaignListResponse>>, ApiRejection> {
    // Unknown status values are ignored rather than rejected
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<CampaignStatus>().ok());

    let (campaigns, total, has_more) = state
        .campaigns
        .list_campaigns(status, query.limit, query.offset)
        .await
        .map_err(campaign_rejection)?;

    Ok(ApiResponse::ok(CampaignListResponse {
        campaigns,
        total,
        has_more,
    }))
}

/// GET /api/v1/admin/newsletter/campaigns/stats
pub async fn campaign_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CampaignStatsResponse>>, ApiRejection> {
    let stats = state
        .campaigns
        .campaign_stats()
        .await
        .map_err(campaign_rejection)?;

    Ok(ApiResponse::ok(stats.into()))
}

/// GET /api/v1/admin/newsletter/campaigns/:campaign_id/progress
pub async fn campaign_progress(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CampaignProgressResponse>>, ApiRejection> {
    let progress = state
        .campaigns
        .campaign_progress(campaign_id)
        .await
        .map_err(campaign_rejection)?;

    Ok(ApiResponse::ok(progress.into()))
}

/// Format a count as a percentage string with two decimals
fn percentage(count: i32, total: i32) -> String {
    if total > 0 {
        format!("{:.2}%", f64::from(count) / f64::from(total) * 100.0)
    } else {
        "0%".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentage_formatting() {
        assert_eq!(percentage(150, 200), "75.00%");
        assert_eq!(percentage(1, 3), "33.33%");
        assert_eq!(percentage(0, 200), "0.00%");
        assert_eq!(percentage(0, 0), "0%");
    }

    #[test]
    fn test_status_response_is_camel_case() {
        let response = CampaignStatusResponse {
            campaign_id: Uuid::nil(),
            name: "March".to_string(),
            subject: "Hello".to_string(),
            status: "sending".to_string(),
            total_recipients: 200,
            sent_count: 150,
            failed_count: 10,
            pending_count: 40,
            success_rate: "75.00%".to_string(),
            failure_rate: "5.00%".to_string(),
            started_at: None,
            completed_at: None,
            sends: SendCountsPayload {
                sent: 150,
                failed: 10,
                pending: 40,
            },
        };
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["campaignId"], Uuid::nil().to_string());
        assert_eq!(value["pendingCount"], 40);
        assert_eq!(value["successRate"], "75.00%");
        assert_eq!(value["sends"]["pending"], 40);
    }

    #[test]
    fn test_stats_response_defaults_average_rate() {
        let response = CampaignStatsResponse::from(CampaignAggregateStats {
            total_campaigns: 0,
            total_emails_sent: 0,
            total_emails_failed: 0,
            average_success_rate: None,
            last_campaign_at: None,
        });
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["totalCampaigns"], 0);
        assert_eq!(value["averageSuccessRate"], 0.0);
        assert_eq!(value["lastCampaignDate"], serde_json::Value::Null);
    }

    #[test]
    fn test_send_request_parses_campaign_name() {
        let request: SendCampaignRequest = serde_json::from_str(
            r#"{
                "campaignName": "March push",
                "subject": "Hi {{name}}",
                "recipients": [
                    {"email": "anna@example.com", "name": "Anna", "variant": "a"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.campaign_name, "March push");
        assert_eq!(request.recipients[0].variant, "a");
    }
}
