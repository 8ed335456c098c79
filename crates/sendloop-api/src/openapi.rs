//! OpenAPI documentation
//!
//! Provides OpenAPI 3.0 specification and Swagger UI for the Sendloop API.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

/// OpenAPI JSON specification endpoint
async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

/// Swagger UI HTML endpoint
async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// Get the OpenAPI specification as JSON
fn get_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Sendloop API",
            "description": "REST API for the Sendloop batch email dispatch service\n\n## Authentication\n\nAll API endpoints (except health checks and the public unsubscribe endpoint) require authentication via API key.\n\n- **Header**: `X-API-Key: <your-api-key>`\n- **Bearer**: `Authorization: Bearer <your-api-key>`\n\n## Response envelope\n\nEvery response carries `{\"data\": ..., \"error\": null}` on success and `{\"data\": null, \"error\": {\"message\", \"code\"}}` on failure.",
            "version": "1.0.0",
            "license": {
                "name": "Apache-2.0",
                "url": "https://www.apache.org/licenses/LICENSE-2.0"
            }
        },
        "servers": [
            {
                "url": "/api/v1",
                "description": "API v1"
            }
        ],
        "tags": [
            {"name": "health", "description": "Health check endpoints"},
            {"name": "jobs", "description": "Bulk send job management"},
            {"name": "recipients", "description": "Recipient CSV ingestion"},
            {"name": "templates", "description": "Email template management"},
            {"name": "unsubscribes", "description": "Suppression list management"},
            {"name": "newsletter", "description": "Newsletter campaigns"},
            {"name": "recipient-lists", "description": "Saved recipient lists"}
        ],
        "paths": {
            // Health endpoints
            "/health": {
                "get": {
                    "tags": ["health"],
                    "summary": "Basic health check",
                    "operationId": "health",
                    "responses": {
                        "200": {
                            "description": "Service is healthy",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/HealthResponse"}
                                }
                            }
                        }
                    }
                }
            },
            "/health/live": {
                "get": {
                    "tags": ["health"],
                    "summary": "Liveness probe",
                    "operationId": "liveness",
                    "responses": {
                        "200": {"description": "Service is alive"},
                        "503": {"description": "Service is not alive"}
                    }
                }
            },
            "/health/ready": {
                "get": {
                    "tags": ["health"],
                    "summary": "Readiness probe",
                    "operationId": "readiness",
                    "responses": {
                        "200": {"description": "Service is ready"},
                        "503": {"description": "Service is not ready"}
                    }
                }
            },
            "/health/detailed": {
                "get": {
                    "tags": ["health"],
                    "summary": "Detailed health check",
                    "operationId": "healthDetailed",
                    "responses": {
                        "200": {
                            "description": "Detailed health status",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/DetailedHealthResponse"}
                                }
                            }
                        }
                    }
                }
            },
            // Job endpoints
            "/bulk-sender/jobs": {
                "get": {
                    "tags": ["jobs"],
                    "summary": "List recent jobs with the active job",
                    "operationId": "listJobs",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "responses": {
                        "200": {
                            "description": "The 20 newest jobs and the active job, if any",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/JobOverviewResponse"}
                                }
                            }
                        }
                    }
                },
                "post": {
                    "tags": ["jobs"],
                    "summary": "Create a bulk send job",
                    "operationId": "createJob",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/CreateJobRequest"}
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "Job created with all recipients queued",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/JobCreatedResponse"}
                                }
                            }
                        },
                        "400": {"description": "Invalid request"},
                        "409": {"description": "Another job is already active"}
                    }
                }
            },
            "/bulk-sender/jobs/{job_id}": {
                "get": {
                    "tags": ["jobs"],
                    "summary": "Get a job with recipient counts",
                    "operationId": "getJob",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "job_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Job details with per-status recipient counts"},
                        "404": {"description": "Job not found"}
                    }
                },
                "patch": {
                    "tags": ["jobs"],
                    "summary": "Start, pause, resume or cancel a job",
                    "operationId": "updateJob",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "job_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/JobActionRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {"description": "Job transitioned"},
                        "400": {"description": "Invalid action for the current status"},
                        "404": {"description": "Job not found"}
                    }
                },
                "delete": {
                    "tags": ["jobs"],
                    "summary": "Delete a non-processing job",
                    "operationId": "deleteJob",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "job_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Job deleted"},
                        "400": {"description": "Job is processing"},
                        "404": {"description": "Job not found"}
                    }
                }
            },
            "/bulk-sender/jobs/{job_id}/process": {
                "post": {
                    "tags": ["jobs"],
                    "summary": "Send the next batch of a processing job",
                    "operationId": "processBatch",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "job_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "Batch outcome",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/BatchOutcomeResponse"}
                                }
                            }
                        },
                        "400": {"description": "Job is not processing"},
                        "404": {"description": "Job not found"}
                    }
                }
            },
            // Recipient ingestion
            "/bulk-sender/recipients/parse": {
                "post": {
                    "tags": ["recipients"],
                    "summary": "Parse a recipient CSV upload",
                    "description": "Validates every row, assigns A/B/C variants round-robin where the CSV has no variant column, and returns the variant distribution.",
                    "operationId": "parseRecipients",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "text/csv": {
                                "schema": {"type": "string"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Parse result",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ParseResultResponse"}
                                }
                            }
                        },
                        "400": {"description": "Upload rejected (too large, too many rows, or missing columns)"}
                    }
                }
            },
            // Template endpoints
            "/bulk-sender/templates": {
                "get": {
                    "tags": ["templates"],
                    "summary": "List templates",
                    "operationId": "listTemplates",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "page", "in": "query", "schema": {"type": "integer", "default": 1}},
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 20}}
                    ],
                    "responses": {
                        "200": {"description": "Paginated templates with total count"}
                    }
                },
                "post": {
                    "tags": ["templates"],
                    "summary": "Create a template",
                    "description": "Creating a default template demotes any previous default.",
                    "operationId": "createTemplate",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/CreateTemplateRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {"description": "Template created"},
                        "400": {"description": "Missing name, subject or HTML content"}
                    }
                },
                "put": {
                    "tags": ["templates"],
                    "summary": "Update a template",
                    "operationId": "updateTemplate",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/UpdateTemplateRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {"description": "Template updated"},
                        "404": {"description": "Template not found"}
                    }
                },
                "delete": {
                    "tags": ["templates"],
                    "summary": "Delete a template",
                    "operationId": "deleteTemplate",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "id", "in": "query", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Template deleted"},
                        "404": {"description": "Template not found"}
                    }
                }
            },
            // Unsubscribe endpoints
            "/bulk-sender/unsubscribes": {
                "get": {
                    "tags": ["unsubscribes"],
                    "summary": "List suppressed addresses",
                    "operationId": "listUnsubscribes",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "page", "in": "query", "schema": {"type": "integer", "default": 1}},
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 50}},
                        {"name": "search", "in": "query", "schema": {"type": "string"}, "description": "Matches email or reason"}
                    ],
                    "responses": {
                        "200": {"description": "Paginated suppression list"},
                        "400": {"description": "Invalid pagination parameters"}
                    }
                },
                "post": {
                    "tags": ["unsubscribes"],
                    "summary": "Add addresses to the suppression list",
                    "description": "Accepts a single email or a batch. Already suppressed addresses are counted as duplicates, not errors.",
                    "operationId": "addUnsubscribes",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/AddUnsubscribesRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {"description": "Add outcome with duplicate list"},
                        "400": {"description": "No email given or invalid format"}
                    }
                },
                "delete": {
                    "tags": ["unsubscribes"],
                    "summary": "Remove an address from the suppression list",
                    "operationId": "removeUnsubscribe",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "email", "in": "query", "required": true, "schema": {"type": "string", "format": "email"}}
                    ],
                    "responses": {
                        "200": {"description": "Address removed"},
                        "404": {"description": "Address was not suppressed"}
                    }
                }
            },
            // Newsletter endpoints
            "/admin/newsletter/send": {
                "post": {
                    "tags": ["newsletter"],
                    "summary": "Start a newsletter campaign",
                    "description": "Persists the campaign and returns immediately; batches are delivered by a background worker.",
                    "operationId": "sendCampaign",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/SendCampaignRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Campaign started",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/CampaignStartedResponse"}
                                }
                            }
                        },
                        "400": {"description": "Invalid recipients or missing fields"}
                    }
                }
            },
            "/admin/newsletter/status/{campaign_id}": {
                "get": {
                    "tags": ["newsletter"],
                    "summary": "Get detailed campaign status",
                    "operationId": "campaignStatus",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "campaign_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign status with send counts and rates"},
                        "404": {"description": "Campaign not found"}
                    }
                }
            },
            "/admin/newsletter/campaigns": {
                "get": {
                    "tags": ["newsletter"],
                    "summary": "List campaigns",
                    "operationId": "listCampaigns",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 50, "maximum": 100}},
                        {"name": "offset", "in": "query", "schema": {"type": "integer", "default": 0}},
                        {"name": "status", "in": "query", "schema": {"type": "string", "enum": ["draft", "sending", "completed", "failed"]}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign summaries with delivery rates"}
                    }
                }
            },
            "/admin/newsletter/campaigns/stats": {
                "get": {
                    "tags": ["newsletter"],
                    "summary": "Aggregate campaign statistics",
                    "operationId": "campaignStats",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "responses": {
                        "200": {"description": "Totals across all campaigns"}
                    }
                }
            },
            "/admin/newsletter/campaigns/{campaign_id}/progress": {
                "get": {
                    "tags": ["newsletter"],
                    "summary": "Compact campaign progress",
                    "operationId": "campaignProgress",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "campaign_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Counters for polling clients"},
                        "404": {"description": "Campaign not found"}
                    }
                }
            },
            // Recipient list endpoints
            "/admin/newsletter/recipient-lists": {
                "get": {
                    "tags": ["recipient-lists"],
                    "summary": "List saved recipient lists",
                    "operationId": "listRecipientLists",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 20}},
                        {"name": "offset", "in": "query", "schema": {"type": "integer", "default": 0}}
                    ],
                    "responses": {
                        "200": {"description": "Lists with their variant distributions"}
                    }
                },
                "post": {
                    "tags": ["recipient-lists"],
                    "summary": "Save a recipient list",
                    "operationId": "createRecipientList",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/CreateListRequest"}
                            }
                        }
                    },
                    "responses": {
                        "201": {"description": "List created"},
                        "400": {"description": "Validation failed or list cap reached"},
                        "409": {"description": "A list with this name already exists"}
                    }
                }
            },
            "/admin/newsletter/recipient-lists/{list_id}": {
                "get": {
                    "tags": ["recipient-lists"],
                    "summary": "Get a list with its recipients",
                    "operationId": "getRecipientList",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "list_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "List details"},
                        "404": {"description": "List not found"}
                    }
                },
                "delete": {
                    "tags": ["recipient-lists"],
                    "summary": "Delete a list and its recipients",
                    "operationId": "deleteRecipientList",
                    "security": [{"api_key": []}, {"bearer": []}],
                    "parameters": [
                        {"name": "list_id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "List deleted"},
                        "404": {"description": "List not found"}
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "api_key": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "X-API-Key"
                },
                "bearer": {
                    "type": "http",
                    "scheme": "bearer"
                }
            },
            "schemas": {
                "HealthResponse": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string", "example": "healthy"},
                        "version": {"type": "string"}
                    }
                },
                "DetailedHealthResponse": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string"},
                        "version": {"type": "string"},
                        "checks": {
                            "type": "object",
                            "properties": {
                                "database": {"$ref": "#/components/schemas/ComponentHealth"},
                                "dispatch": {"$ref": "#/components/schemas/DispatchHealth"}
                            }
                        }
                    }
                },
                "ComponentHealth": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string"},
                        "latency_ms": {"type": "integer"},
                        "error": {"type": "string"}
                    }
                },
                "DispatchHealth": {
                    "type": "object",
                    "properties": {
                        "status": {"type": "string", "example": "idle"},
                        "active_job": {"type": "string", "format": "uuid"}
                    }
                },
                "CreateJobRequest": {
                    "type": "object",
                    "required": ["recipients", "subject", "htmlContent"],
                    "properties": {
                        "recipients": {
                            "type": "array",
                            "minItems": 1,
                            "items": {"$ref": "#/components/schemas/JobRecipient"}
                        },
                        "subject": {"type": "string"},
                        "htmlContent": {"type": "string"},
                        "batchSize": {"type": "integer", "default": 100},
                        "delayBetweenBatchesMs": {"type": "integer", "default": 10000}
                    }
                },
                "JobRecipient": {
                    "type": "object",
                    "required": ["email"],
                    "properties": {
                        "email": {"type": "string", "format": "email"},
                        "name": {"type": "string"},
                        "variant": {"type": "string", "enum": ["a", "b", "c"]}
                    }
                },
                "JobCreatedResponse": {
                    "type": "object",
                    "properties": {
                        "jobId": {"type": "string", "format": "uuid"},
                        "totalRecipients": {"type": "integer"},
                        "totalBatches": {"type": "integer"},
                        "estimatedTimeMinutes": {"type": "integer"},
                        "message": {"type": "string"}
                    }
                },
                "JobOverviewResponse": {
                    "type": "object",
                    "properties": {
                        "jobs": {"type": "array", "items": {"type": "object"}},
                        "activeJob": {"type": "object", "nullable": true}
                    }
                },
                "JobActionRequest": {
                    "type": "object",
                    "required": ["action"],
                    "properties": {
                        "action": {"type": "string", "enum": ["start", "pause", "resume", "cancel"]}
                    }
                },
                "BatchOutcomeResponse": {
                    "type": "object",
                    "properties": {
                        "batchNumber": {"type": "integer"},
                        "sent": {"type": "integer"},
                        "failed": {"type": "integer"},
                        "jobCompleted": {"type": "boolean"},
                        "nextBatchIn": {"type": "integer", "nullable": true, "description": "Milliseconds until the next batch"}
                    }
                },
                "ParseResultResponse": {
                    "type": "object",
                    "properties": {
                        "valid": {"type": "array", "items": {"type": "object"}},
                        "invalid": {"type": "array", "items": {"type": "object"}},
                        "errors": {"type": "array", "items": {"type": "string"}},
                        "variantDistribution": {
                            "type": "object",
                            "properties": {
                                "a": {"type": "integer"},
                                "b": {"type": "integer"},
                                "c": {"type": "integer"}
                            }
                        }
                    }
                },
                "CreateTemplateRequest": {
                    "type": "object",
                    "required": ["name", "subject", "html_content"],
                    "properties": {
                        "name": {"type": "string"},
                        "subject": {"type": "string"},
                        "html_content": {"type": "string"},
                        "is_default": {"type": "boolean", "default": false}
                    }
                },
                "UpdateTemplateRequest": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "name": {"type": "string"},
                        "subject": {"type": "string"},
                        "html_content": {"type": "string"},
                        "is_default": {"type": "boolean"}
                    }
                },
                "AddUnsubscribesRequest": {
                    "type": "object",
                    "properties": {
                        "email": {"type": "string", "format": "email"},
                        "emails": {"type": "array", "items": {"type": "string", "format": "email"}},
                        "reason": {"type": "string"}
                    }
                },
                "SendCampaignRequest": {
                    "type": "object",
                    "required": ["campaignName", "subject", "recipients"],
                    "properties": {
                        "campaignName": {"type": "string"},
                        "subject": {"type": "string", "description": "May contain {{name}} placeholders"},
                        "recipients": {
                            "type": "array",
                            "minItems": 1,
                            "items": {"$ref": "#/components/schemas/CampaignRecipient"}
                        }
                    }
                },
                "CampaignRecipient": {
                    "type": "object",
                    "required": ["email", "name", "variant"],
                    "properties": {
                        "email": {"type": "string", "format": "email"},
                        "name": {"type": "string"},
                        "variant": {"type": "string", "enum": ["a", "b", "c"]}
                    }
                },
                "CampaignStartedResponse": {
                    "type": "object",
                    "properties": {
                        "campaignId": {"type": "string", "format": "uuid"},
                        "status": {"type": "string", "example": "sending"},
                        "message": {"type": "string"},
                        "totalRecipients": {"type": "integer"}
                    }
                },
                "CreateListRequest": {
                    "type": "object",
                    "required": ["name", "recipients"],
                    "properties": {
                        "name": {"type": "string", "maxLength": 100},
                        "description": {"type": "string", "maxLength": 500},
                        "recipients": {
                            "type": "array",
                            "minItems": 1,
                            "maxItems": 10000,
                            "items": {"$ref": "#/components/schemas/ListRecipient"}
                        }
                    }
                },
                "ListRecipient": {
                    "type": "object",
                    "required": ["name", "email", "variant"],
                    "properties": {
                        "name": {"type": "string"},
                        "email": {"type": "string", "format": "email"},
                        "variant": {"type": "string", "enum": ["a", "b", "c"]},
                        "resultId": {"type": "string"}
                    }
                }
            }
        }
    })
}

/// Swagger UI HTML template
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sendloop API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_every_tag() {
        let spec = get_openapi_spec();
        let tags: Vec<&str> = spec["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();

        assert!(tags.contains(&"jobs"));
        assert!(tags.contains(&"newsletter"));
        assert!(tags.contains(&"recipient-lists"));
    }

    #[test]
    fn test_spec_documents_job_routes() {
        let spec = get_openapi_spec();
        let paths = spec["paths"].as_object().unwrap();

        assert!(paths.contains_key("/bulk-sender/jobs"));
        assert!(paths.contains_key("/bulk-sender/jobs/{job_id}/process"));
        assert!(paths.contains_key("/admin/newsletter/send"));
    }

    #[tokio::test]
    async fn test_openapi_routes_serve() {
        use axum_test::TestServer;

        let server = TestServer::new(create_openapi_routes()).unwrap();

        let response = server.get("/openapi.json").await;
        response.assert_status_ok();
        let spec: serde_json::Value = response.json();
        assert_eq!(spec["info"]["title"], "Sendloop API");

        let response = server.get("/docs").await;
        response.assert_status_ok();
        assert!(response.text().contains("swagger-ui"));
    }
}
