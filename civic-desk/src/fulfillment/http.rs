//! Remote JSON query API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Assignment, QueryBackend, QueryReceipt, QuerySubmission};
use crate::error::{DeskError, DeskResult};

/// Submits queries to the board's `db-api` endpoint.
pub struct HttpQueryBackend {
    endpoint: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    full_name: &'a str,
    address: &'a str,
    email: &'a str,
    category_id: u8,
    description: &'a str,
    query_id: &'a str,
    client_whatsapp: &'a str,
}

/// Flags and contact fields come back loosely typed (`1`, `"1"`, numbers).
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default, deserialize_with = "super::truthy")]
    success: bool,
    #[serde(default, deserialize_with = "super::truthy")]
    assigned: bool,
    #[serde(default, deserialize_with = "super::optional_scalar")]
    assigned_name: Option<String>,
    #[serde(default, deserialize_with = "super::optional_scalar")]
    assigned_email: Option<String>,
    #[serde(default, deserialize_with = "super::optional_scalar")]
    assigned_number: Option<String>,
    #[serde(default, deserialize_with = "super::optional_scalar")]
    error: Option<String>,
}

impl HttpQueryBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit_query(&self, submission: &QuerySubmission) -> DeskResult<QueryReceipt> {
        let body = SubmitRequest {
            full_name: &submission.full_name,
            address: &submission.address,
            email: &submission.email,
            category_id: submission.category.ordinal(),
            description: &submission.description,
            query_id: &submission.tracking_id,
            client_whatsapp: &submission.client_whatsapp,
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(DeskError::Transport(format!(
                "Query API error ({status}): {error}"
            )));
        }

        let data: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| DeskError::UpstreamData(format!("Failed to parse query API response: {e}")))?;

        if !data.success {
            tracing::warn!(
                tracking_id = %submission.tracking_id,
                error = data.error.as_deref().unwrap_or("unspecified"),
                "Query API rejected submission"
            );
            return Ok(QueryReceipt::rejected(&submission.tracking_id));
        }

        let assignment = data.assigned.then(|| Assignment {
            name: data
                .assigned_name
                .unwrap_or_else(|| "a staff member".to_string()),
            email: data.assigned_email,
            number: data.assigned_number,
        });

        Ok(QueryReceipt {
            accepted: true,
            tracking_id: submission.tracking_id.clone(),
            assignment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submission() -> QuerySubmission {
        QuerySubmission {
            full_name: "Jane Doe".into(),
            address: "12 Main St".into(),
            email: "jane@x.com".into(),
            category: Category::DevelopmentPermit,
            description: "Need a permit".into(),
            tracking_id: "QR4242W".into(),
            client_whatsapp: "263771234567".into(),
        }
    }

    #[tokio::test]
    async fn test_posts_expected_fields_and_reads_assignment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/db-api.php"))
            .and(body_json(json!({
                "full_name": "Jane Doe",
                "address": "12 Main St",
                "email": "jane@x.com",
                "category_id": 3,
                "description": "Need a permit",
                "query_id": "QR4242W",
                "client_whatsapp": "263771234567"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "assigned": true,
                "assigned_name": "Tino",
                "assigned_email": "tino@example.org",
                "assigned_number": "263770000000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpQueryBackend::new(&format!("{}/db-api.php", server.uri()));
        let receipt = backend.submit_query(&submission()).await.unwrap();

        assert!(receipt.accepted);
        assert_eq!(receipt.tracking_id, "QR4242W");
        let assignment = receipt.assignment.unwrap();
        assert_eq!(assignment.name, "Tino");
        assert_eq!(assignment.email.as_deref(), Some("tino@example.org"));
        assert_eq!(assignment.number.as_deref(), Some("263770000000"));
    }

    #[tokio::test]
    async fn test_unassigned_and_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "assigned": false})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "db down"})),
            )
            .mount(&server)
            .await;

        let backend = HttpQueryBackend::new(&server.uri());

        let receipt = backend.submit_query(&submission()).await.unwrap();
        assert!(receipt.accepted);
        assert!(receipt.assignment.is_none());

        let receipt = backend.submit_query(&submission()).await.unwrap();
        assert!(!receipt.accepted);
    }

    #[tokio::test]
    async fn test_loosely_typed_flags_and_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": 1, "assigned": 0})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "assigned": "1",
                "assigned_name": "Tino",
                "assigned_email": null,
                "assigned_number": 263770000000u64
            })))
            .mount(&server)
            .await;

        let backend = HttpQueryBackend::new(&server.uri());

        let receipt = backend.submit_query(&submission()).await.unwrap();
        assert!(receipt.accepted);
        assert!(receipt.assignment.is_none());

        let receipt = backend.submit_query(&submission()).await.unwrap();
        assert!(receipt.accepted);
        let assignment = receipt.assignment.unwrap();
        assert_eq!(assignment.name, "Tino");
        assert_eq!(assignment.email, None);
        assert_eq!(assignment.number.as_deref(), Some("263770000000"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let backend = HttpQueryBackend::new(&server.uri());
        let err = backend.submit_query(&submission()).await.unwrap_err();
        assert!(matches!(err, DeskError::UpstreamData(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = HttpQueryBackend::new(&server.uri());
        let err = backend.submit_query(&submission()).await.unwrap_err();
        assert!(matches!(err, DeskError::Transport(_)));
    }
}
