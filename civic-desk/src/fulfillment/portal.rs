//! Customer portal client for billing statements.
//!
//! Login is a form post that answers `{"success": bool, "error": "..."}` and
//! hands out session cookies. The data API is then read with those cookies
//! replayed in a `Cookie` header.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response};
use serde_json::Value;

use civic_common::PortalConfig;

use super::{is_truthy, BillingPortal, BillingStatement, StatementOutcome};
use crate::error::{DeskError, DeskResult};
use crate::presenter::DEFAULT_LOGIN_ERROR;

pub struct HttpBillingPortal {
    login_url: String,
    api_url: String,
    client: Client,
}

impl HttpBillingPortal {
    pub fn new(config: &PortalConfig) -> DeskResult<Self> {
        // The login endpoint answers with a redirect on success; cookies must
        // be read from that first response.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            login_url: config.login_url.clone(),
            api_url: config.api_url.clone(),
            client,
        })
    }
}

/// 2xx and 3xx are both usable answers from the portal.
fn accept_status(resp: &Response, what: &str) -> DeskResult<()> {
    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        Ok(())
    } else {
        Err(DeskError::Transport(format!("Portal {what} returned {status}")))
    }
}

/// `name=value` pairs from every `Set-Cookie` header, joined for replay.
fn session_cookies(resp: &Response) -> String {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl BillingPortal for HttpBillingPortal {
    async fn fetch_statement(&self, account: &str, password: &str) -> DeskResult<StatementOutcome> {
        let login = self
            .client
            .post(&self.login_url)
            .form(&[("username", account), ("password", password)])
            .send()
            .await?;
        accept_status(&login, "login")?;

        let cookies = session_cookies(&login);
        let body = login.text().await?;
        let reply: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if !is_truthy(reply.get("success")) {
            let message = reply
                .get("error")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_LOGIN_ERROR)
                .to_string();
            tracing::info!("Portal login rejected");
            return Ok(StatementOutcome::AuthFailed { message });
        }

        if cookies.is_empty() {
            return Err(DeskError::Authentication(
                "Login succeeded but no session cookie was returned.".into(),
            ));
        }

        let data = self
            .client
            .get(&self.api_url)
            .header(COOKIE, &cookies)
            .send()
            .await?;
        accept_status(&data, "data API")?;

        let body = data.text().await?;
        let statement: BillingStatement = serde_json::from_str(&body)
            .map_err(|e| DeskError::UpstreamData(format!("Could not parse bill data: {e}")))?;

        tracing::debug!(
            transactions = statement.transactions.len(),
            "Fetched billing statement"
        );

        Ok(StatementOutcome::Statement {
            statement,
            session_token: cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn portal_for(server: &MockServer) -> HttpBillingPortal {
        HttpBillingPortal::new(&PortalConfig {
            login_url: format!("{}/data/login2.php", server.uri()),
            api_url: format!("{}/api.php", server.uri()),
            pdf_statement_base: format!("{}/stat/statement.php?id=", server.uri()),
            user_agent: "Mozilla/5.0".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_then_fetch_with_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/login2.php"))
            .and(body_string_contains("username=12345"))
            .and(body_string_contains("password=s3cret"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Set-Cookie", "PHPSESSID=abc123; path=/; HttpOnly")
                    .insert_header("Location", "/home.php")
                    .set_body_json(json!({"success": true})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api.php"))
            .and(header("Cookie", "PHPSESSID=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "account": {"number": "12345", "name": "J Doe", "balance": "42.50"},
                "transactions": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = portal_for(&server)
            .fetch_statement("12345", "s3cret")
            .await
            .unwrap();

        match outcome {
            StatementOutcome::Statement {
                statement,
                session_token,
            } => {
                assert_eq!(statement.account.name, "J Doe");
                assert_eq!(session_token, "PHPSESSID=abc123");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_login_reports_portal_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "error": "Wrong password"})),
            )
            .mount(&server)
            .await;

        let outcome = portal_for(&server).fetch_statement("1", "x").await.unwrap();
        assert_eq!(
            outcome,
            StatementOutcome::AuthFailed {
                message: "Wrong password".into()
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_login_uses_default_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let outcome = portal_for(&server).fetch_statement("1", "x").await.unwrap();
        assert_eq!(
            outcome,
            StatementOutcome::AuthFailed {
                message: DEFAULT_LOGIN_ERROR.into()
            }
        );
    }

    #[tokio::test]
    async fn test_success_without_cookie_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let err = portal_for(&server).fetch_statement("1", "x").await.unwrap_err();
        assert!(matches!(err, DeskError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_bill_without_account_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "PHPSESSID=abc; path=/")
                    .set_body_json(json!({"success": true})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "expired"})))
            .mount(&server)
            .await;

        let err = portal_for(&server).fetch_statement("1", "x").await.unwrap_err();
        assert!(matches!(err, DeskError::UpstreamData(_)));
    }

    #[tokio::test]
    async fn test_bill_with_null_account_fields_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "PHPSESSID=abc; path=/")
                    .set_body_json(json!({"success": 1})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "account": {"number": null, "name": null, "balance": null},
                "transactions": []
            })))
            .mount(&server)
            .await;

        let err = portal_for(&server).fetch_statement("1", "x").await.unwrap_err();
        assert!(matches!(err, DeskError::UpstreamData(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = portal_for(&server).fetch_statement("1", "x").await.unwrap_err();
        assert!(matches!(err, DeskError::Transport(_)));
    }
}
