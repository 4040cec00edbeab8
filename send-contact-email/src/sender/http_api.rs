use super::{Addressing, DeliveryError, DeliveryResult, EmailSender, OutboundEmail};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, redirect, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

/// Delivers email through a Resend-compatible transactional email API.
///
/// Each send is a single POST. Redirects are not followed, so a 3xx reply is a rejection.
pub struct HttpApiSender {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    addressing: Addressing,
}

impl HttpApiSender {
    pub fn new(api_key: SecretString, addressing: Addressing) -> Result<Self, reqwest::Error> {
        let client = Client::builder().redirect(redirect::Policy::none()).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: DEFAULT_EMAIL_API_URL.into(),
            addressing,
        })
    }

    pub fn with_endpoint(self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..self
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmailSender for HttpApiSender {
    fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    async fn send(&self, email: OutboundEmail) -> DeliveryResult {
        let payload = serde_json::to_vec(&SendEmailPayload::from_email(&email))
            .map_err(|error| DeliveryError::Serialization(error.to_string()))?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: Some(status.as_u16()),
            body,
        })
    }
}

#[derive(Serialize)]
struct SendEmailPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload<'a>>,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    content: String,
    content_type: &'a str,
}

impl<'a> SendEmailPayload<'a> {
    fn from_email(email: &'a OutboundEmail) -> Self {
        Self {
            from: &email.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html_body,
            reply_to: email.reply_to.as_deref(),
            attachments: email
                .attachment
                .iter()
                .map(|attachment| AttachmentPayload {
                    filename: &attachment.filename,
                    content: STANDARD.encode(&attachment.content),
                    content_type: attachment.content_type(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HttpApiSender;
    use crate::sender::{Addressing, Attachment, DeliveryError, EmailSender, OutboundEmail};
    use googletest::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;
    use test_support::fake_email_api::{start_truncated_response_server, FakeEmailApi};

    const FAKE_API_KEY: &str = "fake api key";

    fn sender_for(endpoint: String) -> HttpApiSender {
        HttpApiSender::new(
            SecretString::new(FAKE_API_KEY.into()),
            Addressing {
                from: "Contact form <noreply@example.com>".into(),
                to: vec!["owner@example.com".into()],
            },
        )
        .unwrap()
        .with_endpoint(endpoint)
    }

    fn arbitrary_email() -> OutboundEmail {
        OutboundEmail {
            from: "Contact form <noreply@example.com>".into(),
            to: vec!["owner@example.com".into()],
            reply_to: Some("ana@x.com".into()),
            subject: "Portfolio: Hi".into(),
            html_body: "<p>Hello</p>".into(),
            attachment: None,
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn posts_json_payload_with_bearer_token() {
        let fake_api = FakeEmailApi::new();
        let subject = sender_for(fake_api.start().await);

        let result = subject.send(arbitrary_email()).await;

        expect_that!(result, ok(eq(())));
        let requests = fake_api.received_requests();
        expect_that!(requests.len(), eq(1));
        expect_that!(
            requests[0].authorization,
            some(eq(format!("Bearer {FAKE_API_KEY}")))
        );
        expect_that!(requests[0].content_type, some(eq("application/json")));
        expect_that!(
            requests[0].payload,
            eq(json!({
                "from": "Contact form <noreply@example.com>",
                "to": ["owner@example.com"],
                "subject": "Portfolio: Hi",
                "html": "<p>Hello</p>",
                "reply_to": "ana@x.com",
            }))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn succeeds_for_every_2xx_status() {
        for status in [200, 201, 202, 299] {
            let fake_api = FakeEmailApi::new().respond_with(status, "{}");
            let subject = sender_for(fake_api.start().await);

            expect_that!(subject.send(arbitrary_email()).await, ok(eq(())));
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_status_and_body_verbatim_for_non_2xx_status() {
        for status in [301, 400, 401, 422, 429, 500, 503] {
            let body = format!("failure body for {status}");
            let fake_api = FakeEmailApi::new().respond_with(status, body.clone());
            let subject = sender_for(fake_api.start().await);

            expect_that!(
                subject.send(arbitrary_email()).await,
                err(eq(DeliveryError::Rejected {
                    status: Some(status),
                    body: body.clone()
                }))
            );
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn does_not_follow_redirects() {
        let fake_api = FakeEmailApi::new().redirect_to(307, "/elsewhere");
        let subject = sender_for(fake_api.start().await);

        let result = subject.send(arbitrary_email()).await;

        expect_that!(
            result,
            err(matches_pattern!(DeliveryError::Rejected {
                status: some(eq(307))
            }))
        );
        let requests = fake_api.received_requests();
        expect_that!(requests.len(), eq(1));
        expect_that!(requests[0].path, eq("/emails"));
    }

    #[googletest::test]
    #[tokio::test]
    async fn keeps_status_when_failure_body_cannot_be_read() {
        let subject = sender_for(start_truncated_response_server(503).await);

        let result = subject.send(arbitrary_email()).await;

        expect_that!(
            result,
            err(eq(DeliveryError::Rejected {
                status: Some(503),
                body: String::new()
            }))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn omits_reply_to_when_absent() {
        let fake_api = FakeEmailApi::new();
        let subject = sender_for(fake_api.start().await);

        subject
            .send(OutboundEmail {
                reply_to: None,
                ..arbitrary_email()
            })
            .await
            .unwrap();

        let requests = fake_api.received_requests();
        expect_that!(requests[0].payload.get("reply_to"), none());
        expect_that!(requests[0].payload.get("attachments"), none());
    }

    #[googletest::test]
    #[tokio::test]
    async fn sends_attachment_as_base64() {
        let fake_api = FakeEmailApi::new();
        let subject = sender_for(fake_api.start().await);

        subject
            .send(OutboundEmail {
                attachment: Some(Attachment::new("notes.txt", b"hello".to_vec())),
                ..arbitrary_email()
            })
            .await
            .unwrap();

        let requests = fake_api.received_requests();
        expect_that!(
            requests[0].payload["attachments"],
            eq(json!([{
                "filename": "notes.txt",
                "content": "aGVsbG8=",
                "content_type": "application/octet-stream",
            }]))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn reports_transport_error_when_api_is_unreachable() {
        let subject = sender_for(format!("http://127.0.0.1:{}/emails", test_support::unused_port()));

        let result = subject.send(arbitrary_email()).await;

        expect_that!(result, err(matches_pattern!(DeliveryError::Transport(anything()))));
    }
}
