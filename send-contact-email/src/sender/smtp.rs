use super::{Addressing, DeliveryError, DeliveryResult, EmailSender, OutboundEmail};
use async_trait::async_trait;
use lettre::{
    message::{
        header::ContentType, Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        self,
        authentication::{Credentials, Mechanism},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Delivers email over SMTP.
///
/// The underlying transport is pooled and may be shared between concurrent sends.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    addressing: Addressing,
}

impl SmtpSender {
    pub fn new(transport: AsyncSmtpTransport<Tokio1Executor>, addressing: Addressing) -> Self {
        Self {
            transport,
            addressing,
        }
    }

    /// Builds a transport from an `smtp://` or `smtps://` URL.
    pub fn from_url(
        smtp_url: &str,
        credentials: Option<Credentials>,
        addressing: Addressing,
    ) -> Result<Self, smtp::Error> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(smtp_url)?
            .authentication(vec![Mechanism::Plain]);
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        Ok(Self::new(builder.build(), addressing))
    }

    fn build_message(email: OutboundEmail) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&email.from)?)
            .subject(email.subject);
        for recipient in &email.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(parse_mailbox(reply_to)?);
        }

        let message = match email.attachment {
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.html_body),
            Some(attachment) => {
                let content_type = ContentType::parse(attachment.content_type()).map_err(|error| {
                    DeliveryError::InvalidMessage(format!(
                        "Invalid attachment content type {}: {error}",
                        attachment.content_type()
                    ))
                })?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::html(email.html_body))
                        .singlepart(
                            AttachmentPart::new(attachment.filename)
                                .body(attachment.content, content_type),
                        ),
                )
            }
        };
        message.map_err(|error| {
            DeliveryError::InvalidMessage(format!("Error building message: {error}"))
        })
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    async fn send(&self, email: OutboundEmail) -> DeliveryResult {
        let message = Self::build_message(email)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|error| {
        DeliveryError::InvalidMessage(format!("Invalid email address {address}: {error}"))
    })
}

impl From<smtp::Error> for DeliveryError {
    fn from(error: smtp::Error) -> Self {
        if error.is_permanent() || error.is_transient() {
            DeliveryError::Rejected {
                status: error
                    .status()
                    .and_then(|code| code.to_string().parse().ok()),
                body: error.to_string(),
            }
        } else {
            DeliveryError::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SmtpSender;
    use crate::sender::{Addressing, Attachment, DeliveryError, EmailSender, OutboundEmail};
    use googletest::prelude::*;
    use std::time::Duration;
    use test_support::{
        fake_smtp::{start_poisoned_smtp_server, FakeSmtpServer},
        unused_port,
    };
    use tokio::time::timeout;

    const MAILBOX: &str = "contact@example.com";

    fn sender_for(smtp_url: &str) -> SmtpSender {
        SmtpSender::from_url(smtp_url, None, Addressing::single_mailbox(MAILBOX)).unwrap()
    }

    fn arbitrary_email() -> OutboundEmail {
        OutboundEmail {
            from: MAILBOX.into(),
            to: vec![MAILBOX.into()],
            reply_to: Some("ana@x.com".into()),
            subject: "Portfolio: Hi".into(),
            html_body: "<p>Hello</p>".into(),
            attachment: None,
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn sends_html_message_with_reply_to_visitor() {
        let fake_smtp = FakeSmtpServer::start();
        let subject = sender_for(&fake_smtp.url());

        let result = subject.send(arbitrary_email()).await;

        expect_that!(result, ok(eq(())));
        expect_that!(
            timeout(Duration::from_secs(5), fake_smtp.last_mail_content()).await,
            ok(ok(all!(
                contains_substring(format!("From: {MAILBOX}")),
                contains_substring(format!("To: {MAILBOX}")),
                contains_substring("Reply-To: ana@x.com"),
                contains_substring("Subject: Portfolio: Hi"),
                contains_substring("Content-Type: text/html; charset=utf-8"),
                contains_substring("<p>Hello</p>")
            )))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn sends_attachment_in_mixed_multipart() {
        let fake_smtp = FakeSmtpServer::start();
        let subject = sender_for(&fake_smtp.url());

        let result = subject
            .send(OutboundEmail {
                attachment: Some(Attachment::new("notes.bin", vec![0x00, 0x9f, 0x92, 0x96])),
                ..arbitrary_email()
            })
            .await;

        expect_that!(result, ok(eq(())));
        expect_that!(
            timeout(Duration::from_secs(5), fake_smtp.last_mail_content()).await,
            ok(ok(all!(
                contains_substring("multipart/mixed"),
                contains_substring("filename=\"notes.bin\""),
                contains_substring("AJ+Slg=="),
                contains_substring("<p>Hello</p>")
            )))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn reports_rejection_when_server_refuses_session() {
        let subject = sender_for(&start_poisoned_smtp_server());

        let result = subject.send(arbitrary_email()).await;

        expect_that!(
            result,
            err(matches_pattern!(DeliveryError::Rejected {
                status: some(anything()),
                body: not(eq(""))
            }))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn reports_transport_error_when_server_is_unreachable() {
        let subject = sender_for(&format!("smtp://127.0.0.1:{}", unused_port()));

        let result = subject.send(arbitrary_email()).await;

        expect_that!(
            result,
            err(matches_pattern!(DeliveryError::Transport(anything())))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn rejects_malformed_reply_to_before_connecting() {
        let subject = sender_for(&format!("smtp://127.0.0.1:{}", unused_port()));

        let result = subject
            .send(OutboundEmail {
                reply_to: Some("not an address".into()),
                ..arbitrary_email()
            })
            .await;

        expect_that!(
            result,
            err(matches_pattern!(DeliveryError::InvalidMessage(
                contains_substring("not an address")
            )))
        );
    }
}
