//! Outbound email delivery.
//!
//! [`EmailSender`] is implemented by [`HttpApiSender`], which posts to a transactional email
//! API, and [`SmtpSender`], which speaks SMTP to a relay. A deployment picks one of them
//! through [`ConfiguredSender`].

mod http_api;
mod smtp;

use async_trait::async_trait;
pub use http_api::{HttpApiSender, DEFAULT_EMAIL_API_URL};
pub use smtp::SmtpSender;
use std::fmt::Display;

pub type DeliveryResult = Result<(), DeliveryError>;

/// A rendered email ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl Attachment {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";

    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..self
        }
    }

    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(Self::DEFAULT_CONTENT_TYPE)
    }
}

/// The fixed sender identity and recipients of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub from: String,
    pub to: Vec<String>,
}

impl Addressing {
    /// Sends from and to the same mailbox; replies reach the visitor through reply-to.
    pub fn single_mailbox(mailbox: impl Into<String>) -> Self {
        let mailbox = mailbox.into();
        Self {
            from: mailbox.clone(),
            to: vec![mailbox],
        }
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn addressing(&self) -> &Addressing;

    /// Hands the email to the transport once. There is no retry.
    async fn send(&self, email: OutboundEmail) -> DeliveryResult;
}

/// The sender chosen by configuration at startup.
pub enum ConfiguredSender {
    HttpApi(HttpApiSender),
    Smtp(SmtpSender),
}

#[async_trait]
impl EmailSender for ConfiguredSender {
    fn addressing(&self) -> &Addressing {
        match self {
            ConfiguredSender::HttpApi(sender) => sender.addressing(),
            ConfiguredSender::Smtp(sender) => sender.addressing(),
        }
    }

    async fn send(&self, email: OutboundEmail) -> DeliveryResult {
        match self {
            ConfiguredSender::HttpApi(sender) => sender.send(email).await,
            ConfiguredSender::Smtp(sender) => sender.send(email).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport could not be reached or failed mid-exchange.
    Transport(String),
    /// The remote end refused the message.
    Rejected { status: Option<u16>, body: String },
    /// The request body for the transport could not be encoded.
    Serialization(String),
    /// The message could not be put together, for example because of a malformed address.
    InvalidMessage(String),
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Transport(description) => write!(f, "Transport error: {description}"),
            DeliveryError::Rejected {
                status: Some(status),
                body,
            } => write!(f, "Rejected with status {status}: {body}"),
            DeliveryError::Rejected { status: None, body } => write!(f, "Rejected: {body}"),
            DeliveryError::Serialization(description) => {
                write!(f, "Serialization error: {description}")
            }
            DeliveryError::InvalidMessage(description) => {
                write!(f, "Invalid message: {description}")
            }
        }
    }
}

impl std::error::Error for DeliveryError {}
