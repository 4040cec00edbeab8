use crate::{
    contact_message::ContactMessage,
    notification::render_contact_notification,
    sender::{Attachment, DeliveryError, EmailSender, OutboundEmail},
};
use std::fmt::Display;

pub const SUBJECT_PREFIX: &str = "Portfolio: ";

/// Turns contact messages into notification emails and hands them to an [`EmailSender`].
pub struct ContactEmailService<SenderT: EmailSender> {
    sender: SenderT,
}

impl<SenderT: EmailSender> ContactEmailService<SenderT> {
    pub fn new(sender: SenderT) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &SenderT {
        &self.sender
    }

    pub async fn send_contact_email(
        &self,
        message: &ContactMessage,
    ) -> Result<(), ContactEmailError> {
        self.deliver(message, None).await
    }

    pub async fn send_contact_email_with_attachment(
        &self,
        message: &ContactMessage,
        attachment: Attachment,
    ) -> Result<(), ContactEmailError> {
        self.deliver(message, Some(attachment)).await
    }

    async fn deliver(
        &self,
        message: &ContactMessage,
        attachment: Option<Attachment>,
    ) -> Result<(), ContactEmailError> {
        let email = self.build_email(message, attachment);
        self.sender.send(email).await?;
        Ok(())
    }

    fn build_email(&self, message: &ContactMessage, attachment: Option<Attachment>) -> OutboundEmail {
        let addressing = self.sender.addressing();
        OutboundEmail {
            from: addressing.from.clone(),
            to: addressing.to.clone(),
            reply_to: Some(message.email().into()),
            subject: format!("{SUBJECT_PREFIX}{}", message.subject()),
            html_body: render_contact_notification(message),
            attachment,
        }
    }
}

/// Any failure to deliver a contact email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEmailError {
    cause: String,
}

impl ContactEmailError {
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl From<DeliveryError> for ContactEmailError {
    fn from(error: DeliveryError) -> Self {
        Self {
            cause: error.to_string(),
        }
    }
}

impl Display for ContactEmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error sending contact email: {}", self.cause)
    }
}

impl std::error::Error for ContactEmailError {}
