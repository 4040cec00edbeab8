//! Deployment configuration.
//!
//! Addresses and URLs come from environment variables. Credentials come from a
//! [`SecretRepository`] and are only fetched for the backend which is actually selected.

use crate::{
    secrets::{SecretError, SecretRepository},
    sender::{Addressing, ConfiguredSender, HttpApiSender, SmtpSender, DEFAULT_EMAIL_API_URL},
};
use lettre::transport::smtp::{self, authentication::Credentials};
use secrecy::SecretString;
use serde::Deserialize;
use std::{borrow::Cow, fmt::Display, str::FromStr};
use tracing::info;

pub const MAIL_BACKEND_VAR: &str = "MAIL_BACKEND";
pub const MAIL_FROM_VAR: &str = "MAIL_FROM";
pub const CONTACT_MAIL_TO_VAR: &str = "CONTACT_MAIL_TO";
pub const EMAIL_API_URL_VAR: &str = "EMAIL_API_URL";
pub const SMTP_URL_VAR: &str = "SMTP_URL";

pub const EMAIL_API_KEY_NAME: &str = "email-api-key";
pub const SMTP_CREDENTIALS_NAME: &str = "smtp-credentials";

const SMTP_URL: &str = "smtps://email-smtp.eu-north-1.amazonaws.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderBackend {
    HttpApi,
    Smtp,
}

impl FromStr for SenderBackend {
    type Err = EnvironmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http-api" => Ok(SenderBackend::HttpApi),
            "smtp" => Ok(SenderBackend::Smtp),
            _ => Err(EnvironmentError::UnknownBackend(value.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerSettings {
    pub backend: SenderBackend,
    pub addressing: Addressing,
    pub email_api_url: Cow<'static, str>,
    pub smtp_url: Cow<'static, str>,
}

impl MailerSettings {
    pub fn from_env() -> Result<Self, EnvironmentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which behaves like `std::env::var`.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvironmentError> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match lookup(MAIL_BACKEND_VAR) {
            Some(value) => value.parse()?,
            None => SenderBackend::HttpApi,
        };
        let from = lookup(MAIL_FROM_VAR).ok_or(EnvironmentError::MissingVariable(MAIL_FROM_VAR))?;
        let recipients = lookup(CONTACT_MAIL_TO_VAR).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|recipient| !recipient.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        });
        let addressing = match (backend, recipients) {
            (_, Some(to)) if !to.is_empty() => Addressing { from, to },
            (SenderBackend::Smtp, _) => Addressing::single_mailbox(from),
            (SenderBackend::HttpApi, _) => {
                return Err(EnvironmentError::MissingVariable(CONTACT_MAIL_TO_VAR))
            }
        };

        Ok(Self {
            backend,
            addressing,
            email_api_url: lookup(EMAIL_API_URL_VAR)
                .map(Cow::Owned)
                .unwrap_or(DEFAULT_EMAIL_API_URL.into()),
            smtp_url: lookup(SMTP_URL_VAR)
                .map(Cow::Owned)
                .unwrap_or(SMTP_URL.into()),
        })
    }
}

#[derive(Deserialize)]
struct EmailApiKey {
    #[serde(rename = "API_KEY")]
    api_key: String,
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

pub async fn build_sender<SecretRepositoryT: SecretRepository + Sync>(
    settings: &MailerSettings,
    secrets_repository: &SecretRepositoryT,
) -> Result<ConfiguredSender, EnvironmentError> {
    match settings.backend {
        SenderBackend::HttpApi => {
            let key: EmailApiKey = secrets_repository.get_secret(EMAIL_API_KEY_NAME).await?;
            info!("build_sender: Sending through email API {}", settings.email_api_url);
            Ok(ConfiguredSender::HttpApi(
                HttpApiSender::new(SecretString::new(key.api_key), settings.addressing.clone())?
                    .with_endpoint(settings.email_api_url.as_ref()),
            ))
        }
        SenderBackend::Smtp => {
            let smtp_url = settings.smtp_url.as_ref();
            info!("build_sender: Connecting to {smtp_url}");
            // Credentials must never travel over a plain connection. If the URL is misconfigured
            // the relay rejects the unauthenticated session instead.
            let credentials = if smtp_url.starts_with("smtps://") {
                let parsed_credentials: SmtpCredentials =
                    secrets_repository.get_secret(SMTP_CREDENTIALS_NAME).await?;
                Some(Credentials::new(
                    parsed_credentials.username,
                    parsed_credentials.password,
                ))
            } else {
                None
            };
            Ok(ConfiguredSender::Smtp(SmtpSender::from_url(
                smtp_url,
                credentials,
                settings.addressing.clone(),
            )?))
        }
    }
}

#[derive(Debug)]
pub enum EnvironmentError {
    MissingVariable(&'static str),
    UnknownBackend(String),
    Secret(SecretError),
    Smtp(smtp::Error),
    HttpClient(reqwest::Error),
}

impl From<SecretError> for EnvironmentError {
    fn from(error: SecretError) -> Self {
        EnvironmentError::Secret(error)
    }
}

impl From<smtp::Error> for EnvironmentError {
    fn from(error: smtp::Error) -> Self {
        EnvironmentError::Smtp(error)
    }
}

impl From<reqwest::Error> for EnvironmentError {
    fn from(error: reqwest::Error) -> Self {
        EnvironmentError::HttpClient(error)
    }
}

impl Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::MissingVariable(key) => {
                write!(f, "Missing environment variable {key}")
            }
            EnvironmentError::UnknownBackend(value) => write!(f, "Unknown mail backend {value}"),
            EnvironmentError::Secret(error) => write!(f, "{error}"),
            EnvironmentError::Smtp(error) => write!(f, "Invalid SMTP configuration: {error}"),
            EnvironmentError::HttpClient(error) => {
                write!(f, "Could not initialise HTTP client: {error}")
            }
        }
    }
}

impl std::error::Error for EnvironmentError {}
