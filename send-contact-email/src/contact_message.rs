use lettre::Address;
use serde::Deserialize;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_SUBJECT_LENGTH: usize = 150;
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A contact form submission which has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    name: String,
    email: String,
    subject: String,
    message: String,
}

impl ContactMessage {
    /// Constructs a message without validating it.
    ///
    /// Callers are expected to have checked the fields already, for example with
    /// [`ContactFormMessage::validate`]. Rendering escapes every field either way.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The raw payload as posted by the contact form.
#[derive(Deserialize, Debug, Default)]
pub struct ContactFormMessage {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

impl ContactFormMessage {
    pub fn validate(&self) -> Result<ContactMessage, ValidationError> {
        let name = required_field("name", self.name.as_deref(), Some(MAX_NAME_LENGTH))?;
        let email = required_field("email", self.email.as_deref(), None)?;
        let subject = required_field("subject", self.subject.as_deref(), Some(MAX_SUBJECT_LENGTH))?;
        let message = required_field("message", self.message.as_deref(), Some(MAX_MESSAGE_LENGTH))?;

        if email.parse::<Address>().is_err() {
            return Err(ValidationError::InvalidEmail(email.into()));
        }

        Ok(ContactMessage::new(name, email, subject, message))
    }
}

fn required_field<'a>(
    field: &'static str,
    value: Option<&'a str>,
    max_length: Option<usize>,
) -> Result<&'a str, ValidationError> {
    let Some(value) = value else {
        return Err(ValidationError::MissingField(field));
    };
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    if let Some(max) = max_length {
        if value.chars().count() > max {
            return Err(ValidationError::FieldTooLong { field, max });
        }
    }
    Ok(value)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    BlankField(&'static str),
    FieldTooLong { field: &'static str, max: usize },
    InvalidEmail(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "Missing field {field}"),
            ValidationError::BlankField(field) => write!(f, "Field {field} must not be blank"),
            ValidationError::FieldTooLong { field, max } => {
                write!(f, "Field {field} must not exceed {max} characters")
            }
            ValidationError::InvalidEmail(email) => write!(f, "Invalid email address {email}"),
        }
    }
}

impl std::error::Error for ValidationError {}
