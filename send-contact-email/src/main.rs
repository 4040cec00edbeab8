use lambda_http::{
    http::StatusCode, run, service_fn, Body, Error, Request, RequestPayloadExt, Response,
};
use send_contact_email::{
    config::{build_sender, MailerSettings},
    contact_message::ContactFormMessage,
    secrets::{AwsSecretsManagerSecretRepository, SecretRepository},
    sender::EmailSender,
    service::{ContactEmailError, ContactEmailService},
};
use serde_json::{json, Value};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let settings = MailerSettings::from_env()?;
    let secrets_repository = AwsSecretsManagerSecretRepository::open().await;
    let sender = build_sender(&settings, &secrets_repository).await?;
    let handler = ContactFormMessageHandler::new(ContactEmailService::new(sender));
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactFormMessageHandler<SenderT: EmailSender> {
    service: ContactEmailService<SenderT>,
}

impl<SenderT: EmailSender> ContactFormMessageHandler<SenderT> {
    fn new(service: ContactEmailService<SenderT>) -> Self {
        Self { service }
    }

    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        match self.process_message(event).await {
            Ok(()) => {
                info!("Contact form email sent");
                json_response(StatusCode::OK, json!({ "Status": "Success" }))
            }
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_message(&self, event: Request) -> Result<(), ContactFormError> {
        let message: ContactFormMessage = match event.payload() {
            Ok(Some(message)) => message,
            Ok(None) => return Err(ContactFormError::ClientError("Missing event payload".into())),
            Err(error) => {
                return Err(ContactFormError::ClientError(format!(
                    "Malformed event payload: {error}"
                )))
            }
        };
        let validated_message = message
            .validate()
            .map_err(|error| ContactFormError::ClientError(error.to_string()))?;
        self.service
            .send_contact_email(&validated_message)
            .await
            .map_err(ContactFormError::InternalError)
    }
}

#[derive(Debug)]
enum ContactFormError {
    InternalError(ContactEmailError),
    ClientError(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::InternalError(error) => {
                error!("Internal error sending contact form email: {error}");
            }
            ContactFormError::ClientError(description) => {
                error!("Client error sending contact form email: {description}");
            }
        }
    }

    fn into_response(self) -> Result<Response<Body>, Error> {
        match self {
            ContactFormError::InternalError(_) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "Status": "Error", "Message": "The message could not be sent" }),
            ),
            ContactFormError::ClientError(description) => json_response(
                StatusCode::BAD_REQUEST,
                json!({ "Status": "Error", "Message": format!("Client error: {description}") }),
            ),
        }
    }
}

fn json_response(status: StatusCode, body: Value) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.to_string().into())?)
}
