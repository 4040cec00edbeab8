use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    routing::post,
    Router,
};
use serde_json::Value;
use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

const SEND_PATH: &str = "/emails";

/// A request as seen by [`FakeEmailApi`].
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    /// The parsed JSON body, or the raw body as a JSON string if it was not JSON.
    pub payload: Value,
}

/// A transactional email API which records requests and answers with a fixed response.
#[derive(Clone)]
pub struct FakeEmailApi {
    status: u16,
    body: Cow<'static, str>,
    location: Option<Cow<'static, str>>,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl FakeEmailApi {
    pub fn new() -> Self {
        Self {
            status: 200,
            body: r#"{"id":"fake-email-id"}"#.into(),
            location: None,
            requests: Default::default(),
        }
    }

    pub fn respond_with(self, status: u16, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            body: body.into(),
            ..self
        }
    }

    /// Answers the send endpoint with a redirect to `location`.
    ///
    /// Requests which follow the redirect are recorded and answered with 200.
    pub fn redirect_to(self, status: u16, location: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            body: "".into(),
            location: Some(location.into()),
            ..self
        }
    }

    /// Serves on a free local port and returns the URL of the send endpoint.
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(SEND_PATH, post(send_email))
            .fallback(accept_redirected)
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}{SEND_PATH}")
    }

    pub fn received_requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for FakeEmailApi {
    fn default() -> Self {
        Self::new()
    }
}

async fn send_email(
    State(state): State<FakeEmailApi>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, HeaderMap, String) {
    state.record(SEND_PATH, &headers, body);
    let mut response_headers = HeaderMap::new();
    if let Some(location) = &state.location {
        response_headers.insert(header::LOCATION, location.parse().unwrap());
    }
    (
        StatusCode::from_u16(state.status).unwrap(),
        response_headers,
        state.body.to_string(),
    )
}

async fn accept_redirected(
    State(state): State<FakeEmailApi>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    state.record(uri.path(), &headers, body);
    StatusCode::OK
}

impl FakeEmailApi {
    fn record(&self, path: &str, headers: &HeaderMap, body: String) {
        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(String::from)
        };
        let payload = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        self.requests.lock().unwrap().push(ReceivedRequest {
            path: path.into(),
            authorization: header_value(header::AUTHORIZATION),
            content_type: header_value(header::CONTENT_TYPE),
            payload,
        });
    }
}

/// Starts a server which answers one request with `status` and a body cut short of its
/// declared length, then closes the connection. Returns the URL to post to.
pub async fn start_truncated_response_server(status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            stream.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        stream.read_exact(&mut request_body).await.unwrap();
        let response = format!("HTTP/1.1 {status} Failure\r\nContent-Length: 100\r\n\r\ncut short");
        stream.get_mut().write_all(response.as_bytes()).await.unwrap();
    });
    format!("http://{address}{SEND_PATH}")
}
