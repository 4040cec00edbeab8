use crate::unused_port;
use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{
    net::{IpAddr, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};
use tokio::sync::watch::{self, error::RecvError, Receiver, Sender};

const SERVER_NAME: &str = "contact-form.test";

#[derive(Clone)]
struct SmtpHandler(Vec<u8>, Arc<Sender<String>>);

impl Handler for SmtpHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        debug!("Got data:\n{}", String::from_utf8_lossy(buf));
        self.0.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let content = String::from_utf8_lossy(&self.0).into_owned();
        self.0.clear();
        let _ = self.1.send(content);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> mailin_embedded::Response {
        debug!("Got authentication data {authorization_id}, {authentication_id}, {password}");
        mailin_embedded::response::AUTH_OK
    }
}

/// An SMTP server on a free local port which accepts every message.
pub struct FakeSmtpServer {
    port: u16,
    receiver: tokio::sync::Mutex<Receiver<String>>,
}

impl FakeSmtpServer {
    pub fn start() -> Self {
        let (sender, receiver) = watch::channel("".into());
        let port = serve(SmtpHandler(Vec::new(), Arc::new(sender)));
        Self {
            port,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn url(&self) -> String {
        format!("smtp://127.0.0.1:{}", self.port)
    }

    /// Waits for the next message and returns its raw content, headers included.
    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        let mut receiver = self.receiver.lock().await;
        receiver.changed().await?;
        let content = receiver.borrow_and_update().clone();
        Ok(content)
    }
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

/// Starts an SMTP server which refuses every session and returns its URL.
pub fn start_poisoned_smtp_server() -> String {
    let port = serve(PoisonedSmtpHandler);
    format!("smtp://127.0.0.1:{port}")
}

fn serve<HandlerT: Handler + Clone + Send + 'static>(handler: HandlerT) -> u16 {
    let port = unused_port();
    let mut server = Server::new(handler);
    server
        .with_name(SERVER_NAME)
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("127.0.0.1:{port}"))
        .unwrap();
    thread::spawn(move || {
        let _ = server.serve();
    });
    wait_until_listening(port);
    port
}

fn wait_until_listening(port: u16) {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("Fake SMTP server on port {port} did not start");
}
