//! Framed protocol client used to drive the service over TCP.

use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use lintbridge_protocol::{
    AnalyzeRequest, Category, DecodeError, InitializeRequest, Message, decode, encode,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking client speaking the framed protocol.
pub struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestClient {
    /// Connects to the service at `address`.
    pub fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).expect("connect to service");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        let writer = stream.try_clone().expect("clone stream");
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    pub fn send(&mut self, message: &Message) {
        encode(&mut self.writer, message).expect("write request");
    }

    pub fn try_recv(&mut self) -> Result<Message, DecodeError> {
        decode(&mut self.reader)
    }

    pub fn recv(&mut self) -> Message {
        self.try_recv().expect("read response")
    }

    /// Sends one request and waits for its response.
    pub fn request(&mut self, message: &Message) -> Message {
        self.send(message);
        self.recv()
    }

    /// Sends `body` as the JSON payload of a `category` request.
    pub fn request_json<T: Serialize>(&mut self, category: Category, id: i32, body: &T) -> Message {
        let message = Message::json(category, id, body).expect("serialise request");
        self.request(&message)
    }

    /// True once the service has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        matches!(self.try_recv(), Err(DecodeError::Closed))
    }
}

/// `initialize` body, optionally naming a quality server.
#[must_use]
pub fn initialize_request(server_url: Option<&str>) -> InitializeRequest {
    InitializeRequest {
        toolchain_path: String::from("/opt/toolchain"),
        compiler_version: String::from("VER350"),
        server_url: server_url.map(str::to_owned),
        project_key: server_url.map(|_| String::from("demo-project")),
        api_token: None,
        language_key: Some(String::from("delph")),
    }
}

/// `analyze` body for `files` under `base_dir`.
#[must_use]
pub fn analyze_request(base_dir: &Path, files: &[&str]) -> AnalyzeRequest {
    AnalyzeRequest {
        base_dir: base_dir.to_path_buf(),
        input_files: files.iter().map(PathBuf::from).collect(),
    }
}
