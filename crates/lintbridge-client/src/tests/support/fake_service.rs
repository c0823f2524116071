//! Scripted stand-in for `lintbridged`.
//!
//! Accepts one connection, records every request and answers each category
//! with a canned response that tests may override.

use std::collections::HashMap;
use std::io::{self, BufReader};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use lintbridge_protocol::{
    AnalyzeResult, Category, DecodeError, ErrorPayload, Message, RuleRetrieveResult, decode,
    encode,
};

const ACCEPT_DEADLINE: Duration = Duration::from_secs(2);

/// Response to send for one request category.
#[derive(Clone, Debug)]
pub(in crate::tests) struct Scripted {
    category: Category,
    payload: Vec<u8>,
}

impl Scripted {
    pub fn json<T: serde::Serialize>(category: Category, body: &T) -> Self {
        Self {
            category,
            payload: serde_json::to_vec(body).unwrap_or_default(),
        }
    }

    pub fn empty(category: Category) -> Self {
        Self {
            category,
            payload: Vec::new(),
        }
    }

    pub fn error(category: Category, code: Option<&str>, message: &str) -> Self {
        let body = match code {
            Some(code) => ErrorPayload::with_code(code, message),
            None => ErrorPayload::new(message),
        };
        Self::json(category, &body)
    }
}

/// One request as the fake service saw it.
#[derive(Clone, Debug)]
pub(in crate::tests) struct Recorded {
    pub category: Category,
    pub correlation_id: i32,
    pub payload: String,
}

pub(in crate::tests) struct FakeService {
    port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: Option<thread::JoinHandle<Result<()>>>,
}

impl FakeService {
    /// Spawns the service with the default script overridden by `overrides`.
    pub fn spawn(overrides: Vec<(Category, Scripted)>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake service")?;
        listener
            .set_nonblocking(true)
            .context("fake service nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let mut script = default_script();
        script.extend(overrides);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || serve(&listener, &script, &recorded));
        Ok(Self {
            port,
            requests,
            handle: Some(handle),
        })
    }

    /// Spawns a service that rejects its one connection the way a busy
    /// `lintbridged` does: an id-0 `unexpectedError`, then end of stream.
    pub fn spawn_refusing(code: &str, message: &str) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake service")?;
        listener
            .set_nonblocking(true)
            .context("fake service nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let refusal = Message::json(
            Category::UnexpectedError,
            0,
            &ErrorPayload::with_code(code, message),
        )
        .context("serialise refusal")?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || refuse(&listener, &refusal, &recorded));
        Ok(Self {
            port,
            requests,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the connection to finish and returns the recorded requests.
    pub fn take_requests(&mut self) -> Result<Vec<Recorded>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake service thread panicked"))?
                .context("fake service failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }
}

fn default_script() -> HashMap<Category, Scripted> {
    HashMap::from([
        (Category::Initialize, Scripted::empty(Category::Initialized)),
        (
            Category::Analyze,
            Scripted::json(Category::AnalyzeResult, &AnalyzeResult::default()),
        ),
        (
            Category::RuleRetrieve,
            Scripted::json(Category::RuleRetrieveResult, &RuleRetrieveResult::default()),
        ),
        (Category::Quit, Scripted::empty(Category::QuitAck)),
    ])
}

fn serve(
    listener: &TcpListener,
    script: &HashMap<Category, Scripted>,
    requests: &Mutex<Vec<Recorded>>,
) -> Result<()> {
    let Some(stream) = accept(listener)? else {
        return Ok(());
    };
    stream
        .set_nonblocking(false)
        .context("fake service blocking stream")?;
    let mut writer = stream.try_clone().context("clone stream")?;
    let mut reader = BufReader::new(stream);
    loop {
        let request = match decode(&mut reader) {
            Ok(request) => request,
            Err(DecodeError::Closed) => return Ok(()),
            Err(error) => return Err(error).context("read request"),
        };
        requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?
            .push(Recorded {
                category: request.category(),
                correlation_id: request.correlation_id(),
                payload: request.payload_text(),
            });
        let response = match (request.category(), script.get(&request.category())) {
            (_, Some(scripted)) => Message::new(
                scripted.category,
                request.correlation_id(),
                scripted.payload.clone(),
            ),
            (Category::Ping, None) => Message::new(
                Category::Pong,
                request.correlation_id(),
                request.payload().to_vec(),
            ),
            (_, None) => Message::json(
                Category::InvalidRequest,
                request.correlation_id(),
                &ErrorPayload::with_code("unexpected-category", "not scripted"),
            )
            .context("serialise rejection")?,
        };
        encode(&mut writer, &response).context("write response")?;
    }
}

fn refuse(
    listener: &TcpListener,
    refusal: &Message,
    requests: &Mutex<Vec<Recorded>>,
) -> Result<()> {
    let Some(stream) = accept(listener)? else {
        return Ok(());
    };
    stream
        .set_nonblocking(false)
        .context("fake service blocking stream")?;
    let mut writer = stream.try_clone().context("clone stream")?;
    encode(&mut writer, refusal).context("write refusal")?;
    writer
        .shutdown(Shutdown::Write)
        .context("close refusing stream")?;
    // Drain so the client sees a clean end of stream rather than a reset.
    let mut reader = BufReader::new(stream);
    loop {
        match decode(&mut reader) {
            Ok(request) => requests
                .lock()
                .map_err(|error| anyhow!("lock requests: {error}"))?
                .push(Recorded {
                    category: request.category(),
                    correlation_id: request.correlation_id(),
                    payload: request.payload_text(),
                }),
            Err(_) => return Ok(()),
        }
    }
}

fn accept(listener: &TcpListener) -> Result<Option<TcpStream>> {
    let deadline = Instant::now() + ACCEPT_DEADLINE;
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Ok(Some(stream)),
            Err(ref error)
                if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
            {
                thread::sleep(Duration::from_millis(10));
            }
            // The CLI may fail before connecting; finish without a client.
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error).context("accept connection"),
        }
    }
}
