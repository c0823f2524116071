//! Recording engine double with hooks for concurrency assertions.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lintbridge_config::Config;
use lintbridge_protocol::Finding;

use crate::bootstrap::EngineProvider;
use crate::engine::{AnalysisEngine, EngineError, EngineOutput, EngineRequest};

/// Shared view of everything a [`RecordingEngine`] saw.
#[derive(Debug, Default)]
pub struct EngineRecorder {
    requests: Mutex<Vec<EngineRequest>>,
    findings: Mutex<Vec<Finding>>,
    log_messages: Mutex<Vec<String>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    fail_start: AtomicBool,
    fail_analysis: AtomicBool,
    delay_ms: AtomicU64,
}

impl EngineRecorder {
    /// Findings returned by every later analysis.
    pub fn set_findings(&self, findings: Vec<Finding>) {
        *self.findings.lock().expect("findings lock") = findings;
    }

    /// Log lines returned by every later analysis.
    pub fn set_log_messages(&self, messages: Vec<String>) {
        *self.log_messages.lock().expect("log lock") = messages;
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_analysis(&self) {
        self.fail_analysis.store(true, Ordering::SeqCst);
    }

    /// Makes every analysis take at least `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).expect("delay fits u64");
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    #[must_use]
    pub fn analysis_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Most analyses ever observed running at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Engine that records requests and replays scripted findings.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    recorder: Arc<EngineRecorder>,
}

impl RecordingEngine {
    #[must_use]
    pub fn new() -> (Self, Arc<EngineRecorder>) {
        let recorder = Arc::new(EngineRecorder::default());
        (
            Self {
                recorder: Arc::clone(&recorder),
            },
            recorder,
        )
    }
}

impl AnalysisEngine for RecordingEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.recorder.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::NotConfigured);
        }
        self.recorder.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn analyze(&mut self, request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        let running = self.recorder.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.peak.fetch_max(running, Ordering::SeqCst);
        let delay = self.recorder.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        self.recorder
            .requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.recorder.running.fetch_sub(1, Ordering::SeqCst);

        if self.recorder.fail_analysis.load(Ordering::SeqCst) {
            return Err(EngineError::Exit {
                command: String::from("recording-engine"),
                status: String::from("exit status: 3"),
            });
        }
        Ok(EngineOutput {
            findings: self.recorder.findings.lock().expect("findings lock").clone(),
            log_messages: self.recorder.log_messages.lock().expect("log lock").clone(),
        })
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.recorder.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider handing out one shared [`RecordingEngine`].
#[derive(Debug, Clone)]
pub struct RecordingEngineProvider {
    engine: RecordingEngine,
}

impl RecordingEngineProvider {
    #[must_use]
    pub fn new() -> (Self, Arc<EngineRecorder>) {
        let (engine, recorder) = RecordingEngine::new();
        (Self { engine }, recorder)
    }
}

impl EngineProvider for RecordingEngineProvider {
    fn provide(&self, _config: &Config) -> Box<dyn AnalysisEngine> {
        Box::new(self.engine.clone())
    }
}
