//! In-memory collaborators for tests, benches and dry runs.

use std::collections::VecDeque;

use motorbench_traits::{BoxError, CommandSource, DutyActuator, Operator, RecordSink};

/// Actuator that remembers every duty it was given.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    history: Vec<u8>,
    fail_next: Option<String>,
}

impl RecordingActuator {
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    pub fn current(&self) -> Option<u8> {
        self.history.last().copied()
    }

    /// Make the next `set_duty` fail with `msg`.
    pub fn fail_next(&mut self, msg: &str) {
        self.fail_next = Some(msg.to_string());
    }
}

impl DutyActuator for RecordingActuator {
    fn set_duty(&mut self, percent: u8) -> Result<(), BoxError> {
        if let Some(msg) = self.fail_next.take() {
            return Err(msg.into());
        }
        self.history.push(percent);
        Ok(())
    }
}

/// Record sink backed by a byte vector, with failure injection.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    truncations: usize,
    appends: usize,
    closed: bool,
    fail_appends_after: Option<(usize, String)>,
    fail_truncate: Option<String>,
}

impl MemorySink {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn truncations(&self) -> usize {
        self.truncations
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Every following append fails.
    pub fn fail_now(&mut self, msg: &str) {
        self.fail_appends_after = Some((self.appends, msg.to_string()));
    }

    /// Appends fail once `n` more have succeeded.
    pub fn fail_after(&mut self, n: usize, msg: &str) {
        self.fail_appends_after = Some((self.appends + n, msg.to_string()));
    }

    /// The next truncate fails (e.g. the medium cannot be opened).
    pub fn fail_truncate(&mut self, msg: &str) {
        self.fail_truncate = Some(msg.to_string());
    }

    /// Clear injected failures.
    pub fn heal(&mut self) {
        self.fail_appends_after = None;
        self.fail_truncate = None;
    }
}

impl RecordSink for MemorySink {
    fn truncate(&mut self) -> Result<(), BoxError> {
        if let Some(msg) = self.fail_truncate.take() {
            return Err(msg.into());
        }
        self.data.clear();
        self.truncations += 1;
        self.closed = false;
        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        if let Some((limit, msg)) = &self.fail_appends_after
            && self.appends >= *limit
        {
            return Err(msg.clone().into());
        }
        self.data.extend_from_slice(bytes);
        self.appends += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.closed = true;
        Ok(())
    }
}

/// Operator channel that keeps everything it was told.
#[derive(Debug, Default)]
pub struct CollectingOperator {
    pub reports: Vec<(u8, u32)>,
    pub notices: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl Operator for CollectingOperator {
    fn report(&mut self, duty_percent: u8, rpm: u32) {
        self.reports.push((duty_percent, rpm));
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn diagnostic(&mut self, message: &str) {
        self.diagnostics.push(message.to_string());
    }
}

/// Command source replaying a fixed script, one line per poll.
#[derive(Debug, Default)]
pub struct ScriptedCommands {
    lines: VecDeque<String>,
}

impl ScriptedCommands {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl CommandSource for ScriptedCommands {
    fn poll_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// An exhausted script behaves like end of input.
    fn is_closed(&self) -> bool {
        self.lines.is_empty()
    }
}
