//! Capture session ownership and record encoding.
//!
//! A [`CaptureRecorder`] owns at most one open session at a time. Opening a
//! session truncates the sink; rows go out either as they arrive (streaming)
//! or in a single write at finalization (buffered). A session ended early keeps
//! whatever rows already reached the sink; only the next `open` truncates.

use motorbench_traits::RecordSink;
use serde::Serialize;

use crate::config::RecordCfg;
use crate::error::BenchError;
use crate::hw_error::map_storage_error;
use crate::profile::Direction;

/// One row of a capture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Milliseconds since the session started.
    pub elapsed_ms: u32,
    pub duty_percent: u8,
    pub rpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// `delta;pwm;rpm`
    #[default]
    Semicolon,
    /// `timestamp,PWM,RPM`
    Comma,
}

impl RecordFormat {
    pub fn header(self) -> [&'static str; 3] {
        match self {
            RecordFormat::Semicolon => ["delta", "pwm", "rpm"],
            RecordFormat::Comma => ["timestamp", "PWM", "RPM"],
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            RecordFormat::Semicolon => b';',
            RecordFormat::Comma => b',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// Every sample is written to the sink as it is appended.
    #[default]
    Streaming,
    /// Samples are held in memory and written once at finalization.
    Buffered,
}

/// Bookkeeping for the session currently being captured.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    start_ticks: u32,
    step_size: u8,
    direction: Direction,
    rows: usize,
    dropped: usize,
    last_elapsed_ms: u32,
    pending: Vec<Sample>,
}

impl CaptureSession {
    pub fn start_ticks(&self) -> u32 {
        self.start_ticks
    }

    pub fn step_size(&self) -> u8 {
        self.step_size
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Samples accepted so far (written or buffered).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Samples discarded because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Result of a finalized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub rows: usize,
    pub dropped: usize,
    pub step_size: u8,
    /// Elapsed time of the last recorded row.
    pub duration_ms: u32,
}

pub struct CaptureRecorder<R: RecordSink> {
    sink: R,
    cfg: RecordCfg,
    session: Option<CaptureSession>,
}

impl<R: RecordSink> core::fmt::Debug for CaptureRecorder<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureRecorder")
            .field("cfg", &self.cfg)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<R: RecordSink> CaptureRecorder<R> {
    pub fn new(sink: R, cfg: RecordCfg) -> Self {
        Self {
            sink,
            cfg,
            session: None,
        }
    }

    /// Start a new session, dropping any unfinished one. Truncates the sink.
    pub fn open(&mut self, step_size: u8, start_ticks: u32) -> Result<(), BenchError> {
        if self.session.take().is_some() {
            tracing::debug!("replacing unfinished capture session");
        }
        self.sink.truncate().map_err(|e| map_storage_error(&*e))?;
        if self.cfg.mode == RecordMode::Streaming {
            let header = self.encode(&[])?;
            self.sink.append(&header).map_err(|e| map_storage_error(&*e))?;
        }
        let pending = match self.cfg.mode {
            RecordMode::Streaming => Vec::new(),
            RecordMode::Buffered => Vec::with_capacity(self.cfg.max_samples.min(1024)),
        };
        self.session = Some(CaptureSession {
            start_ticks,
            step_size,
            direction: Direction::Ascending,
            rows: 0,
            dropped: 0,
            last_elapsed_ms: 0,
            pending,
        });
        Ok(())
    }

    /// Add one sample to the open session. A no-op without a session.
    pub fn append(&mut self, sample: Sample) -> Result<(), BenchError> {
        let mode = self.cfg.mode;
        let max_samples = self.cfg.max_samples;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        match mode {
            RecordMode::Streaming => {
                let row = encode_rows(self.cfg.format, false, &[sample])?;
                self.sink.append(&row).map_err(|e| map_storage_error(&*e))?;
            }
            RecordMode::Buffered => {
                if session.pending.len() >= max_samples {
                    if session.dropped == 0 {
                        tracing::warn!(max_samples, "capture buffer full; dropping samples");
                    }
                    session.dropped += 1;
                    return Ok(());
                }
                session.pending.push(sample);
            }
        }
        session.rows += 1;
        session.last_elapsed_ms = sample.elapsed_ms;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Direction) {
        if let Some(session) = self.session.as_mut() {
            session.direction = direction;
        }
    }

    /// Write out (buffered mode) and close the session.
    pub fn finalize(&mut self) -> Result<CaptureSummary, BenchError> {
        let Some(session) = self.session.take() else {
            return Err(BenchError::StorageWrite("no open capture session".into()));
        };
        if self.cfg.mode == RecordMode::Buffered {
            let body = encode_rows(self.cfg.format, true, &session.pending)?;
            self.sink.append(&body).map_err(|e| map_storage_error(&*e))?;
        }
        self.sink.close().map_err(|e| map_storage_error(&*e))?;
        Ok(CaptureSummary {
            rows: session.rows,
            dropped: session.dropped,
            step_size: session.step_size,
            duration_ms: session.last_elapsed_ms,
        })
    }

    /// End the open session without finalizing it and close the sink. Rows
    /// already streamed stay on the record; buffered rows are dropped. Best
    /// effort: sink errors are logged, not returned.
    pub fn close_unfinished(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::debug!(
            rows = session.rows,
            unwritten = session.pending.len(),
            "unfinished capture session closed"
        );
        if let Err(e) = self.sink.close() {
            tracing::warn!(error = %e, "could not close unfinished record");
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn cfg(&self) -> &RecordCfg {
        &self.cfg
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    fn encode(&self, rows: &[Sample]) -> Result<Vec<u8>, BenchError> {
        encode_rows(self.cfg.format, true, rows)
    }
}

/// Encode `rows` (optionally preceded by the header) as delimited text.
pub fn encode_rows(
    format: RecordFormat,
    with_header: bool,
    rows: &[Sample],
) -> Result<Vec<u8>, BenchError> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(16 * (rows.len() + 1)));
    if with_header {
        w.write_record(format.header())
            .map_err(|e| BenchError::StorageWrite(e.to_string()))?;
    }
    for row in rows {
        w.serialize(row)
            .map_err(|e| BenchError::StorageWrite(e.to_string()))?;
    }
    w.into_inner()
        .map_err(|e| BenchError::StorageWrite(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemorySink;
    use rstest::rstest;

    fn sample(elapsed_ms: u32, duty_percent: u8, rpm: u32) -> Sample {
        Sample {
            elapsed_ms,
            duty_percent,
            rpm,
        }
    }

    fn cfg(format: RecordFormat, mode: RecordMode, max_samples: usize) -> RecordCfg {
        RecordCfg {
            format,
            mode,
            max_samples,
        }
    }

    #[rstest]
    #[case(RecordFormat::Semicolon, "delta;pwm;rpm\n0;0;0\n4;20;1500\n")]
    #[case(RecordFormat::Comma, "timestamp,PWM,RPM\n0,0,0\n4,20,1500\n")]
    fn streaming_writes_header_then_rows(#[case] format: RecordFormat, #[case] expected: &str) {
        let mut rec = CaptureRecorder::new(
            MemorySink::default(),
            cfg(format, RecordMode::Streaming, 10),
        );
        rec.open(20, 0).unwrap();
        rec.append(sample(0, 0, 0)).unwrap();
        rec.append(sample(4, 20, 1500)).unwrap();
        let summary = rec.finalize().unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.duration_ms, 4);
        assert_eq!(rec.sink().text(), expected);
        assert!(rec.sink().closed());
    }

    #[test]
    fn buffered_writes_nothing_until_finalize() {
        let mut rec = CaptureRecorder::new(
            MemorySink::default(),
            cfg(RecordFormat::Semicolon, RecordMode::Buffered, 10),
        );
        rec.open(20, 0).unwrap();
        rec.append(sample(0, 0, 0)).unwrap();
        assert_eq!(rec.sink().text(), "");
        rec.finalize().unwrap();
        assert_eq!(rec.sink().text(), "delta;pwm;rpm\n0;0;0\n");
    }

    #[test]
    fn buffered_caps_at_max_samples() {
        let mut rec = CaptureRecorder::new(
            MemorySink::default(),
            cfg(RecordFormat::Semicolon, RecordMode::Buffered, 3),
        );
        rec.open(20, 0).unwrap();
        for i in 0..5 {
            rec.append(sample(i * 4, 0, 0)).unwrap();
        }
        let summary = rec.finalize().unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.dropped, 2);
        assert_eq!(rec.sink().text().lines().count(), 4);
    }

    #[test]
    fn reopen_truncates_previous_record() {
        let mut rec = CaptureRecorder::new(MemorySink::default(), RecordCfg::default());
        rec.open(20, 0).unwrap();
        rec.append(sample(0, 0, 10)).unwrap();
        rec.open(30, 100).unwrap();
        assert_eq!(rec.sink().truncations(), 2);
        assert_eq!(rec.sink().text(), "delta;pwm;rpm\n");
        assert_eq!(rec.session().map(CaptureSession::step_size), Some(30));
    }

    #[test]
    fn unfinished_close_keeps_streamed_rows() {
        let mut rec = CaptureRecorder::new(MemorySink::default(), RecordCfg::default());
        rec.open(20, 0).unwrap();
        rec.append(sample(0, 0, 10)).unwrap();
        rec.close_unfinished();
        assert!(!rec.is_active());
        assert!(rec.sink().closed());
        assert_eq!(rec.sink().truncations(), 1);
        assert_eq!(rec.sink().text(), "delta;pwm;rpm\n0;0;10\n");
        assert!(rec.finalize().is_err());
    }

    #[test]
    fn append_failure_is_storage_error() {
        let mut rec = CaptureRecorder::new(MemorySink::default(), RecordCfg::default());
        rec.open(20, 0).unwrap();
        rec.sink_mut().fail_now("card removed");
        match rec.append(sample(0, 0, 0)) {
            Err(BenchError::StorageWrite(msg)) => assert!(msg.contains("card removed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_without_session_is_ignored() {
        let mut rec = CaptureRecorder::new(MemorySink::default(), RecordCfg::default());
        rec.append(sample(0, 0, 0)).unwrap();
        assert_eq!(rec.sink().text(), "");
    }
}
