//! Non-blocking command input over a channel fed by a reader thread.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use motorbench_traits::CommandSource;

/// Command source backed by a channel. Never blocks.
#[derive(Debug)]
pub struct ChannelCommands {
    rx: Receiver<String>,
    closed: bool,
}

impl ChannelCommands {
    pub fn new(rx: Receiver<String>) -> Self {
        Self { rx, closed: false }
    }
}

impl CommandSource for ChannelCommands {
    fn poll_line(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    tracing::debug!("command channel disconnected");
                }
                self.closed = true;
                None
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Spawn a thread that forwards each line of `input` into a channel and
/// return the receiving end. The thread exits at end of input, on a read
/// error, or when the receiver is dropped.
pub fn spawn_line_reader<I>(input: I) -> std::io::Result<(ChannelCommands, JoinHandle<()>)>
where
    I: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded::<String>();
    let handle = thread::Builder::new()
        .name("command-reader".into())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "command input read failed");
                        break;
                    }
                }
            }
        })?;
    Ok((ChannelCommands::new(rx), handle))
}
