//! Background rendering of report records.
//!
//! Callers enqueue immutable snapshots and move on; a dedicated thread renders
//! each record exactly once, in the order it was enqueued.

use crate::effective::EffectiveSettings;
use crate::report;
use crate::settings::RequestedSettings;
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub enum ReportRecord {
    RequestedSettings(Box<RequestedSettings>),
    EffectiveSettings(Box<EffectiveSettings>),
    AllSettings(Box<EffectiveSettings>),
    Summary(Box<EffectiveSettings>),
    Error {
        message: String,
        requested: f64,
        substituted: f64,
    },
}

impl ReportRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestedSettings(_) => "requested_settings",
            Self::EffectiveSettings(_) => "effective_settings",
            Self::AllSettings(_) => "all_settings",
            Self::Summary(_) => "summary",
            Self::Error { .. } => "error",
        }
    }
}

enum Message {
    Record(ReportRecord),
    Shutdown,
}

/// Sending side of a [`Reporter`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReportHandle {
    sender: Option<Sender<Message>>,
}

impl ReportHandle {
    /// A handle that drops every record.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn enqueue(&self, record: ReportRecord) {
        let Some(sender) = &self.sender else {
            return;
        };
        let sent = sender.send(Message::Record(record));
        if let Err(mpsc::SendError(Message::Record(record))) = sent {
            tracing::debug!(kind = record.kind(), "reporter closed; record dropped");
        }
    }

    pub fn requested_settings(&self, settings: &RequestedSettings) {
        self.enqueue(ReportRecord::RequestedSettings(Box::new(*settings)));
    }

    pub fn effective_settings(&self, settings: &EffectiveSettings) {
        self.enqueue(ReportRecord::EffectiveSettings(Box::new(*settings)));
    }

    /// Effective block followed by the requested block it was derived from.
    pub fn all_settings(&self, settings: &EffectiveSettings) {
        self.enqueue(ReportRecord::AllSettings(Box::new(*settings)));
    }

    pub fn summary(&self, settings: &EffectiveSettings) {
        self.enqueue(ReportRecord::Summary(Box::new(*settings)));
    }

    pub fn error(&self, message: impl Into<String>, requested: f64, substituted: f64) {
        self.enqueue(ReportRecord::Error {
            message: message.into(),
            requested,
            substituted,
        });
    }
}

pub struct Reporter {
    sender: Sender<Message>,
    worker: Option<JoinHandle<io::Result<()>>>,
}

impl Reporter {
    /// Starts the rendering thread. Detail records go to `detail`, summary
    /// records to `summary`.
    pub fn spawn<D, S>(detail: D, summary: S) -> io::Result<Self>
    where
        D: Write + Send + 'static,
        S: Write + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("loadgen-report".to_string())
            .spawn(move || drain(receiver, detail, summary))?;
        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> ReportHandle {
        ReportHandle {
            sender: Some(self.sender.clone()),
        }
    }

    /// Waits until every record enqueued before this call has been rendered,
    /// then stops the thread. Records enqueued afterwards are dropped.
    pub fn finish(mut self) -> io::Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> io::Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = self.sender.send(Message::Shutdown);
        worker
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "report thread panicked"))?
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "report thread ended with an error");
        }
    }
}

fn drain<D: Write, S: Write>(
    receiver: Receiver<Message>,
    mut detail: D,
    mut summary: S,
) -> io::Result<()> {
    let mut first_error: Option<io::Error> = None;
    for message in receiver {
        let record = match message {
            Message::Record(record) => record,
            Message::Shutdown => break,
        };
        let kind = record.kind();
        let rendered = match &record {
            ReportRecord::RequestedSettings(s) => report::write_requested_settings(s, &mut detail),
            ReportRecord::EffectiveSettings(s) => report::write_effective_settings(s, &mut detail),
            ReportRecord::AllSettings(s) => report::write_all_settings(s, &mut detail),
            ReportRecord::Summary(s) => report::write_summary(s, &mut summary),
            ReportRecord::Error {
                message,
                requested,
                substituted,
            } => report::write_error(message, *requested, *substituted, &mut detail),
        };
        match rendered {
            Ok(()) => tracing::trace!(kind, "report record rendered"),
            Err(e) => {
                tracing::error!(kind, error = %e, "failed to render report record");
                first_error.get_or_insert(e);
            }
        }
    }
    let flushed = detail.flush().and(summary.flush());
    match first_error {
        Some(e) => Err(e),
        None => flushed,
    }
}
