use std::fmt;
use std::sync::Arc;

/// Phases of a streaming transfer.
///
/// A transfer moves Connecting → Redirected → Streaming → Completed. A failover
/// passes through Retrying and starts again from Connecting against the next host.
/// Failed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    /// First hop in flight against the namenode.
    #[default]
    Connecting,

    /// The namenode pointed us at a datanode.
    Redirected,

    /// The active namenode changed and the transfer is being re-issued.
    Retrying,

    /// Payload bytes are moving.
    Streaming,

    Completed,

    Failed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Connecting => write!(f, "Connecting"),
            TransferPhase::Redirected => write!(f, "Redirected"),
            TransferPhase::Retrying => write!(f, "Retrying"),
            TransferPhase::Streaming => write!(f, "Streaming"),
            TransferPhase::Completed => write!(f, "Completed"),
            TransferPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase:             TransferPhase,
    pub bytes_transferred: u64,
    pub retry_count:       u32,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Accumulates transfer state and forwards it to an optional callback.
pub(crate) struct ProgressTracker {
    callback:          Option<ProgressCallback>,
    phase:             TransferPhase,
    bytes_transferred: u64,
    retry_count:       u32,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            phase: TransferPhase::Connecting,
            bytes_transferred: 0,
            retry_count: 0,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: TransferPhase) {
        if phase == TransferPhase::Retrying {
            self.retry_count += 1;
        }
        self.phase = phase;
        self.emit();
    }

    pub(crate) fn add_bytes(&mut self, bytes: u64) {
        self.bytes_transferred += bytes;
        self.phase = TransferPhase::Streaming;
        self.emit();
    }

    pub(crate) fn bytes_transferred(&self) -> u64 { self.bytes_transferred }

    fn emit(&self) {
        if let Some(ref callback) = self.callback {
            callback(&Progress {
                phase:             self.phase,
                bytes_transferred: self.bytes_transferred,
                retry_count:       self.retry_count,
            });
        }
    }
}
