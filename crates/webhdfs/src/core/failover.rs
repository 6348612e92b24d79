//! Namenode failover.
//!
//! The client keeps one cursor into the configured host list. It is only a hint for
//! where the next attempt should go: concurrent operations may move it, and the last
//! writer wins. Each logical operation gets at most one failover retry.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::error::{Error, TransportErrorKind};

/// What a failed attempt tells the failover policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignal {
    /// The host could not be reached at all.
    ConnectionRefused,
    /// The host answered as an HA standby.
    Standby,
    /// Anything else; never triggers failover.
    Other,
}

impl FailureSignal {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::Transport(e) if e.kind == TransportErrorKind::ConnectionRefused => {
                FailureSignal::ConnectionRefused
            }
            Error::Remote(remote) if remote.is_standby() => FailureSignal::Standby,
            _ => FailureSignal::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Move to the next host and re-issue the operation.
    Failover,
    /// The retry budget is spent; report that no namenode is active.
    Exhausted,
    /// Surface the error unchanged.
    Terminal,
}

/// Failover policy, independent of any I/O.
pub fn decide(signal: FailureSignal, host_count: usize, attempt: Attempt) -> Verdict {
    match (signal, attempt) {
        (FailureSignal::Other, _) => Verdict::Terminal,
        _ if host_count < 2 => Verdict::Terminal,
        (_, Attempt::First) => Verdict::Failover,
        (_, Attempt::Retry) => Verdict::Exhausted,
    }
}

/// Shared cursor over the configured namenodes.
#[derive(Debug)]
pub struct HostRotator {
    host_count: usize,
    active:     AtomicUsize,
}

impl HostRotator {
    pub fn new(host_count: usize) -> Self {
        Self {
            host_count: host_count.max(1),
            active:     AtomicUsize::new(0),
        }
    }

    pub fn host_count(&self) -> usize { self.host_count }

    pub fn active(&self) -> usize { self.active.load(Ordering::Acquire) }

    /// Advance past `observed`, the host the caller saw fail, and return the host to use next.
    ///
    /// If another operation already moved the cursor away from `observed`, the cursor
    /// is left alone and its current value is returned.
    pub fn advance(&self, observed: usize) -> usize {
        let next = (observed + 1) % self.host_count;
        match self
            .active
            .compare_exchange(observed, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            Err(current) => current,
        }
    }
}

/// Per-operation failover state: `Active(i)` plus the retry budget.
#[derive(Debug)]
pub struct Failover<'a> {
    rotator:  &'a HostRotator,
    host:     usize,
    attempt:  Attempt,
    attempts: usize,
}

impl<'a> Failover<'a> {
    pub fn begin(rotator: &'a HostRotator) -> Self {
        Self {
            rotator,
            host: rotator.active(),
            attempt: Attempt::First,
            attempts: 1,
        }
    }

    /// Host index the current attempt should target.
    pub fn host(&self) -> usize { self.host }

    pub fn attempt(&self) -> Attempt { self.attempt }

    /// Feed a failed attempt into the state machine.
    ///
    /// `Ok(())` means the caller should re-issue the operation against [`Failover::host`].
    /// `Err` is the terminal error to surface.
    pub fn on_failure(&mut self, error: Error) -> Result<(), Error> {
        let signal = FailureSignal::of(&error);
        match decide(signal, self.rotator.host_count(), self.attempt) {
            Verdict::Failover => {
                let failed = self.host;
                self.host = self.rotator.advance(failed);
                self.attempt = Attempt::Retry;
                self.attempts += 1;
                warn!(
                    failed_host = failed,
                    next_host = self.host,
                    ?signal,
                    "namenode unavailable, failing over"
                );
                Ok(())
            }
            Verdict::Exhausted => Err(self.exhausted(error)),
            Verdict::Terminal => Err(error),
        }
    }

    /// Wrap the failure of the last permitted attempt as "no active namenode".
    pub fn exhausted(&self, error: Error) -> Error {
        Error::NoActiveNamenode {
            attempts: self.attempts,
            last:     Box::new(error),
        }
    }
}
