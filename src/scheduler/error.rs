//! Failures collected while scheduling and flushing.

use std::{error::Error as StdError, fmt};

use thiserror::Error;

use super::PendingMessage;
use crate::{
    codec::MarshallingError,
    connection::NoMatchingTransport,
    metrics::{self, FailureKind},
    transport::TransportError,
};

/// Why one message could not be sent.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SendError {
    #[error(transparent)]
    NoMatchingTransport(#[from] NoMatchingTransport),
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SendError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::NoMatchingTransport(_) => FailureKind::NoTransport,
            Self::Marshalling(_) => FailureKind::Marshalling,
            Self::Transport(_) => FailureKind::Transport,
        }
    }

    /// Failing transport, for transport errors.
    #[must_use]
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Every message a schedule or flush call failed to send, grouped by cause.
///
/// Messages that fail for the same transport error share one entry.
#[derive(Debug, Default)]
pub struct CannotSendMessages {
    failures: Vec<(SendError, Vec<PendingMessage>)>,
}

impl CannotSendMessages {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Record `message` as failed with `error`.
    pub fn add(&mut self, error: SendError, message: PendingMessage) {
        self.add_all(error, vec![message]);
    }

    /// Record several messages failed with the same `error`.
    pub fn add_all(&mut self, error: SendError, messages: Vec<PendingMessage>) {
        if messages.is_empty() {
            return;
        }
        metrics::inc_send_failures(error.kind(), messages.len());
        self.push_grouped(error, messages);
    }

    fn push_grouped(&mut self, error: SendError, messages: Vec<PendingMessage>) {
        let existing = error.transport_error().and_then(|err| {
            self.failures
                .iter_mut()
                .find(|(other, _)| other.transport_error() == Some(err))
        });
        match existing {
            Some((_, bucket)) => bucket.extend(messages),
            None => self.failures.push((error, messages)),
        }
    }

    /// Whether anything failed.
    #[must_use]
    pub fn is_applicable(&self) -> bool { !self.failures.is_empty() }

    /// Total number of failed messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.failures.iter().map(|(_, messages)| messages.len()).sum()
    }

    /// Failures in the order they occurred.
    #[must_use]
    pub fn failures(&self) -> &[(SendError, Vec<PendingMessage>)] { &self.failures }

    /// Transport errors among the failures.
    pub fn transport_errors(&self) -> impl Iterator<Item = &TransportError> {
        self.failures
            .iter()
            .filter_map(|(error, _)| error.transport_error())
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        for (error, messages) in other.failures {
            self.push_grouped(error, messages);
        }
    }

    /// `Ok(())` when nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any message failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_applicable() { Err(self) } else { Ok(()) }
    }

    pub fn into_failures(self) -> Vec<(SendError, Vec<PendingMessage>)> { self.failures }
}

impl fmt::Display for CannotSendMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} message(s) could not be sent", self.message_count())?;
        for (error, messages) in &self.failures {
            write!(f, "; {error} ({} message(s))", messages.len())?;
        }
        Ok(())
    }
}

impl StdError for CannotSendMessages {}
