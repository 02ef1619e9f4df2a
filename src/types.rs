//! Type definitions shared across the measurement engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// A single progress update: percent complete plus an optional status line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: f64,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(percent: f64, message: Option<String>) -> Self {
        Self { percent, message }
    }
}

/// Sending half of a progress channel.
///
/// Operations take a `&ProgressSender` and never fail because the receiver went
/// away; a dropped receiver simply stops receiving updates.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSender {
    /// Create a connected sender/receiver pair
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sender that discards every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Report a bare percentage
    pub fn percent(&self, percent: f64) {
        self.send(ProgressEvent::new(percent, None));
    }

    /// Report a percentage with a status line
    pub fn status<S: Into<String>>(&self, percent: f64, message: S) {
        self.send(ProgressEvent::new(percent, Some(message.into())));
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// How echo probes are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// The operating system `ping` utility
    #[default]
    System,
    /// A TCP connect handshake timed from user space
    Tcp,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::System => write!(f, "system"),
            ProbeMethod::Tcp => write!(f, "tcp"),
        }
    }
}

impl FromStr for ProbeMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "system" | "icmp" => Ok(ProbeMethod::System),
            "tcp" => Ok(ProbeMethod::Tcp),
            other => Err(AppError::parse(format!("Unknown probe method '{}' (expected system or tcp)", other))),
        }
    }
}
