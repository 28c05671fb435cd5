//! Error ring and Markdown diagnostic report.

use crate::relay::TargetStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// One logged error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    /// Short category, e.g. `Processing Error`.
    pub kind: String,
    pub message: String,
}

/// The most recent errors, oldest first.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    limit: usize,
    entries: VecDeque<ErrorRecord>,
}

impl ErrorLog {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: VecDeque::with_capacity(limit),
        }
    }

    /// Append an error, dropping the oldest past the limit.
    pub fn record(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        let entry = ErrorRecord {
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
        };
        tracing::error!(kind = %entry.kind, message = %entry.message, "error recorded");
        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the report. `target` is `None` when the relay did not answer.
    #[must_use]
    pub fn report(&self, target: Option<TargetStatus>) -> String {
        let mut out = String::from("### System Diagnostic Report\n\n");
        let _ = writeln!(
            out,
            "**Time:** {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let _ = writeln!(
            out,
            "**Host:** autobridge {} ({}/{})\n",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        out.push_str("#### Recent Errors:\n");
        if self.entries.is_empty() {
            out.push_str("No errors caught.\n");
        }
        for e in &self.entries {
            let _ = writeln!(
                out,
                "- [{}] {} ({})",
                e.kind,
                e.message,
                e.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
        }

        out.push_str("\n#### Relay Health Check:\n");
        match target {
            None => out.push_str("- Relay: ❌ NOT RESPONDING\n"),
            Some(status) => {
                out.push_str("- Relay: ✅ Running\n");
                match status.surface {
                    Some(kind) if status.open => {
                        let _ = writeln!(out, "- Target surface: ✅ {}", kind.display_name());
                    }
                    _ => out.push_str("- Target surface: ❌ MISSING\n"),
                }
            }
        }
        out
    }
}
