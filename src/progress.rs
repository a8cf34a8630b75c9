//! Progress sink: operator-facing output of commands and consumers.
//!
//! Infrastructure commands report one line per resource; consumers report
//! one [`ConsumedLine`] per message. [`ConsoleProgress`] prints to stdout,
//! [`BufferedProgress`] keeps plain lines for inspection.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Outcome of one consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    Consumed,
    Rejected,
}

impl ConsumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumeStatus::Consumed => "Consumed",
            ConsumeStatus::Rejected => "Rejected",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            ConsumeStatus::Consumed => "32",
            ConsumeStatus::Rejected => "31",
        }
    }
}

/// A consumer's per-message report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedLine {
    pub status: ConsumeStatus,
    pub event_name: String,
    pub elapsed: Duration,
    pub memory_mb: Option<u64>,
}

impl ConsumedLine {
    pub fn new(status: ConsumeStatus, event_name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status,
            event_name: event_name.into(),
            elapsed,
            memory_mb: resident_memory_mb(),
        }
    }

    fn stats(&self) -> String {
        match self.memory_mb {
            Some(mb) => format!("{} | {} MB", format_elapsed(self.elapsed), mb),
            None => format_elapsed(self.elapsed),
        }
    }
}

impl fmt::Display for ConsumedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.status.as_str(), self.event_name, self.stats())
    }
}

/// `"1.23 ms"` below one second, `"1.23 s"` from there on.
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{:.2} ms", elapsed.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2} s", elapsed.as_secs_f64())
    }
}

/// Resident set size of this process in MB, where the platform exposes it.
pub fn resident_memory_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb / 1000)
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Where commands and consumers report what they did.
pub trait Progress: Send + Sync {
    /// A section header, such as the start or end of a command.
    fn header(&self, message: &str);

    /// A single resource outcome.
    fn line(&self, message: &str);

    fn consumed(&self, line: &ConsumedLine);
}

/// Prints to stdout with ANSI colors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    pub fn new() -> Self {
        Self
    }
}

impl Progress for ConsoleProgress {
    fn header(&self, message: &str) {
        println!("\x1b[01;34m>\x1b[0m {message}");
    }

    fn line(&self, message: &str) {
        println!("  {message}");
    }

    fn consumed(&self, line: &ConsumedLine) {
        println!(
            "\x1b[01;{}m{}\x1b[0m {} (\x1b[00;37m{}\x1b[0m)",
            line.status.color(),
            line.status.as_str(),
            line.event_name,
            line.stats()
        );
    }
}

/// Collects plain, uncolored lines.
#[derive(Debug, Default, Clone)]
pub struct BufferedProgress {
    buffer: Arc<Mutex<Vec<String>>>,
}

impl BufferedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        Self { buffer }
    }

    /// Snapshot of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines starting with `prefix`.
    pub fn lines_starting_with(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    fn push(&self, line: String) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

impl Progress for BufferedProgress {
    fn header(&self, message: &str) {
        self.push(message.to_string());
    }

    fn line(&self, message: &str) {
        self.push(message.to_string());
    }

    fn consumed(&self, line: &ConsumedLine) {
        self.push(line.to_string());
    }
}
