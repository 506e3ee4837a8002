//! Server statistics
//!
//! Process-wide counters updated by the acceptor and the session tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct ServerStatistics {
    started_at: Instant,
    total_connections: AtomicU64,
    current_connections: AtomicU64,
    rejected_connections: AtomicU64,
    total_commands: AtomicU64,
    successful_logins: AtomicU64,
    failed_logins: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of the server counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub total_connections: u64,
    pub current_connections: u64,
    pub rejected_connections: u64,
    pub total_commands: u64,
    pub successful_logins: u64,
    pub failed_logins: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

impl Default for ServerStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStatistics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            current_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            total_commands: AtomicU64::new(0),
            successful_logins: AtomicU64::new(0),
            failed_logins: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.current_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        let _ = self
            .current_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_executed(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_succeeded(&self) {
        self.successful_logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.failed_logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            current_connections: self.current_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            total_commands: self.total_commands.load(Ordering::Relaxed),
            successful_logins: self.successful_logins.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Formats a duration as `HH:MM:SS`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Formats a byte count with a binary unit, e.g. `1.50 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FTP Server Statistics")?;
        writeln!(f, "Uptime: {}", format_uptime(self.uptime))?;
        writeln!(f, "Total Connections: {}", self.total_connections)?;
        writeln!(f, "Current Connections: {}", self.current_connections)?;
        writeln!(f, "Rejected Connections: {}", self.rejected_connections)?;
        writeln!(f, "Total Commands: {}", self.total_commands)?;
        writeln!(f, "Bytes Sent: {}", format_bytes(self.bytes_sent))?;
        writeln!(f, "Bytes Received: {}", format_bytes(self.bytes_received))?;
        writeln!(f, "Successful Logins: {}", self.successful_logins)?;
        writeln!(f, "Failed Logins: {}", self.failed_logins)?;
        write!(f, "Total Errors: {}", self.errors)?;

        let secs = self.uptime.as_secs();
        if secs > 0 {
            write!(
                f,
                "\nCommands per Second: {:.2}",
                self.total_commands as f64 / secs as f64
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 62)), "03:01:02");
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_counters_and_snapshot() {
        let stats = ServerStatistics::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.connection_rejected();
        stats.login_succeeded();
        stats.login_failed();
        stats.add_bytes_sent(10);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.current_connections, 1);
        assert_eq!(snapshot.rejected_connections, 1);
        assert_eq!(snapshot.successful_logins, 1);
        assert_eq!(snapshot.failed_logins, 1);
        assert_eq!(snapshot.bytes_sent, 10);
    }

    #[test]
    fn test_current_connections_never_underflows() {
        let stats = ServerStatistics::new();
        stats.connection_closed();
        assert_eq!(stats.snapshot().current_connections, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_includes_rate_once_running() {
        let stats = ServerStatistics::new();
        stats.command_executed();
        stats.command_executed();
        tokio::time::advance(Duration::from_secs(2)).await;

        let summary = stats.snapshot().to_string();
        assert!(summary.contains("Uptime: 00:00:02"));
        assert!(summary.contains("Total Commands: 2"));
        assert!(summary.contains("Commands per Second: 1.00"));
    }
}
