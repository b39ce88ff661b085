use crate::models::User;
use crate::sync::SyncState;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;

/// Colored status lines on stderr; stdout is reserved for `-` outputs.
pub struct ConsoleReport;

impl ConsoleReport {
    fn line(color: Color, text: String) -> io::Result<()> {
        execute!(
            io::stderr(),
            SetForegroundColor(color),
            Print(format!("{}\n", text)),
            ResetColor
        )
    }

    /// Operation header, e.g. "Downloading Users"
    pub fn heading(text: &str) -> io::Result<()> {
        Self::line(Color::White, format!("⏳ {}", text))
    }

    pub fn added(user: &User) -> io::Result<()> {
        Self::line(Color::Green, format!("  ✓ {} ({})", user.name, user.phone))
    }

    pub fn failed(user: &User, reason: &str) -> io::Result<()> {
        Self::line(Color::Red, format!("  ✗ {} ({}): {}", user.name, user.phone, reason))
    }

    pub fn done(text: &str) -> io::Result<()> {
        Self::line(Color::DarkGrey, format!("✓ {}", text))
    }

    pub fn warning(text: &str) -> io::Result<()> {
        Self::line(Color::Yellow, format!("⚠ {}", text))
    }
}

/// Progress bar fed from the sync poller's state changes.
pub struct SyncProgress {
    bar: ProgressBar,
}

impl SyncProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("Synchronizing...");
        Self { bar }
    }

    pub fn update(&self, state: &SyncState) {
        match state {
            SyncState::Triggered => self.bar.set_message("started"),
            SyncState::Polling(status) => {
                self.bar.set_position(u64::from(status.percentage.min(100)));
                self.bar.set_message(status.state_string.clone());
            }
            SyncState::Done => self.bar.finish_with_message("done"),
            SyncState::TimedOut => self.bar.abandon_with_message("still running on the device"),
        }
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}
