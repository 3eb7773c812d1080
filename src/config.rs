use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Line-oriented JSON sidecar serving academic analytics over stdin/stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "campusd", version)]
pub struct Cli {
    /// Workspace directory to open at startup (same as `workspace.select`).
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Default size of the recent-enrollments and course lists on the dashboard.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub recent_limit: u32,

    /// Days counted as "recent" when the dashboard request has no `since`.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=3650))]
    pub recent_window_days: u32,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    pub recent_limit: usize,
    pub recent_window_days: i64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            recent_window_days: 30,
        }
    }
}

impl Cli {
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            recent_limit: self.recent_limit as usize,
            recent_window_days: i64::from(self.recent_window_days),
        }
    }
}
