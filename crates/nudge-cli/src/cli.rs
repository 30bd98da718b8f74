use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use nudge_core::models::{AppMode, Priority};

#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Reminders that follow you between devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule a new reminder
    #[command(alias = "new")]
    Add {
        /// Reminder title
        title: Vec<String>,
        /// When it is due: RFC 3339, "YYYY-MM-DD HH:MM" (local), or +30m/+2h/+1d
        #[arg(long, value_name = "WHEN", default_value = "+1h")]
        at: String,
        #[command(flatten)]
        fields: ReminderFields,
    },
    /// List reminders ordered by due time
    List {
        /// Include completed reminders
        #[arg(short, long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Complete a reminder (repeating reminders move to their next occurrence)
    Done {
        /// Reminder ID or unique ID prefix
        id: String,
    },
    /// Edit an existing reminder
    Edit {
        /// Reminder ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New due time
        #[arg(long, value_name = "WHEN")]
        at: Option<String>,
        /// Stop repeating
        #[arg(long, conflicts_with = "repeat")]
        no_repeat: bool,
        #[command(flatten)]
        fields: ReminderFields,
    },
    /// Delete a reminder and its attachments
    Delete {
        /// Reminder ID or unique ID prefix
        id: String,
    },
    /// Show or switch the reminder mode (standard, adhd, memory, work)
    Mode {
        /// Mode to switch to; prints the current mode when omitted
        mode: Option<AppMode>,
    },
    /// Manage sync with your account
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Sign in to sync reminders
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Optional reminder fields shared by `add` and `edit`.
#[derive(Args, Debug, Default)]
pub struct ReminderFields {
    /// Longer description
    #[arg(long)]
    pub body: Option<String>,
    /// Repeat interval in minutes
    #[arg(long, value_name = "MINUTES")]
    pub repeat: Option<u32>,
    /// Category or project label
    #[arg(long)]
    pub category: Option<String>,
    /// Priority: low, medium or high
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Attach a photo (uploaded on the next push)
    #[arg(long, value_name = "PATH")]
    pub photo: Option<PathBuf>,
    /// Attach a voice note (uploaded on the next push)
    #[arg(long, value_name = "PATH")]
    pub voice: Option<PathBuf>,
}

impl ReminderFields {
    pub const fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.repeat.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.photo.is_none()
            && self.voice.is_none()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show sync configuration, sign-in and local store state
    Status,
    /// Turn sync on and push existing local reminders
    Enable,
    /// Turn sync off; reminders stay on this device
    Disable,
    /// Push every local reminder to your account
    Push,
    /// Apply remote changes as they arrive (Ctrl-C to stop)
    Watch,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Create the account instead of signing in
        #[arg(long)]
        sign_up: bool,
    },
    /// Show the signed-in account
    Status,
    /// Forget the stored session
    Logout,
}
