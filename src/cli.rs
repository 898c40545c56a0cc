use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};

use crate::domain::{Action, EventId, GuardianId, Role, Threshold};

/// Validates that threshold is at least 2
/// A threshold of 1 would let a single share recover the whole key
fn validate_threshold(s: &str) -> Result<Threshold, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    Threshold::new(value).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "paperlock")]
#[command(about = "Threshold key custody for exam papers")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// State file, overriding the config
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Outbox directory for notices, overriding the config
    #[arg(long, global = true)]
    pub outbox: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Role to act as: top-admin, paper-setter, guardian or exam-center; goes before the command
    #[arg(long = "as", required = true)]
    pub role: Role,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the guardian roster
    Guardian {
        #[command(subcommand)]
        command: GuardianCommand,
    },
    /// Publish encrypted questions
    Questions {
        #[command(subcommand)]
        command: QuestionsCommand,
    },
    /// Schedule and manage exams
    Exam {
        #[command(subcommand)]
        command: ExamCommand,
    },
    /// Submit a key share or check on a submission
    Share {
        #[command(subcommand)]
        command: ShareCommand,
    },
    /// Decode the exam paper
    Paper {
        #[command(subcommand)]
        command: PaperCommand,
    },
    /// Offline key splitting and recovery
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },
}

#[derive(Subcommand)]
pub enum GuardianCommand {
    /// Register a guardian
    Add {
        id: GuardianId,

        /// Where shares and notices are sent
        #[arg(long)]
        contact: String,
    },
    /// List the roster
    List,
    /// Guardians not yet holding a share
    Available,
}

#[derive(Subcommand)]
pub enum QuestionsCommand {
    /// Encrypt a JSON file of questions and send key shares to three guardians
    Publish {
        /// Name of the paper setter
        #[arg(long)]
        author: String,

        /// JSON array of {statement, options, correct_option}
        #[arg(long)]
        file: PathBuf,

        /// Exactly three guardian ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        guardians: Vec<GuardianId>,
    },
}

#[derive(Subcommand)]
pub enum ExamCommand {
    /// Schedule an exam over a fresh sample of the question pool
    Schedule {
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// HH:MM (UTC)
        #[arg(long)]
        start: NaiveTime,

        /// HH:MM (UTC)
        #[arg(long)]
        end: NaiveTime,
    },
    Start {
        id: EventId,
    },
    Complete {
        id: EventId,
    },
    Cancel {
        id: EventId,
    },
    /// Delete an exam; this also empties the whole question pool
    Delete {
        id: EventId,
    },
    /// Show the active exam
    Show,
}

#[derive(Subcommand)]
pub enum ShareCommand {
    /// Submit your key share for the active exam (read from stdin)
    Submit {
        #[arg(long)]
        guardian: GuardianId,
    },
    /// Whether you have submitted for the active exam
    Status {
        #[arg(long)]
        guardian: GuardianId,
    },
}

#[derive(Subcommand)]
pub enum PaperCommand {
    /// Decode the active exam now, ignoring the decode window
    Request,
    /// Show the decoded paper of the active exam
    Show,
    /// Run one pass of the periodic decoder
    Tick,
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Split a hex key from stdin into hex shares
    Split {
        /// Number of shares to create
        #[arg(short, long, default_value_t = 3)]
        shares: u8,

        /// Minimum number of shares needed to reconstruct (must be >= 2)
        #[arg(short, long, value_parser = validate_threshold, default_value = "2")]
        threshold: Threshold,

        /// Generate a fresh key instead of reading one
        #[arg(long)]
        generate: bool,
    },
    /// Rebuild a hex key from hex shares on stdin
    Combine {
        #[arg(short, long, value_parser = validate_threshold, default_value = "2")]
        threshold: Threshold,
    },
}

impl Commands {
    /// What the command needs permission for
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Commands::Guardian { command } => match command {
                GuardianCommand::Add { .. } => Action::ManageRoster,
                GuardianCommand::List => Action::ViewRoster,
                GuardianCommand::Available => Action::ListAvailableGuardians,
            },
            Commands::Questions { .. } => Action::PublishQuestions,
            Commands::Exam { command } => match command {
                ExamCommand::Schedule { .. } => Action::ScheduleExam,
                ExamCommand::Show => Action::ViewExam,
                ExamCommand::Start { .. }
                | ExamCommand::Complete { .. }
                | ExamCommand::Cancel { .. }
                | ExamCommand::Delete { .. } => Action::ManageExam,
            },
            Commands::Share { command } => match command {
                ShareCommand::Submit { .. } => Action::SubmitShare,
                ShareCommand::Status { .. } => Action::CheckShareStatus,
            },
            Commands::Paper { command } => match command {
                PaperCommand::Request => Action::RequestPaper,
                PaperCommand::Show => Action::ViewPaper,
                PaperCommand::Tick => Action::RunScheduler,
            },
            Commands::Key { .. } => Action::HandleKeys,
        }
    }
}
