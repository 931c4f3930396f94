use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rentdesk_core::Collection;

#[derive(Parser)]
#[command(name = "rentdesk")]
#[command(about = "Run the rental back office from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for backend and auth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Customer consultations inbox
    #[command(alias = "c")]
    Consultations {
        #[command(subcommand)]
        command: ConsultationCommands,
    },
    /// Reservation requests inbox
    #[command(alias = "r")]
    Reservations {
        #[command(subcommand)]
        command: ReservationCommands,
    },
    /// Fleet vehicles
    Vehicles {
        #[command(subcommand)]
        command: VehicleCommands,
    },
    /// Vehicle models
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Show unread counts for both inboxes
    Unread {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow an inbox live until interrupted
    Watch {
        /// Inbox to follow
        #[arg(value_enum)]
        inbox: WatchTarget,
        #[command(flatten)]
        range: RangeArgs,
        /// Seconds to wait for the push channel before polling
        #[arg(long, value_name = "SECS")]
        guard_secs: Option<u64>,
        /// Seconds between polls while polling
        #[arg(long, value_name = "SECS")]
        poll_secs: Option<u64>,
        /// Emit one JSON object per change
        #[arg(long)]
        json: bool,
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
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum WatchTarget {
    Consultations,
    Reservations,
}

impl WatchTarget {
    pub const fn collection(self) -> Collection {
        match self {
            Self::Consultations => Collection::Consultations,
            Self::Reservations => Collection::Reservations,
        }
    }
}

/// Creation-date window, as `YYYY-MM-DD` or RFC 3339
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeArgs {
    /// Earliest creation date (inclusive)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,
    /// Latest creation date (inclusive)
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    #[command(flatten)]
    pub range: RangeArgs,
    /// Only rows nobody has read yet
    #[arg(long)]
    pub unread: bool,
    /// Number of rows to show
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ConsultationCommands {
    /// List consultations, newest first
    List(ListArgs),
    /// Show one consultation
    Show {
        /// Consultation ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a consultation as read
    Read {
        /// Consultation ID
        id: String,
    },
    /// Change the workflow status
    Status {
        /// Consultation ID
        id: String,
        /// pending, in_progress, completed or cancelled
        status: String,
    },
    /// Delete a consultation
    Delete {
        /// Consultation ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReservationCommands {
    /// List reservations, newest first
    List(ListArgs),
    /// Show one reservation
    Show {
        /// Reservation ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a reservation as read
    Read {
        /// Reservation ID
        id: String,
    },
    /// Change the booking status
    Status {
        /// Reservation ID
        id: String,
        /// pending, confirmed, active, completed or cancelled
        status: String,
    },
    /// Delete a reservation
    Delete {
        /// Reservation ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum VehicleCommands {
    /// List fleet vehicles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload a new image for a vehicle, or clear it
    Image {
        /// Vehicle ID
        id: String,
        /// Image file to upload
        #[arg(value_name = "PATH", required_unless_present = "clear")]
        path: Option<PathBuf>,
        /// Remove the current image instead
        #[arg(long, conflicts_with = "path")]
        clear: bool,
    },
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List vehicle models
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Storage bucket holding fleet images
        #[arg(long, value_name = "BUCKET")]
        storage_bucket: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Operator account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Operator account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
