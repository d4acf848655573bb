use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "gmailctl", version, about = "Search, send, and manage Gmail from the command line", long_about = None)]
pub struct Cli {
    /// Output as JSON instead of Markdown.
    #[clap(long, global = true)]
    pub json: bool,

    /// Credentials directory (default: ~/.gmail_credentials).
    #[clap(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check setup status
    Setup,
    /// Authenticate with Gmail
    Auth {
        /// Manual auth for headless/remote servers (paste the redirect URL)
        #[clap(long)]
        manual: bool,
    },
    /// View or change the API scope
    Scope {
        /// Set a new scope: readonly, modify, or full
        #[clap(long, value_name = "NAME")]
        set: Option<String>,
    },
    /// Search emails
    Search {
        /// Search query (Gmail syntax)
        #[clap(default_value = "")]
        query: String,
        /// Filter by sender
        #[clap(long)]
        from: Option<String>,
        /// Filter by recipient
        #[clap(long)]
        to: Option<String>,
        /// Filter by subject
        #[clap(long)]
        subject: Option<String>,
        /// Filter by label
        #[clap(long)]
        label: Option<String>,
        /// Messages after date (YYYY/MM/DD)
        #[clap(long)]
        after: Option<String>,
        /// Messages before date (YYYY/MM/DD)
        #[clap(long)]
        before: Option<String>,
        /// Only messages with attachments
        #[clap(long)]
        has_attachment: bool,
        /// Only unread messages
        #[clap(long)]
        unread: bool,
        /// Only starred messages
        #[clap(long)]
        starred: bool,
        /// Max results
        #[clap(long, default_value_t = 20)]
        limit: u32,
        /// Include the full message body
        #[clap(long)]
        full: bool,
        /// Include attachment info
        #[clap(long)]
        attachments: bool,
    },
    /// Download attachments from a message
    Download {
        /// Message ID
        message_id: String,
        /// Output directory (default: ~/Downloads/gmail_attachments)
        #[clap(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// List labels
    Labels,
    /// Send an email
    Send(ComposeArgs),
    /// Create an email draft
    Draft(ComposeArgs),
    /// Reply to an email
    Reply {
        /// Message ID to reply to
        message_id: String,
        /// Reply body
        #[clap(long)]
        body: String,
        /// Body is HTML (default: plain text)
        #[clap(long)]
        html: bool,
    },
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Recipient email address
    #[clap(long)]
    pub to: String,
    /// Email subject
    #[clap(long)]
    pub subject: String,
    /// Email body
    #[clap(long)]
    pub body: String,
    /// CC recipients (comma-separated)
    #[clap(long)]
    pub cc: Option<String>,
    /// BCC recipients (comma-separated)
    #[clap(long)]
    pub bcc: Option<String>,
    /// Body is HTML (default: plain text)
    #[clap(long)]
    pub html: bool,
}
