//! Gmail API glue split into logical submodules
//!
//! - client: authenticated HTTP plumbing shared by every call
//! - labels: label listing
//! - messages: search, message details, attachment download
//! - operations: send, draft, and reply (threading headers)
//!
//! Everything here is request/response glue; the Gmail service itself is the
//! external collaborator and its failures surface as `RemoteApi` errors.

pub mod client;
pub mod labels;
pub mod messages;
pub mod operations;

pub use client::GmailClient;
pub use labels::fetch_labels;
pub use messages::{
    build_query, download_attachments, search_messages, DownloadedAttachment, MessageSummary,
    SearchFilters,
};
pub use operations::{create_draft, send_message, send_reply, OutgoingMessage};
