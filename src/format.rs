//! Markdown and JSON rendering for the CLI.

use std::path::Path;

use crate::auth::SetupStatus;
use crate::error::Error;
use crate::gmail_api::messages::{DownloadedAttachment, MessageSummary};
use crate::types::Label;

pub fn messages_markdown(messages: &[MessageSummary], full_body: bool) -> String {
    if messages.is_empty() {
        return "No messages found.".to_string();
    }

    let mut lines = vec![format!(
        "# Gmail Search Results ({} messages)\n",
        messages.len()
    )];

    for msg in messages {
        lines.push(format!("## {}", msg.subject));
        lines.push(format!("**From:** {}", msg.from));
        lines.push(format!("**To:** {}", msg.to));
        lines.push(format!("**Date:** {}", msg.date));
        lines.push(format!("**ID:** `{}`", msg.id));

        if !msg.labels.is_empty() {
            lines.push(format!("**Labels:** {}", msg.labels.join(", ")));
        }
        if let Some(attachments) = &msg.attachments {
            let names: Vec<&str> = attachments.iter().map(|a| a.filename.as_str()).collect();
            lines.push(format!("**Attachments:** {}", names.join(", ")));
        }
        lines.push(String::new());

        match (&msg.body, full_body) {
            (Some(body), true) => {
                lines.push("### Body".to_string());
                lines.push(body.clone());
            }
            _ => lines.push(format!("> {}", msg.snippet)),
        }
        lines.push("\n---\n".to_string());
    }

    lines.join("\n")
}

pub fn labels_markdown(labels: &[Label]) -> String {
    let mut sorted: Vec<&Label> = labels.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut lines = vec!["# Gmail Labels\n".to_string()];
    for label in sorted {
        lines.push(format!(
            "- {} (`{}`)",
            label.name.as_deref().unwrap_or("(unnamed)"),
            label.id.as_deref().unwrap_or("")
        ));
    }
    lines.join("\n")
}

pub fn downloads_markdown(downloaded: &[DownloadedAttachment], output_dir: &Path) -> String {
    if downloaded.is_empty() {
        return "No attachments found in this message.".to_string();
    }
    let mut lines = vec![format!(
        "Downloaded {} attachment(s) to {}:",
        downloaded.len(),
        output_dir.display()
    )];
    for item in downloaded {
        lines.push(format!("  - {} ({} bytes)", item.filename, item.size));
    }
    lines.join("\n")
}

pub fn setup_markdown(status: &SetupStatus, config_path: &Path) -> String {
    if !status.client_config_present {
        return format!(
            "Gmail API not configured. To set up:\n\n\
             1. Save your OAuth client credentials to: {}\n\n\
             \x20  Create a file with this structure:\n\
             \x20  {{\n\
             \x20    \"installed\": {{\n\
             \x20      \"client_id\": \"YOUR_CLIENT_ID\",\n\
             \x20      \"client_secret\": \"YOUR_CLIENT_SECRET\",\n\
             \x20      \"auth_uri\": \"https://accounts.google.com/o/oauth2/auth\",\n\
             \x20      \"token_uri\": \"https://oauth2.googleapis.com/token\",\n\
             \x20      \"redirect_uris\": [\"http://localhost\"]\n\
             \x20    }}\n\
             \x20  }}\n\n\
             2. Run: gmailctl auth\n\n\
             Current scope: {} (change with 'gmailctl scope --set')",
            config_path.display(),
            status.scope
        );
    }

    let mut lines = vec![
        format!(
            "Status: {}",
            if status.ready() {
                "Ready"
            } else {
                "Needs authentication"
            }
        ),
        format!("Scope: {}", status.scope),
    ];
    if !status.scope_recognized {
        lines.push(
            "Warning: the persisted scope is not one of readonly/modify/full; \
             fix it with 'gmailctl scope --set'"
                .to_string(),
        );
    }
    if status.token_present && !status.scope_matches {
        lines.push("Cached token was issued for a different scope.".to_string());
    }
    if !status.ready() {
        lines.push(String::new());
        lines.push("Run: gmailctl auth".to_string());
    }
    lines.join("\n")
}

/// `{"error": {"kind": ..., "message": ...}}` for `--json` mode.
pub fn error_json(err: &Error) -> String {
    serde_json::json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    })
    .to_string()
}
