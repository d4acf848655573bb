use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::email_content::{decode_base64url, extract_body};
use crate::error::Error;
use crate::gmail_api::client::GmailClient;
use crate::types::{
    header_value, AttachmentResponse, Message, MessagePart, MessagesResponse,
};

/// Helper flags combined with free text into Gmail search syntax.
#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub query: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub label: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub has_attachment: bool,
    pub unread: bool,
    pub starred: bool,
}

/// Build a Gmail search query from the filters; an empty result defaults to
/// the inbox.
pub fn build_query(filters: &SearchFilters) -> String {
    let mut parts = Vec::new();

    if !filters.query.is_empty() {
        parts.push(filters.query.clone());
    }
    if let Some(from) = &filters.from {
        parts.push(format!("from:{}", from));
    }
    if let Some(to) = &filters.to {
        parts.push(format!("to:{}", to));
    }
    if let Some(subject) = &filters.subject {
        parts.push(format!("subject:{}", subject));
    }
    if let Some(label) = &filters.label {
        parts.push(format!("label:{}", label));
    }
    if let Some(after) = &filters.after {
        parts.push(format!("after:{}", after));
    }
    if let Some(before) = &filters.before {
        parts.push(format!("before:{}", before));
    }
    if filters.has_attachment {
        parts.push("has:attachment".to_string());
    }
    if filters.unread {
        parts.push("is:unread".to_string());
    }
    if filters.starred {
        parts.push("is:starred".to_string());
    }

    if parts.is_empty() {
        "in:inbox".to_string()
    } else {
        parts.join(" ")
    }
}

/// Flattened view of one message for output.
#[derive(Debug, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentInfo>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub attachment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadedAttachment {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// List messages matching the query, then fetch per-message details.
pub async fn search_messages(
    client: &GmailClient,
    query: &str,
    limit: u32,
    full_body: bool,
    include_attachments: bool,
) -> Result<Vec<MessageSummary>, Error> {
    let list_url = client.url(&format!(
        "messages?q={}&maxResults={}",
        urlencoding::encode(query),
        limit
    ));
    let listing: MessagesResponse = client.get_json(&list_url).await?;
    let refs = listing.messages.unwrap_or_default();
    debug!(query, matches = refs.len(), "message list fetched");

    let mut detailed = Vec::with_capacity(refs.len());
    for msg_ref in refs {
        let Some(id) = msg_ref.id else { continue };
        let message = get_message(client, &id, full_body).await?;
        let mut summary = summarize(&id, &message, full_body);
        if !include_attachments {
            summary.attachments = None;
        }
        detailed.push(summary);
    }
    Ok(detailed)
}

/// Fetch a single message, metadata-only unless the body is wanted.
pub async fn get_message(
    client: &GmailClient,
    msg_id: &str,
    full: bool,
) -> Result<Message, Error> {
    let format = if full { "full" } else { "metadata" };
    let url = client.url(&format!("messages/{}?format={}", msg_id, format));
    client.get_json(&url).await
}

fn summarize(id: &str, message: &Message, full_body: bool) -> MessageSummary {
    let empty = MessagePart::default();
    let payload = message.payload.as_ref().unwrap_or(&empty);

    let attachments = collect_attachments(payload);
    MessageSummary {
        id: id.to_string(),
        thread_id: message.thread_id.clone(),
        from: header_value(payload, "From").unwrap_or("").to_string(),
        to: header_value(payload, "To").unwrap_or("").to_string(),
        subject: header_value(payload, "Subject")
            .unwrap_or("(no subject)")
            .to_string(),
        date: header_value(payload, "Date").unwrap_or("").to_string(),
        snippet: message.snippet.clone().unwrap_or_default(),
        labels: message.label_ids.clone().unwrap_or_default(),
        body: if full_body { extract_body(payload) } else { None },
        attachments: if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        },
    }
}

/// Walk the MIME tree collecting every part that carries a filename.
pub fn collect_attachments(payload: &MessagePart) -> Vec<AttachmentInfo> {
    let mut attachments = Vec::new();
    walk_attachments(payload, &mut attachments);
    attachments
}

fn walk_attachments(part: &MessagePart, out: &mut Vec<AttachmentInfo>) {
    if let Some(filename) = part.filename.as_deref() {
        if !filename.is_empty() {
            out.push(AttachmentInfo {
                filename: filename.to_string(),
                mime_type: part.mime_type.clone().unwrap_or_default(),
                size: part.body.as_ref().and_then(|b| b.size).unwrap_or(0),
                attachment_id: part.body.as_ref().and_then(|b| b.attachment_id.clone()),
            });
        }
    }
    if let Some(parts) = &part.parts {
        for child in parts {
            walk_attachments(child, out);
        }
    }
}

/// Fetch and write every attachment of a message into `output_dir`.
pub async fn download_attachments(
    client: &GmailClient,
    msg_id: &str,
    output_dir: &Path,
) -> Result<Vec<DownloadedAttachment>, Error> {
    let message = get_message(client, msg_id, true).await?;
    let empty = MessagePart::default();
    let payload = message.payload.as_ref().unwrap_or(&empty);
    let attachments = collect_attachments(payload);

    std::fs::create_dir_all(output_dir)?;

    let mut downloaded = Vec::new();
    for attachment in attachments {
        let Some(attachment_id) = attachment.attachment_id else {
            continue;
        };
        let url = client.url(&format!(
            "messages/{}/attachments/{}",
            msg_id, attachment_id
        ));
        let response: AttachmentResponse = client.get_json(&url).await?;
        let data = response.data.ok_or_else(|| {
            Error::RemoteApi(format!(
                "attachment {} has no payload data",
                attachment.filename
            ))
        })?;
        let bytes = decode_base64url(&data).ok_or_else(|| {
            Error::RemoteApi(format!(
                "attachment {} payload is not valid base64url",
                attachment.filename
            ))
        })?;

        let path = dedup_path(output_dir, &attachment.filename);
        std::fs::write(&path, &bytes)?;
        debug!(file = %path.display(), size = bytes.len(), "attachment written");
        downloaded.push(DownloadedAttachment {
            filename: attachment.filename,
            path,
            size: bytes.len() as u64,
        });
    }
    Ok(downloaded)
}

/// Pick a path that does not clobber an existing file: name.ext, name_1.ext,
/// name_2.ext, ...
fn dedup_path(dir: &Path, filename: &str) -> PathBuf {
    let mut path = dir.join(filename);
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string();
    let suffix = Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}{}", stem, counter, suffix));
        counter += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessagePartBody;
    use base64::engine::general_purpose::URL_SAFE;
    use base64::engine::Engine;

    #[test]
    fn test_build_query_defaults_to_inbox() {
        assert_eq!(build_query(&SearchFilters::default()), "in:inbox");
    }

    #[test]
    fn test_build_query_combines_filters() {
        let filters = SearchFilters {
            query: "quarterly report".to_string(),
            from: Some("boss@example.com".to_string()),
            after: Some("2025/01/01".to_string()),
            has_attachment: true,
            unread: true,
            ..Default::default()
        };
        assert_eq!(
            build_query(&filters),
            "quarterly report from:boss@example.com after:2025/01/01 has:attachment is:unread"
        );
    }

    #[test]
    fn test_build_query_flag_only() {
        let filters = SearchFilters {
            starred: true,
            ..Default::default()
        };
        assert_eq!(build_query(&filters), "is:starred");
    }

    fn attachment_part(filename: &str, attachment_id: Option<&str>) -> MessagePart {
        MessagePart {
            mime_type: Some("application/pdf".to_string()),
            filename: Some(filename.to_string()),
            body: Some(MessagePartBody {
                data: None,
                size: Some(1024),
                attachment_id: attachment_id.map(|s| s.to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_attachments_walks_nested_parts() {
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            filename: Some(String::new()),
            parts: Some(vec![
                MessagePart {
                    mime_type: Some("multipart/alternative".to_string()),
                    parts: Some(vec![attachment_part("inner.pdf", Some("att-1"))]),
                    ..Default::default()
                },
                attachment_part("outer.csv", Some("att-2")),
            ]),
            ..Default::default()
        };
        let attachments = collect_attachments(&payload);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].filename, "inner.pdf");
        assert_eq!(attachments[1].attachment_id.as_deref(), Some("att-2"));
    }

    #[test]
    fn test_collect_attachments_skips_empty_filenames() {
        let payload = MessagePart {
            filename: Some(String::new()),
            parts: Some(vec![MessagePart::default()]),
            ..Default::default()
        };
        assert!(collect_attachments(&payload).is_empty());
    }

    #[test]
    fn test_dedup_path_appends_counter() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"one").unwrap();
        std::fs::write(dir.path().join("report_1.pdf"), b"two").unwrap();
        let path = dedup_path(dir.path(), "report.pdf");
        assert_eq!(path.file_name().unwrap(), "report_2.pdf");

        let fresh = dedup_path(dir.path(), "new.txt");
        assert_eq!(fresh.file_name().unwrap(), "new.txt");
    }

    #[tokio::test]
    async fn test_search_messages_lists_then_fetches_details() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/gmail/v1/users/me/messages")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".to_string(), "is:unread".to_string()),
                mockito::Matcher::UrlEncoded("maxResults".to_string(), "5".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages": [{"id": "m1"}]}"#)
            .create_async()
            .await;
        let _detail = server
            .mock("GET", "/gmail/v1/users/me/messages/m1")
            .match_query(mockito::Matcher::UrlEncoded(
                "format".to_string(),
                "metadata".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "m1",
                    "threadId": "t1",
                    "snippet": "hello there",
                    "labelIds": ["INBOX", "UNREAD"],
                    "payload": {
                        "mimeType": "multipart/mixed",
                        "headers": [
                            {"name": "From", "value": "alice@example.com"},
                            {"name": "To", "value": "bob@example.com"},
                            {"name": "Subject", "value": "Hi"},
                            {"name": "Date", "value": "Mon, 4 Aug 2025 10:00:00 +0000"}
                        ]
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t".to_string(), server.url());
        let results = search_messages(&client, "is:unread", 5, false, false)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject, "Hi");
        assert_eq!(results[0].from, "alice@example.com");
        assert_eq!(results[0].labels, vec!["INBOX", "UNREAD"]);
        assert!(results[0].body.is_none());
        assert!(results[0].attachments.is_none());
    }

    #[tokio::test]
    async fn test_download_attachments_writes_decoded_files() {
        let mut server = mockito::Server::new_async().await;
        let _detail = server
            .mock("GET", "/gmail/v1/users/me/messages/m1")
            .match_query(mockito::Matcher::UrlEncoded(
                "format".to_string(),
                "full".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "m1",
                    "threadId": "t1",
                    "payload": {
                        "mimeType": "multipart/mixed",
                        "parts": [
                            {
                                "mimeType": "text/plain",
                                "filename": "",
                                "body": {"size": 2, "data": "aGk="}
                            },
                            {
                                "mimeType": "text/csv",
                                "filename": "data.csv",
                                "body": {"size": 8, "attachmentId": "att-9"}
                            }
                        ]
                    }
                }"#,
            )
            .create_async()
            .await;
        let payload = URL_SAFE.encode("a,b\n1,2\n");
        let _attachment = server
            .mock("GET", "/gmail/v1/users/me/messages/m1/attachments/att-9")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"size": 8, "data": "{}"}}"#, payload))
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let client = GmailClient::with_base_url("t".to_string(), server.url());
        let downloaded = download_attachments(&client, "m1", dir.path()).await.unwrap();
        assert_eq!(downloaded.len(), 1);
        assert_eq!(downloaded[0].filename, "data.csv");
        let written = std::fs::read_to_string(&downloaded[0].path).unwrap();
        assert_eq!(written, "a,b\n1,2\n");
    }
}
