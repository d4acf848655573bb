use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;
use crate::gmail_api::client::GmailClient;
use crate::gmail_api::messages::get_message;
use crate::types::{header_value, DraftResponse, MessagePart, SendResponse};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
    static ref ANGLE_ADDR_RE: Regex = Regex::new(r"<(.+?)>").unwrap();
}

pub fn validate_email(addr: &str) -> bool {
    EMAIL_RE.is_match(addr.trim())
}

/// Validate a single address or a comma-separated list (Cc/Bcc).
pub fn validate_recipients(list: &str) -> Result<(), Error> {
    for addr in list.split(',') {
        if !validate_email(addr) {
            return Err(Error::InvalidRecipient(addr.trim().to_string()));
        }
    }
    Ok(())
}

/// Outgoing message prior to RFC 2822 assembly. The threading fields are
/// only set when replying.
#[derive(Debug, Default, Clone)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub html: bool,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub thread_id: Option<String>,
}

/// Assemble the RFC 2822 message and wrap it in the Gmail API send payload.
pub fn encode_message(msg: &OutgoingMessage) -> serde_json::Value {
    let mut email_content = String::new();

    email_content.push_str(&format!("To: {}\r\n", msg.to));
    if let Some(cc) = msg.cc.as_deref().filter(|s| !s.is_empty()) {
        email_content.push_str(&format!("Cc: {}\r\n", cc));
    }
    if let Some(bcc) = msg.bcc.as_deref().filter(|s| !s.is_empty()) {
        email_content.push_str(&format!("Bcc: {}\r\n", bcc));
    }
    email_content.push_str(&format!("Subject: {}\r\n", msg.subject));
    if let Some(in_reply_to) = msg.in_reply_to.as_deref().filter(|s| !s.is_empty()) {
        email_content.push_str(&format!("In-Reply-To: {}\r\n", in_reply_to));
    }
    if let Some(references) = msg.references.as_deref().filter(|s| !s.is_empty()) {
        email_content.push_str(&format!("References: {}\r\n", references));
    }
    if msg.html {
        email_content.push_str("Content-Type: text/html; charset=utf-8\r\n");
    } else {
        email_content.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    }
    email_content.push_str("\r\n");
    email_content.push_str(&msg.body);

    let encoded_email = URL_SAFE_NO_PAD.encode(email_content.as_bytes());

    let mut request_body = serde_json::json!({ "raw": encoded_email });
    if let Some(thread_id) = msg.thread_id.as_deref().filter(|s| !s.is_empty()) {
        request_body["threadId"] = serde_json::json!(thread_id);
    }
    request_body
}

pub async fn send_message(
    client: &GmailClient,
    msg: &OutgoingMessage,
) -> Result<SendResponse, Error> {
    validate_recipients(&msg.to)?;
    if let Some(cc) = msg.cc.as_deref().filter(|s| !s.is_empty()) {
        validate_recipients(cc)?;
    }
    if let Some(bcc) = msg.bcc.as_deref().filter(|s| !s.is_empty()) {
        validate_recipients(bcc)?;
    }

    let request_body = encode_message(msg);
    client
        .post_json(&client.url("messages/send"), &request_body)
        .await
}

pub async fn create_draft(
    client: &GmailClient,
    msg: &OutgoingMessage,
) -> Result<DraftResponse, Error> {
    validate_recipients(&msg.to)?;
    if let Some(cc) = msg.cc.as_deref().filter(|s| !s.is_empty()) {
        validate_recipients(cc)?;
    }
    if let Some(bcc) = msg.bcc.as_deref().filter(|s| !s.is_empty()) {
        validate_recipients(bcc)?;
    }

    let draft_body = serde_json::json!({ "message": encode_message(msg) });
    client.post_json(&client.url("drafts"), &draft_body).await
}

/// Headers derived from the original message that make a reply thread
/// correctly in every client.
#[derive(Debug, PartialEq)]
pub struct ReplyContext {
    pub to: String,
    pub subject: String,
    pub thread_id: Option<String>,
    pub message_id: String,
    pub references: String,
}

/// Fetch the original message and derive recipient, subject, and threading
/// identifiers for the reply.
pub async fn reply_context(client: &GmailClient, msg_id: &str) -> Result<ReplyContext, Error> {
    let message = get_message(client, msg_id, false).await?;
    let empty = MessagePart::default();
    let payload = message.payload.as_ref().unwrap_or(&empty);
    Ok(derive_reply_context(
        payload,
        message.thread_id.clone(),
    ))
}

fn derive_reply_context(payload: &MessagePart, thread_id: Option<String>) -> ReplyContext {
    let original_from = header_value(payload, "From").unwrap_or("");
    // "Name <email@domain>" collapses to the bare address.
    let to = ANGLE_ADDR_RE
        .captures(original_from)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| original_from.to_string());

    let original_subject = header_value(payload, "Subject").unwrap_or("(no subject)");
    let subject = if original_subject.to_lowercase().starts_with("re:") {
        original_subject.to_string()
    } else {
        format!("Re: {}", original_subject)
    };

    let message_id = header_value(payload, "Message-ID").unwrap_or("").to_string();
    let existing_refs = header_value(payload, "References").unwrap_or("");
    let references = match (existing_refs.is_empty(), message_id.is_empty()) {
        (false, false) => format!("{} {}", existing_refs, message_id),
        (true, false) => message_id.clone(),
        _ => String::new(),
    };

    ReplyContext {
        to,
        subject,
        thread_id,
        message_id,
        references,
    }
}

/// Reply to a message: derive threading headers from the original, then send.
pub async fn send_reply(
    client: &GmailClient,
    msg_id: &str,
    body: &str,
    html: bool,
) -> Result<(SendResponse, ReplyContext), Error> {
    let context = reply_context(client, msg_id).await?;
    let msg = OutgoingMessage {
        to: context.to.clone(),
        subject: context.subject.clone(),
        body: body.to_string(),
        html,
        in_reply_to: Some(context.message_id.clone()),
        references: Some(context.references.clone()),
        thread_id: context.thread_id.clone(),
        ..Default::default()
    };
    let response = send_message(client, &msg).await?;
    Ok((response, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Header;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com"));
        assert!(validate_email("  a.b+tag@sub.domain.org "));
        assert!(!validate_email("not-an-address"));
        assert!(!validate_email("missing@tld"));
        assert!(!validate_email(""));
    }

    #[test]
    fn test_validate_recipients_names_bad_entry() {
        assert!(validate_recipients("a@x.com, b@y.org").is_ok());
        let err = validate_recipients("a@x.com, nope").unwrap_err();
        assert_eq!(err.kind(), "invalid_recipient");
        assert!(err.to_string().contains("nope"));
    }

    fn decode_raw(value: &serde_json::Value) -> String {
        let raw = value["raw"].as_str().unwrap();
        String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_message_plain_text() {
        let msg = OutgoingMessage {
            to: "bob@example.com".to_string(),
            subject: "Lunch".to_string(),
            body: "Noon?".to_string(),
            ..Default::default()
        };
        let value = encode_message(&msg);
        let text = decode_raw(&value);
        assert!(text.starts_with("To: bob@example.com\r\n"));
        assert!(text.contains("Subject: Lunch\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n\r\nNoon?"));
        assert!(value.get("threadId").is_none());
    }

    #[test]
    fn test_encode_message_with_cc_bcc_and_html() {
        let msg = OutgoingMessage {
            to: "bob@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "<p>Hi</p>".to_string(),
            cc: Some("carol@example.com".to_string()),
            bcc: Some("dave@example.com".to_string()),
            html: true,
            ..Default::default()
        };
        let text = decode_raw(&encode_message(&msg));
        assert!(text.contains("Cc: carol@example.com\r\n"));
        assert!(text.contains("Bcc: dave@example.com\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
    }

    #[test]
    fn test_encode_message_reply_headers_and_thread() {
        let msg = OutgoingMessage {
            to: "bob@example.com".to_string(),
            subject: "Re: Hi".to_string(),
            body: "yep".to_string(),
            in_reply_to: Some("<orig@mail>".to_string()),
            references: Some("<root@mail> <orig@mail>".to_string()),
            thread_id: Some("t42".to_string()),
            ..Default::default()
        };
        let value = encode_message(&msg);
        let text = decode_raw(&value);
        assert!(text.contains("In-Reply-To: <orig@mail>\r\n"));
        assert!(text.contains("References: <root@mail> <orig@mail>\r\n"));
        assert_eq!(value["threadId"], "t42");
    }

    fn payload_with(headers: Vec<(&str, &str)>) -> MessagePart {
        MessagePart {
            headers: Some(
                headers
                    .into_iter()
                    .map(|(name, value)| Header {
                        name: Some(name.to_string()),
                        value: Some(value.to_string()),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_reply_context_extracts_bare_address() {
        let payload = payload_with(vec![
            ("From", "Alice Smith <alice@example.com>"),
            ("Subject", "Plans"),
            ("Message-ID", "<m1@mail>"),
        ]);
        let ctx = derive_reply_context(&payload, Some("t1".to_string()));
        assert_eq!(ctx.to, "alice@example.com");
        assert_eq!(ctx.subject, "Re: Plans");
        assert_eq!(ctx.references, "<m1@mail>");
        assert_eq!(ctx.thread_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_reply_context_re_prefix_is_idempotent() {
        let payload = payload_with(vec![
            ("From", "alice@example.com"),
            ("Subject", "RE: Plans"),
            ("Message-ID", "<m2@mail>"),
        ]);
        let ctx = derive_reply_context(&payload, None);
        assert_eq!(ctx.subject, "RE: Plans");
        assert_eq!(ctx.to, "alice@example.com");
    }

    #[test]
    fn test_reply_context_chains_references() {
        let payload = payload_with(vec![
            ("From", "alice@example.com"),
            ("Subject", "Plans"),
            ("Message-ID", "<m3@mail>"),
            ("References", "<m1@mail> <m2@mail>"),
        ]);
        let ctx = derive_reply_context(&payload, None);
        assert_eq!(ctx.references, "<m1@mail> <m2@mail> <m3@mail>");
    }

    #[test]
    fn test_reply_context_without_message_id() {
        let payload = payload_with(vec![("From", "alice@example.com"), ("Subject", "Plans")]);
        let ctx = derive_reply_context(&payload, None);
        assert_eq!(ctx.references, "");
        assert_eq!(ctx.message_id, "");
    }

    #[tokio::test]
    async fn test_send_message_posts_raw_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/gmail/v1/users/me/messages/send")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"threadId": "t42"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "sent-1", "threadId": "t42"}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t".to_string(), server.url());
        let msg = OutgoingMessage {
            to: "bob@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "hello".to_string(),
            thread_id: Some("t42".to_string()),
            ..Default::default()
        };
        let response = send_message(&client, &msg).await.unwrap();
        assert_eq!(response.id, "sent-1");
        assert_eq!(response.thread_id, "t42");
    }

    #[tokio::test]
    async fn test_send_message_rejects_invalid_recipient_before_network() {
        // No mock server at all: a network call would fail loudly.
        let client = GmailClient::with_base_url("t".to_string(), "http://127.0.0.1:1".to_string());
        let msg = OutgoingMessage {
            to: "not-an-address".to_string(),
            subject: "Hi".to_string(),
            body: "hello".to_string(),
            ..Default::default()
        };
        let err = send_message(&client, &msg).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_recipient");
    }

    #[tokio::test]
    async fn test_create_draft_wraps_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/gmail/v1/users/me/drafts")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "d1", "message": {"id": "m9", "threadId": "t9"}}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t".to_string(), server.url());
        let msg = OutgoingMessage {
            to: "bob@example.com".to_string(),
            subject: "Draft".to_string(),
            body: "wip".to_string(),
            ..Default::default()
        };
        let response = create_draft(&client, &msg).await.unwrap();
        assert_eq!(response.id, "d1");
        assert_eq!(response.message.id, "m9");
    }

    #[tokio::test]
    async fn test_send_reply_threads_from_original() {
        let mut server = mockito::Server::new_async().await;
        let _original = server
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
                    "threadId": "t7",
                    "payload": {
                        "headers": [
                            {"name": "From", "value": "Carol <carol@example.com>"},
                            {"name": "Subject", "value": "Question"},
                            {"name": "Message-ID", "value": "<q1@mail>"}
                        ]
                    }
                }"#,
            )
            .create_async()
            .await;
        let _send = server
            .mock("POST", "/gmail/v1/users/me/messages/send")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"threadId": "t7"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "r1", "threadId": "t7"}"#)
            .create_async()
            .await;

        let client = GmailClient::with_base_url("t".to_string(), server.url());
        let (response, context) = send_reply(&client, "m1", "Answer", false).await.unwrap();
        assert_eq!(response.id, "r1");
        assert_eq!(context.to, "carol@example.com");
        assert_eq!(context.subject, "Re: Question");
    }
}
