use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LabelsResponse {
    pub labels: Option<Vec<Label>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Label {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Message {
    pub id: Option<String>,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MessagePartBody {
    pub data: Option<String>,
    pub size: Option<u64>,
    #[serde(rename = "attachmentId")]
    pub attachment_id: Option<String>,
}

/// Response of the attachments.get endpoint.
#[derive(Debug, Deserialize)]
pub struct AttachmentResponse {
    pub data: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DraftResponse {
    pub id: String,
    pub message: SendResponse,
}

/// Case-insensitive header lookup on a message payload.
pub fn header_value<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers.as_ref()?.iter().find_map(|h| {
        let header_name = h.name.as_deref()?;
        if header_name.eq_ignore_ascii_case(name) {
            h.value.as_deref()
        } else {
            None
        }
    })
}
