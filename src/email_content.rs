use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::Engine;

use crate::types::MessagePart;

/// Gmail body data is base64url; padding is inconsistent across endpoints,
/// so accept either form.
pub fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')))
        .ok()
}

// Extract plain text content specifically
pub fn extract_plain_text_body(payload: &MessagePart) -> Option<String> {
    if payload.mime_type.as_deref() == Some("text/plain") {
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
            if let Some(decoded) = decode_base64url(data) {
                if let Ok(text) = String::from_utf8(decoded) {
                    return Some(text);
                }
            }
        }
    }

    // Recursively search parts for plain text
    if let Some(parts) = &payload.parts {
        for part in parts {
            if let Some(text) = extract_plain_text_body(part) {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
    }

    None
}

// Extract HTML content specifically
pub fn extract_html_body(payload: &MessagePart) -> Option<String> {
    if payload.mime_type.as_deref() == Some("text/html") {
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
            if let Some(decoded) = decode_base64url(data) {
                if let Ok(text) = String::from_utf8(decoded) {
                    return Some(text);
                }
            }
        }
    }

    // Recursively search parts for HTML
    if let Some(parts) = &payload.parts {
        for part in parts {
            if let Some(text) = extract_html_body(part) {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
    }

    None
}

/// Body text for display: plain text preferred, HTML as-is otherwise.
pub fn extract_body(payload: &MessagePart) -> Option<String> {
    extract_plain_text_body(payload).or_else(|| extract_html_body(payload))
}
