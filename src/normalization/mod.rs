//! Conversion of Gmail payloads into mirror update documents.
//!
//! Bodies come from a depth-first walk of the MIME tree where the first
//! `text/plain` and the first `text/html` part win. Fields missing from the
//! remote payload stay out of the update so partial fetches never erase
//! stored data.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};

use crate::gmail::types::{Header, MessagePart, RemoteLabel, RemoteMessage};
use crate::store::{LabelUpdate, MessageUpdate};

/// MIME tree reduced to what body extraction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadNode {
    Leaf {
        mime_type: String,
        data: Option<String>,
    },
    Branch {
        mime_type: String,
        /// Inline data carried by the container itself, read before the children.
        data: Option<String>,
        children: Vec<PayloadNode>,
    },
}

impl From<&MessagePart> for PayloadNode {
    fn from(part: &MessagePart) -> Self {
        let mime_type = part.mime_type.clone().unwrap_or_default();
        let data = part
            .body
            .as_ref()
            .and_then(|body| body.data.clone())
            .filter(|data| !data.is_empty());

        match part.parts.as_deref() {
            Some(children) if !children.is_empty() => PayloadNode::Branch {
                mime_type,
                data,
                children: children.iter().map(PayloadNode::from).collect(),
            },
            _ => PayloadNode::Leaf { mime_type, data },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedBodies {
    pub plain: Option<String>,
    pub html: Option<String>,
}

/// Decodes Gmail body data.
///
/// Accepts both the URL-safe and the standard alphabet, with or without
/// padding. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_base64url(data: &str) -> Option<String> {
    let normalized: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()?;
    Some(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// Walks the tree depth-first; the first decodable part of each type wins.
pub fn extract_bodies(root: &PayloadNode) -> ExtractedBodies {
    let mut bodies = ExtractedBodies::default();
    collect_bodies(root, &mut bodies);
    bodies
}

fn collect_bodies(node: &PayloadNode, bodies: &mut ExtractedBodies) {
    let (mime_type, data, children) = match node {
        PayloadNode::Leaf { mime_type, data } => (mime_type, data, &[][..]),
        PayloadNode::Branch {
            mime_type,
            data,
            children,
        } => (mime_type, data, children.as_slice()),
    };

    if let Some(decoded) = data.as_deref().and_then(decode_base64url) {
        let slot = if mime_type.eq_ignore_ascii_case("text/plain") {
            Some(&mut bodies.plain)
        } else if mime_type.eq_ignore_ascii_case("text/html") {
            Some(&mut bodies.html)
        } else {
            None
        };
        if let Some(slot) = slot
            && slot.is_none()
            && !decoded.is_empty()
        {
            *slot = Some(decoded);
        }
    }

    for child in children {
        collect_bodies(child, bodies);
    }
}

/// First value whose header name matches `name` ignoring ASCII case.
pub fn pick_header(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|header| {
            header
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|header| header.value.clone())
}

/// Header name to value; empty names or values are skipped, later duplicates win.
pub fn header_map(headers: &[Header]) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|header| match (header.name.as_deref(), header.value.as_deref()) {
            (Some(name), Some(value)) if !name.is_empty() && !value.is_empty() => {
                Some((name.to_string(), value.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// Parses Gmail's `internalDate` (epoch milliseconds as a string).
pub fn parse_internal_date(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Builds the partial update document for one fetched message.
///
/// With `replace_body == false` body fields are left out entirely.
pub fn build_message_update(message: &RemoteMessage, replace_body: bool) -> MessageUpdate {
    let headers = message
        .payload
        .as_ref()
        .and_then(|payload| payload.headers.as_deref());

    let bodies = match (&message.payload, replace_body) {
        (Some(payload), true) => extract_bodies(&PayloadNode::from(payload)),
        _ => ExtractedBodies::default(),
    };

    let sent_at = match &message.internal_date {
        None => None,
        Some(None) => Some(None),
        // Unparseable dates are treated as absent.
        Some(Some(raw)) => parse_internal_date(raw).map(Some),
    };

    MessageUpdate {
        remote_message_id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        history_marker: message.history_id.clone(),
        label_ids: message.label_ids.clone().unwrap_or_default(),
        subject: headers.and_then(|h| pick_header(h, "Subject")),
        from_address: headers.and_then(|h| pick_header(h, "From")),
        to_address: headers.and_then(|h| pick_header(h, "To")),
        snippet: message.snippet.clone(),
        sent_at,
        size_estimate: message.size_estimate,
        plain_body: bodies.plain,
        html_body: bodies.html,
        headers: headers.map(header_map),
    }
}

pub fn build_label_update(label: &RemoteLabel) -> LabelUpdate {
    let (text_color, background_color) = match &label.color {
        None => (None, None),
        Some(None) => (Some(None), Some(None)),
        Some(Some(color)) => (color.text_color.clone(), color.background_color.clone()),
    };

    LabelUpdate {
        remote_label_id: label.id.clone(),
        name: label.name.clone(),
        kind: label.kind.clone(),
        message_list_visibility: label.message_list_visibility.clone(),
        label_list_visibility: label.label_list_visibility.clone(),
        text_color,
        background_color,
        total_count: label.messages_total,
        unread_count: label.messages_unread,
    }
}
