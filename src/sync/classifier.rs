//! Change-log page classification.
//!
//! Reduces one page of history records to three disjoint id lists: messages to
//! refetch in full, messages whose labels changed, and messages to delete.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::gmail::types::HistoryRecord;

/// Insertion-ordered set of message ids.
#[derive(Debug, Clone, Default)]
struct OrderedIds {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedIds {
    fn insert(&mut self, id: &str) {
        if self.seen.insert(id.to_string()) {
            self.order.push(id.to_string());
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn into_vec_excluding(self, exclude: &[&OrderedIds]) -> Vec<String> {
        self.order
            .into_iter()
            .filter(|id| !exclude.iter().any(|set| set.contains(id)))
            .collect()
    }
}

/// Result of classifying one history page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageClassification {
    pub full_fetch: Vec<String>,
    pub metadata_only: Vec<String>,
    pub delete: Vec<String>,
    /// Highest change-log position observed in the page.
    pub latest_position: Option<String>,
}

impl PageClassification {
    pub fn is_empty(&self) -> bool {
        self.full_fetch.is_empty() && self.metadata_only.is_empty() && self.delete.is_empty()
    }
}

/// Orders positions numerically when both are unsigned integers; otherwise
/// the candidate seen later is taken as newer.
pub fn newer_position<'a>(current: Option<&'a str>, candidate: &'a str) -> &'a str {
    let Some(current) = current else {
        return candidate;
    };
    match (current.parse::<u64>(), candidate.parse::<u64>()) {
        (Ok(a), Ok(b)) => match a.cmp(&b) {
            Ordering::Greater => current,
            _ => candidate,
        },
        _ => candidate,
    }
}

/// Classifies one page of change-log records.
///
/// * an added message is fetched in full even if its labels also changed
/// * a deleted message is only deleted, whatever else the page says about it
/// * ids keep first-seen order
pub fn classify_page(records: &[HistoryRecord]) -> PageClassification {
    let mut full = OrderedIds::default();
    let mut metadata = OrderedIds::default();
    let mut delete = OrderedIds::default();
    let mut latest: Option<String> = None;

    for record in records {
        if let Some(id) = record.id.as_deref().filter(|id| !id.is_empty()) {
            latest = Some(newer_position(latest.as_deref(), id).to_string());
        }

        for item in &record.messages_added {
            if let Some(id) = item.message_id() {
                full.insert(id);
            }
        }
        for item in record.labels_added.iter().chain(&record.labels_removed) {
            if let Some(id) = item.message_id() {
                metadata.insert(id);
            }
        }
        for item in &record.messages_deleted {
            if let Some(id) = item.message_id() {
                delete.insert(id);
            }
        }
    }

    let metadata_only = metadata.into_vec_excluding(&[&full, &delete]);
    let full_fetch = full.into_vec_excluding(&[&delete]);

    PageClassification {
        full_fetch,
        metadata_only,
        delete: delete.order,
        latest_position: latest,
    }
}
