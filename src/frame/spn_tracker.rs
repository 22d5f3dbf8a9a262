//! SPN write rows and the request/response correlation for them.
//!
//! A row is correlated with the server's `create frame` reply by its position
//! at the moment it was sent.  Only the tail row can be removed, so the rows
//! in front of it never move.
//!
//! A position can be reused while an earlier request for it is still out:
//! the row was removed and re-added, the frame was reloaded, or the request
//! timed out and the row was sent again.  The tracker counts the replies
//! still owed to such abandoned requests per position and drops that many
//! replies for it before resolving the live row.  The gateway answers one
//! socket in request order, so the dropped replies are the abandoned ones.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{SPN_SUCCESS_REASON, SPN_TIMEOUT_REASON};
use crate::error::{ClientError, ClientResult, SpnField};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum SpnStatus {
    Idle,
    Sending,
    Success,
    Failed(String),
}

impl SpnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpnStatus::Success | SpnStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpnEntry {
    pub spn: String,
    pub value: String,
    pub status: SpnStatus,
    #[serde(skip)]
    sent_at_ms: Option<u64>,
}

impl SpnEntry {
    fn empty() -> Self {
        Self {
            spn: String::new(),
            value: String::new(),
            status: SpnStatus::Idle,
            sent_at_ms: None,
        }
    }
}

/// Snapshot of a row taken when it is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpnWrite {
    pub index: usize,
    pub spn: Value,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(SpnStatus),
    /// The reply answers a request that no longer owns its row.
    Abandoned,
    OutOfBounds,
    NotSending,
}

#[derive(Debug, Clone, Default)]
pub struct SpnTracker {
    entries: Vec<SpnEntry>,
    // position -> replies still owed to abandoned requests
    abandoned: HashMap<usize, usize>,
}

impl SpnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty `Idle` row and return its position.
    pub fn add_entry(&mut self) -> usize {
        self.entries.push(SpnEntry::empty());
        self.entries.len() - 1
    }

    pub fn remove_last(&mut self) -> Option<SpnEntry> {
        let removed = self.entries.pop();
        if let Some(entry) = &removed {
            if entry.status == SpnStatus::Sending {
                let row = self.entries.len();
                debug!(row, "removed a row that was still waiting for a reply");
                self.abandon(row);
            }
        }
        removed
    }

    pub fn edit(&mut self, row: usize, field: SpnField, text: impl Into<String>) -> ClientResult<()> {
        let entry = self.entries.get_mut(row).ok_or(ClientError::NoSuchRow(row))?;
        if entry.status == SpnStatus::Sending {
            return Err(ClientError::RowBusy(row));
        }
        match field {
            SpnField::Spn => entry.spn = text.into(),
            SpnField::Value => entry.value = text.into(),
        }
        if entry.status.is_terminal() {
            entry.status = SpnStatus::Idle;
        }
        Ok(())
    }

    /// Validate `row` and capture what goes on the wire.  The row itself is
    /// not changed; call [`SpnTracker::mark_sending`] once the send went out.
    pub fn prepare(&self, row: usize) -> ClientResult<SpnWrite> {
        let entry = self.entries.get(row).ok_or(ClientError::NoSuchRow(row))?;
        if entry.status == SpnStatus::Sending {
            return Err(ClientError::RowBusy(row));
        }
        if entry.spn.trim().is_empty() {
            return Err(ClientError::EmptyField { row, field: SpnField::Spn });
        }
        if entry.value.trim().is_empty() {
            return Err(ClientError::EmptyField { row, field: SpnField::Value });
        }
        Ok(SpnWrite {
            index: row,
            spn: wire_value(&entry.spn),
            value: wire_value(&entry.value),
        })
    }

    pub fn mark_sending(&mut self, row: usize, now_ms: u64) -> ClientResult<()> {
        let entry = self.entries.get_mut(row).ok_or(ClientError::NoSuchRow(row))?;
        entry.status = SpnStatus::Sending;
        entry.sent_at_ms = Some(now_ms);
        Ok(())
    }

    /// Apply a `create frame` reply for the row sent at `index`.
    pub fn resolve(&mut self, index: usize, reason: &str) -> ResolveOutcome {
        if let Some(owed) = self.abandoned.get_mut(&index) {
            *owed -= 1;
            if *owed == 0 {
                self.abandoned.remove(&index);
            }
            debug!(index, reason, "reply for an abandoned request dropped");
            return ResolveOutcome::Abandoned;
        }

        let rows = self.entries.len();
        let Some(entry) = self.entries.get_mut(index) else {
            warn!(index, rows, "reply for a row that no longer exists");
            return ResolveOutcome::OutOfBounds;
        };
        if entry.status != SpnStatus::Sending {
            warn!(index, status = ?entry.status, "reply for a row that is not waiting, ignored");
            return ResolveOutcome::NotSending;
        }

        entry.status = if reason == SPN_SUCCESS_REASON {
            SpnStatus::Success
        } else {
            SpnStatus::Failed(reason.to_string())
        };
        entry.sent_at_ms = None;
        debug!(index, status = ?entry.status, "spn write resolved");
        ResolveOutcome::Resolved(entry.status.clone())
    }

    /// Fail every `Sending` row submitted at least `timeout_ms` before
    /// `now_ms`.  Returns the rows that changed.
    pub fn expire_stale(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<usize> {
        let mut expired = Vec::new();
        for (row, entry) in self.entries.iter_mut().enumerate() {
            if entry.status != SpnStatus::Sending {
                continue;
            }
            let Some(sent_at) = entry.sent_at_ms else { continue };
            if now_ms.saturating_sub(sent_at) >= timeout_ms {
                entry.status = SpnStatus::Failed(SPN_TIMEOUT_REASON.to_string());
                entry.sent_at_ms = None;
                expired.push(row);
            }
        }
        for &row in &expired {
            self.abandon(row);
        }
        if !expired.is_empty() {
            warn!(rows = ?expired, "spn writes timed out");
        }
        expired
    }

    pub fn get(&self, row: usize) -> Option<&SpnEntry> {
        self.entries.get(row)
    }

    pub fn entries(&self) -> &[SpnEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == SpnStatus::Sending)
            .count()
    }

    /// Drop every row.  Requests still in flight are abandoned.
    pub fn clear(&mut self) {
        let sending: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == SpnStatus::Sending)
            .map(|(row, _)| row)
            .collect();
        for row in sending {
            self.abandon(row);
        }
        self.entries.clear();
    }

    /// Replies still owed to abandoned requests sent from `row`.
    pub fn abandoned_replies(&self, row: usize) -> usize {
        self.abandoned.get(&row).copied().unwrap_or(0)
    }

    fn abandon(&mut self, row: usize) {
        *self.abandoned.entry(row).or_insert(0) += 1;
    }
}

/// Numbers typed into a row go out as JSON numbers, anything else as text.
fn wire_value(text: &str) -> Value {
    let text = text.trim();
    if let Ok(n) = text.parse::<u64>() {
        return Value::from(n);
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    // Integers too wide for i64/u64 would be rounded as floats.
    let digits = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Value::from(text);
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::from(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn filled(rows: usize) -> SpnTracker {
        let mut tracker = SpnTracker::new();
        for i in 0..rows {
            let row = tracker.add_entry();
            tracker.edit(row, SpnField::Spn, format!("{}", 190 + i)).unwrap();
            tracker.edit(row, SpnField::Value, "12.5").unwrap();
        }
        tracker
    }

    #[test]
    fn empty_fields_are_rejected_before_sending() {
        let mut tracker = SpnTracker::new();
        let row = tracker.add_entry();
        assert_eq!(
            tracker.prepare(row),
            Err(ClientError::EmptyField { row, field: SpnField::Spn })
        );
        tracker.edit(row, SpnField::Spn, "190").unwrap();
        tracker.edit(row, SpnField::Value, "   ").unwrap();
        assert_eq!(
            tracker.prepare(row),
            Err(ClientError::EmptyField { row, field: SpnField::Value })
        );
        assert_eq!(tracker.get(row).unwrap().status, SpnStatus::Idle);
    }

    #[test]
    fn prepare_types_the_wire_values() {
        let mut tracker = filled(1);
        tracker.edit(0, SpnField::Value, "on").unwrap();
        let write = tracker.prepare(0).unwrap();
        assert_eq!(write, SpnWrite { index: 0, spn: json!(190), value: json!("on") });
        assert_eq!(wire_value("-3"), json!(-3));
        assert_eq!(wire_value("12.5"), json!(12.5));
        assert_eq!(wire_value("NaN"), json!("NaN"));
    }

    #[test]
    fn integers_too_wide_for_json_numbers_stay_text() {
        assert_eq!(wire_value("18446744073709551615"), json!(u64::MAX));
        assert_eq!(wire_value("18446744073709551616"), json!("18446744073709551616"));
        assert_eq!(wire_value("-9223372036854775809"), json!("-9223372036854775809"));
        assert_eq!(wire_value("1e3"), json!(1000.0));
    }

    #[test]
    fn out_of_order_replies_resolve_the_right_rows() {
        let mut tracker = filled(2);
        tracker.mark_sending(0, 0).unwrap();
        tracker.mark_sending(1, 0).unwrap();

        assert_eq!(tracker.resolve(1, "Success"), ResolveOutcome::Resolved(SpnStatus::Success));
        assert_eq!(
            tracker.resolve(0, "Failed: timeout"),
            ResolveOutcome::Resolved(SpnStatus::Failed("Failed: timeout".into()))
        );
        assert_eq!(tracker.get(0).unwrap().status, SpnStatus::Failed("Failed: timeout".into()));
        assert_eq!(tracker.get(1).unwrap().status, SpnStatus::Success);
    }

    #[test]
    fn rows_waiting_for_a_reply_cannot_be_edited_or_resent() {
        let mut tracker = filled(1);
        tracker.mark_sending(0, 5).unwrap();
        assert_eq!(tracker.edit(0, SpnField::Value, "1"), Err(ClientError::RowBusy(0)));
        assert_eq!(tracker.prepare(0), Err(ClientError::RowBusy(0)));

        tracker.resolve(0, "Success");
        tracker.edit(0, SpnField::Value, "1").unwrap();
        assert_eq!(tracker.get(0).unwrap().status, SpnStatus::Idle);
    }

    #[test]
    fn reply_for_removed_and_replaced_row_is_dropped() {
        let mut tracker = filled(2);
        tracker.mark_sending(1, 0).unwrap();
        tracker.remove_last();
        tracker.add_entry();

        assert_eq!(tracker.resolve(1, "Success"), ResolveOutcome::Abandoned);
        assert_eq!(tracker.get(1).unwrap().status, SpnStatus::Idle);
        assert_eq!(tracker.resolve(1, "Success"), ResolveOutcome::NotSending);
        assert_eq!(tracker.resolve(9, "Success"), ResolveOutcome::OutOfBounds);
    }

    #[test]
    fn only_stale_rows_time_out() {
        let mut tracker = filled(3);
        tracker.mark_sending(0, 1_000).unwrap();
        tracker.mark_sending(1, 8_000).unwrap();

        assert_eq!(tracker.expire_stale(11_000, 10_000), vec![0]);
        assert_eq!(tracker.get(0).unwrap().status, SpnStatus::Failed("timeout".into()));
        assert_eq!(tracker.get(1).unwrap().status, SpnStatus::Sending);
        assert_eq!(tracker.get(2).unwrap().status, SpnStatus::Idle);

        // A late reply for the expired row changes nothing.
        assert_eq!(tracker.resolve(0, "Success"), ResolveOutcome::Abandoned);
        assert_eq!(tracker.get(0).unwrap().status, SpnStatus::Failed("timeout".into()));
    }

    #[test]
    fn reply_for_removed_row_does_not_resolve_its_resubmitted_replacement() {
        let mut tracker = filled(1);
        tracker.mark_sending(0, 0).unwrap();
        tracker.remove_last();

        let row = tracker.add_entry();
        tracker.edit(row, SpnField::Spn, "190").unwrap();
        tracker.edit(row, SpnField::Value, "7").unwrap();
        tracker.prepare(row).unwrap();
        tracker.mark_sending(row, 10).unwrap();
        assert_eq!(tracker.abandoned_replies(row), 1);

        assert_eq!(tracker.resolve(row, "Failed: bus off"), ResolveOutcome::Abandoned);
        assert_eq!(tracker.get(row).unwrap().status, SpnStatus::Sending);
        assert_eq!(tracker.resolve(row, "Success"), ResolveOutcome::Resolved(SpnStatus::Success));
        assert_eq!(tracker.abandoned_replies(row), 0);
    }

    #[test]
    fn late_reply_after_timeout_does_not_resolve_the_resend() {
        let mut tracker = filled(1);
        tracker.mark_sending(0, 0).unwrap();
        assert_eq!(tracker.expire_stale(20_000, 10_000), vec![0]);

        tracker.edit(0, SpnField::Value, "13").unwrap();
        tracker.prepare(0).unwrap();
        tracker.mark_sending(0, 20_000).unwrap();

        assert_eq!(tracker.resolve(0, "Success"), ResolveOutcome::Abandoned);
        assert_eq!(tracker.get(0).unwrap().status, SpnStatus::Sending);
        assert_eq!(tracker.resolve(0, "Bad value"), ResolveOutcome::Resolved(SpnStatus::Failed("Bad value".into())));
    }

    #[test]
    fn clearing_abandons_rows_in_flight() {
        let mut tracker = filled(3);
        tracker.mark_sending(1, 0).unwrap();
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.abandoned_replies(0), 0);
        assert_eq!(tracker.abandoned_replies(1), 1);
    }

    proptest! {
        #[test]
        fn out_of_bounds_resolution_never_mutates(rows in 0usize..6, index in 0usize..64) {
            let mut tracker = filled(rows);
            for row in 0..rows {
                tracker.mark_sending(row, 0).unwrap();
            }
            let before = tracker.entries().to_vec();
            let outcome = tracker.resolve(rows + index, "Success");
            prop_assert_eq!(outcome, ResolveOutcome::OutOfBounds);
            prop_assert_eq!(tracker.entries(), &before[..]);
        }
    }
}
