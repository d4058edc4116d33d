//! NOTIFY correlation
//!
//! Pure matching logic: given an inbound request and the candidate
//! subscriptions, decide which one (if any) owns it. No candidate means
//! orphan; the invoking strategy must not guess.

use std::sync::Arc;

use tracing::debug;

use crate::sip::headers::EventHeader;
use crate::subscription::{EventType, Subscription};

/// Find the presence subscription owning an inbound NOTIFY
///
/// A match requires dialog-id equality AND event-id equality (both sides
/// absent also matches). A dialog that matches with a mismatched event id
/// is an explicit orphan: the near-miss is logged into that
/// subscription's error log for diagnostics, and the NOTIFY is never
/// delivered to it.
pub fn correlate_presence(
    candidates: &[Arc<Subscription>],
    dialog_id: &str,
    event: &EventHeader,
) -> Option<Arc<Subscription>> {
    for subscription in candidates {
        if subscription.event_type() != EventType::Presence {
            continue;
        }
        if subscription.dialog_id() != dialog_id {
            continue;
        }
        if event.id.as_deref() == subscription.event_id() {
            return Some(Arc::clone(subscription));
        }
        // Plausible dialog, wrong event id: diagnostic only.
        subscription.log_event_error(format!(
            "orphan NOTIFY on dialog {}: event id {:?} does not match subscription id {:?}",
            dialog_id,
            event.id,
            subscription.event_id()
        ));
    }
    None
}

/// Find the refer subscription owning an inbound NOTIFY
///
/// One dialog may carry several outstanding REFER subscriptions
/// (sequential transfers), so candidates are tried in creation order and
/// the first plausible match wins. A subscription that carries a
/// distinguishing event id only matches an equal inbound id; one without
/// an id matches any. Uniqueness of `(dialog, event id)` pairs is
/// enforced at creation time, not here.
pub fn correlate_refer(
    candidates: &[Arc<Subscription>],
    dialog_id: &str,
    event: &EventHeader,
) -> Option<Arc<Subscription>> {
    for subscription in candidates {
        if subscription.event_type() != EventType::Refer {
            continue;
        }
        if subscription.dialog_id() != dialog_id {
            continue;
        }
        match subscription.event_id() {
            Some(id) if event.id.as_deref() != Some(id) => {
                debug!(
                    dialog_id,
                    subscription_id = id,
                    inbound_id = ?event.id,
                    "refer NOTIFY does not match this subscription, trying next"
                );
            }
            _ => return Some(Arc::clone(subscription)),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sip::transport::MemoryTransport;

    fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new())
    }

    #[test]
    fn presence_match_requires_dialog_and_event_id() {
        let t = transport();
        let plain = Arc::new(Subscription::presence(
            "sip:a@b", "dlg-1", None, 3600, 1, t.clone(),
        ));
        let tagged = Arc::new(Subscription::presence(
            "sip:a@b",
            "dlg-2",
            Some("shift".to_string()),
            3600,
            2,
            t.clone(),
        ));
        let candidates = vec![plain.clone(), tagged.clone()];

        let no_id = EventHeader::new("presence");
        let matched = correlate_presence(&candidates, "dlg-1", &no_id).unwrap();
        assert_eq!(matched.dialog_id(), "dlg-1");

        let with_id = EventHeader::with_id("presence", "shift");
        let matched = correlate_presence(&candidates, "dlg-2", &with_id).unwrap();
        assert_eq!(matched.dialog_id(), "dlg-2");

        // Wrong dialog: orphan, nothing logged anywhere.
        assert!(correlate_presence(&candidates, "dlg-9", &no_id).is_none());
        assert!(plain.event_errors().is_empty());
    }

    #[test]
    fn presence_near_miss_logs_orphan_without_delivering() {
        let t = transport();
        let subscription = Arc::new(Subscription::presence(
            "sip:a@b",
            "dlg-1",
            Some("one".to_string()),
            3600,
            1,
            t,
        ));
        let candidates = vec![subscription.clone()];

        let other_id = EventHeader::with_id("presence", "two");
        assert!(correlate_presence(&candidates, "dlg-1", &other_id).is_none());

        let errors = subscription.event_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("orphan"));
        // The NOTIFY never reached the queue.
        assert!(subscription.wait_notify(std::time::Duration::ZERO).is_none());
    }

    #[test]
    fn refer_tries_candidates_in_creation_order() {
        let t = transport();
        let first = Arc::new(Subscription::refer(
            "sip:c@d",
            "dlg-1",
            Some("t1".to_string()),
            1,
            t.clone(),
        ));
        let second = Arc::new(Subscription::refer(
            "sip:e@f",
            "dlg-1",
            Some("t2".to_string()),
            2,
            t.clone(),
        ));
        let untagged = Arc::new(Subscription::refer("sip:g@h", "dlg-1", None, 3, t));
        let candidates = vec![first.clone(), second.clone(), untagged.clone()];

        let event = EventHeader::with_id("refer", "t2");
        let matched = correlate_refer(&candidates, "dlg-1", &event).unwrap();
        assert_eq!(matched.event_id(), Some("t2"));

        // An id the tagged subscriptions do not carry falls through to
        // the untagged one.
        let event = EventHeader::with_id("refer", "t9");
        let matched = correlate_refer(&candidates, "dlg-1", &event).unwrap();
        assert_eq!(matched.event_id(), None);

        let event = EventHeader::new("refer");
        assert!(correlate_refer(&candidates, "dlg-2", &event).is_none());
    }
}
