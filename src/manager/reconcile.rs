//! Matching optimistic thread entries with store-confirmed messages.
//!
//! Local ids are never assumed to equal store ids. A confirmed message claims
//! the pending entry with the same conversation, role and content whose local
//! timestamp is closest to the stored one.

use crate::core::models::Message;

use super::session::{Delivery, ThreadMessage};

/// Apply a store confirmation to the thread.
///
/// Returns the index of the updated entry, or `None` when no pending entry
/// matches (the confirmation is then ignored).
pub fn reconcile(thread: &mut [ThreadMessage], confirmed: &Message) -> Option<usize> {
    if let Some(index) = thread.iter().position(|entry| entry.id == confirmed.id) {
        return Some(index);
    }

    let index = thread
        .iter()
        .enumerate()
        .filter(|(_, entry)| {
            entry.delivery == Delivery::Pending
                && entry.conversation_id == confirmed.conversation_id
                && entry.role == confirmed.role
                && entry.content == confirmed.content
        })
        .min_by_key(|(_, entry)| {
            (entry.created_at - confirmed.created_at)
                .num_microseconds()
                .map_or(u64::MAX, i64::unsigned_abs)
        })
        .map(|(index, _)| index)?;

    let entry = &mut thread[index];
    entry.id = confirmed.id;
    entry.created_at = confirmed.created_at;
    entry.delivery = Delivery::Confirmed;
    Some(index)
}

/// Mark a pending entry as rejected by the store.
pub fn mark_unsaved(thread: &mut [ThreadMessage], index: usize) {
    if let Some(entry) = thread
        .get_mut(index)
        .filter(|entry| entry.delivery == Delivery::Pending)
    {
        entry.delivery = Delivery::Unsaved;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::core::ids::{ConversationId, MessageId};
    use crate::core::models::Role;

    #[test]
    fn test_confirmation_replaces_local_id_and_time() {
        let conversation = ConversationId::new();
        let local_time = Utc::now();
        let mut thread = vec![ThreadMessage::local(conversation, Role::User, "hi", local_time)];

        let stored = Message {
            id: MessageId::new(),
            conversation_id: conversation,
            role: Role::User,
            content: "hi".to_string(),
            created_at: local_time + Duration::milliseconds(40),
        };
        assert_eq!(reconcile(&mut thread, &stored), Some(0));
        assert_eq!(thread[0].id, stored.id);
        assert_eq!(thread[0].created_at, stored.created_at);
        assert!(thread[0].is_confirmed());
    }

    #[test]
    fn test_duplicate_content_claims_closest_timestamp() {
        let conversation = ConversationId::new();
        let base = Utc::now();
        let mut thread = vec![
            ThreadMessage::local(conversation, Role::User, "again", base),
            ThreadMessage::local(conversation, Role::User, "again", base + Duration::seconds(10)),
        ];

        let stored = Message {
            id: MessageId::new(),
            conversation_id: conversation,
            role: Role::User,
            content: "again".to_string(),
            created_at: base + Duration::seconds(9),
        };
        assert_eq!(reconcile(&mut thread, &stored), Some(1));
        assert_eq!(thread[0].delivery, Delivery::Pending);
    }

    #[test]
    fn test_role_mismatch_is_ignored() {
        let conversation = ConversationId::new();
        let mut thread = vec![ThreadMessage::local(conversation, Role::User, "same", Utc::now())];
        let stored = Message {
            id: MessageId::new(),
            conversation_id: conversation,
            role: Role::Assistant,
            content: "same".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(reconcile(&mut thread, &stored), None);
        assert_eq!(thread[0].delivery, Delivery::Pending);
    }

    #[test]
    fn test_mark_unsaved_only_touches_pending() {
        let conversation = ConversationId::new();
        let mut thread = vec![ThreadMessage::local(conversation, Role::User, "x", Utc::now())];
        mark_unsaved(&mut thread, 0);
        assert_eq!(thread[0].delivery, Delivery::Unsaved);
        mark_unsaved(&mut thread, 7);
        assert_eq!(thread.len(), 1);
    }
}
