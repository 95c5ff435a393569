// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the open-thread synchronizer against a scripted server.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use molarisse_core::{MediaKind, MessageId, MolarisseError, PartnerId, RawTimestamp};
use molarisse_sync::{
    Draft, DisplayNameResolver, EventBus, MemorySessionStore, MessageThreadSynchronizer,
    NoticeLevel, OutboxState, Refreshable, RefreshOutcome, ResourceUrlCache, ScrollDirective,
    SyncEvent, ThreadState,
};
use molarisse_test_utils::fixtures::{partner_info, read_message, wire_message};
use molarisse_test_utils::{MockTransport, Operation, TransportCall};
use tokio::sync::broadcast;

const ME: PartnerId = PartnerId(1);
const DENTIST: PartnerId = PartnerId(2);
const PATIENT: PartnerId = PartnerId(3);

struct Fixture {
    transport: Arc<MockTransport>,
    events: EventBus,
    resources: Arc<ResourceUrlCache>,
    thread: Arc<MessageThreadSynchronizer>,
}

fn fixture() -> Fixture {
    let transport = Arc::new(MockTransport::as_user(ME));
    let events = EventBus::new(256);
    let names = Arc::new(DisplayNameResolver::new(
        transport.clone(),
        Arc::new(MemorySessionStore::new()),
        events.clone(),
    ));
    let resources = Arc::new(ResourceUrlCache::new("http://clinic.test/api/v1/api").with_stamp(7));
    let thread = Arc::new(
        MessageThreadSynchronizer::new(
            transport.clone(),
            names,
            Arc::clone(&resources),
            events.clone(),
        )
        .with_current_user(Some(ME)),
    );
    Fixture {
        transport,
        events,
        resources,
        thread,
    }
}

async fn seed_dentist_thread(transport: &MockTransport) {
    transport
        .set_messages(
            DENTIST,
            vec![
                wire_message(12, 2, 1, "Votre rendez-vous est confirmé", "2025-05-05 10:00:00"),
                wire_message(11, 1, 2, "Bonjour docteur", "2025-05-05 09:00:00"),
                wire_message(12, 2, 1, "duplicate copy", "2025-05-05 10:00:00"),
                read_message(13, 2, 1, "À demain", "2025-05-05 11:00:00"),
            ],
        )
        .await;
    transport
        .set_partner_info(DENTIST, partner_info(2, "Karim", "Haddad", "DOCTOR"))
        .await;
}

fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn error_notices(events: &[SyncEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SyncEvent::Notice(n) if n.level == NoticeLevel::Error))
        .count()
}

fn ids(messages: &[molarisse_core::Message]) -> Vec<i64> {
    messages.iter().map(|m| m.id.0).collect()
}

#[tokio::test]
async fn load_sorts_dedups_and_marks_incoming_read() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;

    assert_eq!(f.thread.state().await, ThreadState::Idle);
    f.thread.open(DENTIST).await;

    let messages = f.thread.messages().await;
    assert_eq!(ids(&messages), vec![11, 12, 13]);
    assert_eq!(messages[1].content, "Votre rendez-vous est confirmé");
    assert!(messages[0].is_mine);
    assert!(!messages[1].is_mine);
    assert!(messages[1].is_read(), "incoming unread message is marked read locally");

    let calls = f.transport.calls().await;
    assert!(calls.contains(&TransportCall::MarkRead(vec![MessageId(12)])));
    assert_eq!(f.thread.state().await, ThreadState::Ready);

    let profile = f.thread.profile().await.expect("profile loaded");
    assert_eq!(profile.name, "Karim Haddad");
    assert_eq!(profile.role_label, "Médecin");
}

#[tokio::test]
async fn load_failure_shows_empty_thread_without_notice() {
    let f = fixture();
    let mut rx = f.events.subscribe();
    f.transport.fail(Operation::ListMessages).await;

    f.thread.open(DENTIST).await;

    assert!(f.thread.messages().await.is_empty());
    assert_eq!(f.thread.state().await, ThreadState::Ready);
    assert_eq!(error_notices(&drain(&mut rx)), 0);
}

#[tokio::test]
async fn refresh_never_regresses_a_populated_thread() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;

    f.transport.set_messages(DENTIST, Vec::new()).await;
    assert_eq!(f.thread.refresh_now().await.unwrap(), RefreshOutcome::Empty);
    assert_eq!(f.thread.messages().await.len(), 3);

    f.transport.fail(Operation::ListMessages).await;
    assert!(f.thread.refresh_now().await.is_err());
    f.thread.refresh().await;
    assert_eq!(f.thread.messages().await.len(), 3);
}

#[tokio::test]
async fn refresh_folds_new_messages_and_keeps_receipts() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    let before = f.thread.messages().await;

    f.transport
        .push_message(
            DENTIST,
            wire_message(14, 2, 1, "Pensez à votre radio", "2025-05-05 12:00:00"),
        )
        .await;
    let outcome = f.thread.refresh_now().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Applied { len: 4 });

    let after = f.thread.messages().await;
    assert_eq!(ids(&after), vec![11, 12, 13, 14]);
    assert_eq!(after[1].sent_at, before[1].sent_at);
    assert!(after[1].is_read());
}

#[tokio::test]
async fn refresh_without_open_thread_is_skipped() {
    let f = fixture();
    assert_eq!(f.thread.refresh_now().await.unwrap(), RefreshOutcome::Skipped);
    assert_eq!(f.transport.call_count(Operation::ListMessages).await, 0);
}

#[tokio::test]
async fn stale_response_for_previous_partner_is_discarded() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.transport
        .set_messages(
            PATIENT,
            vec![wire_message(31, 3, 1, "J'ai mal à une dent", "2025-05-06 08:00:00")],
        )
        .await;
    f.transport.hold_messages(DENTIST).await;

    let slow_open = {
        let thread = Arc::clone(&f.thread);
        tokio::spawn(async move { thread.open(DENTIST).await })
    };
    while f.transport.call_count(Operation::ListMessages).await == 0 {
        tokio::task::yield_now().await;
    }
    let first_generation = f.thread.generation();

    f.thread.open(PATIENT).await;
    assert!(f.thread.generation() > first_generation);

    f.transport.release_messages(DENTIST).await;
    slow_open.await.unwrap();

    assert_eq!(f.thread.partner().await, Some(PATIENT));
    assert_eq!(ids(&f.thread.messages().await), vec![31]);
    assert_eq!(f.thread.profile().await.unwrap().id, PATIENT);
    assert_eq!(f.thread.state().await, ThreadState::Ready);
}

#[tokio::test]
async fn refresh_is_skipped_while_a_load_is_in_flight() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.transport.hold_messages(DENTIST).await;

    let slow_open = {
        let thread = Arc::clone(&f.thread);
        tokio::spawn(async move { thread.open(DENTIST).await })
    };
    while f.transport.call_count(Operation::ListMessages).await == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(f.thread.state().await, ThreadState::Loading);

    assert_eq!(f.thread.refresh_now().await.unwrap(), RefreshOutcome::Skipped);
    f.thread.refresh().await;

    f.transport.release_messages(DENTIST).await;
    slow_open.await.unwrap();

    assert_eq!(f.transport.call_count(Operation::ListMessages).await, 1);
    assert_eq!(ids(&f.thread.messages().await), vec![11, 12, 13]);
}

#[tokio::test]
async fn successful_send_appears_after_acknowledgement() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    let mut rx = f.events.subscribe();

    let local_id = f.thread.send_text("  Merci, à demain  ").await.unwrap();

    let calls = f.transport.calls().await;
    assert!(calls.contains(&TransportCall::SendMessage {
        recipient: DENTIST,
        content: "Merci, à demain".to_string(),
    }));
    let messages = f.thread.messages().await;
    let last = messages.last().unwrap();
    assert_eq!(last.content, "Merci, à demain");
    assert!(last.is_mine);
    assert!(f.thread.outbox().await.is_empty(), "confirmed entries are pruned");

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        SyncEvent::SendSettled { local_id: id, message: Some(_) } if *id == local_id
    )));
    assert_eq!(error_notices(&events), 0);
}

#[tokio::test]
async fn send_with_failed_refetch_keeps_the_thread_and_appends() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    assert_eq!(ids(&f.thread.messages().await), vec![11, 12, 13]);

    f.transport.fail(Operation::ListMessages).await;
    f.thread.send_text("hello").await.unwrap();

    let messages = f.thread.messages().await;
    assert_eq!(ids(&messages), vec![11, 12, 13, 1001]);
    assert_eq!(messages[3].content, "hello");
    assert!(messages[3].is_mine);
}

#[tokio::test]
async fn failed_send_leaves_thread_untouched_and_draft_recoverable() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    let before = f.thread.messages().await;
    let mut rx = f.events.subscribe();

    f.transport.fail(Operation::SendMessage).await;
    let err = f.thread.send_text("Je serai en retard").await.unwrap_err();
    assert!(err.is_transport());

    assert_eq!(f.thread.messages().await, before);
    assert_eq!(error_notices(&drain(&mut rx)), 1, "exactly one notice per failure");

    let outbox = f.thread.outbox().await;
    assert_eq!(outbox.len(), 1);
    assert!(matches!(outbox[0].state, OutboxState::Failed(_)));
    assert_eq!(outbox[0].draft, Draft::text("Je serai en retard"));

    f.transport.recover(Operation::SendMessage).await;
    f.thread.retry_failed(outbox[0].local_id).await.unwrap();
    assert_eq!(
        f.thread.messages().await.last().unwrap().content,
        "Je serai en retard"
    );
    assert!(f.thread.outbox().await.is_empty());
}

#[tokio::test]
async fn send_preconditions_are_checked_before_the_network() {
    let f = fixture();
    let err = f.thread.send_text("bonjour").await.unwrap_err();
    assert!(matches!(err, MolarisseError::Precondition(_)));

    f.thread.open(DENTIST).await;
    let err = f.thread.send_text("   ").await.unwrap_err();
    assert!(matches!(err, MolarisseError::Precondition(_)));
    let err = f.thread.send_voice("audio/webm", Vec::new()).await.unwrap_err();
    assert!(matches!(err, MolarisseError::Precondition(_)));

    assert_eq!(f.transport.call_count(Operation::SendMessage).await, 0);
    assert_eq!(f.transport.call_count(Operation::SendMediaMessage).await, 0);
    assert!(f.thread.outbox().await.is_empty());
}

#[tokio::test]
async fn voice_and_image_sends_use_multipart_uploads() {
    let f = fixture();
    f.thread.open(DENTIST).await;

    f.thread.send_voice("audio/webm;codecs=opus", vec![1, 2, 3]).await.unwrap();
    f.thread
        .send_image("radio.png", "image/png", vec![9; 16], "Ma radio")
        .await
        .unwrap();

    let calls = f.transport.calls().await;
    assert!(calls.contains(&TransportCall::SendMediaMessage {
        recipient: DENTIST,
        file_name: "voice-message.webm".to_string(),
    }));
    assert!(calls.contains(&TransportCall::SendMediaMessage {
        recipient: DENTIST,
        file_name: "radio.png".to_string(),
    }));

    let messages = f.thread.messages().await;
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.media_kind == MediaKind::Voice));
    assert!(messages
        .iter()
        .any(|m| m.media_kind == MediaKind::Image && m.content == "Ma radio"));
    assert!(!f.resources.is_empty(), "media urls are prewarmed");
}

#[tokio::test]
async fn edit_patches_own_text_message_in_place() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    f.transport.clear_calls().await;

    f.thread.edit(MessageId(11), "Bonjour docteur Haddad").await.unwrap();

    let messages = f.thread.messages().await;
    assert_eq!(messages[0].content, "Bonjour docteur Haddad");
    assert!(messages[0].edited);
    assert!(messages[0].edited_at.is_some());
    assert_eq!(f.transport.call_count(Operation::ListMessages).await, 0);
    assert_eq!(f.thread.pending_operation(MessageId(11)).await, None);
}

#[tokio::test]
async fn edit_rejects_foreign_media_and_unknown_messages() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.transport
        .push_message(
            DENTIST,
            molarisse_core::WireMessage {
                media_type: Some("IMAGE".into()),
                media_path: Some("xray.png".into()),
                ..wire_message(15, 1, 2, "", "2025-05-05 13:00:00")
            },
        )
        .await;
    f.thread.open(DENTIST).await;

    for (id, content) in [(12, "pas à moi"), (15, "légende"), (99, "absent")] {
        let err = f.thread.edit(MessageId(id), content).await.unwrap_err();
        assert!(
            matches!(
                err,
                MolarisseError::Precondition(_) | MolarisseError::NotFound { .. }
            ),
            "unexpected error for {id}: {err}"
        );
    }
    let err = f.thread.edit(MessageId(11), "  ").await.unwrap_err();
    assert!(matches!(err, MolarisseError::Precondition(_)));
    assert_eq!(f.transport.call_count(Operation::EditMessage).await, 0);
}

#[tokio::test]
async fn failed_edit_and_delete_leave_state_and_notify_once_each() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    let before = f.thread.messages().await;
    let mut rx = f.events.subscribe();

    f.transport.fail(Operation::EditMessage).await;
    f.transport.fail(Operation::DeleteMessage).await;
    assert!(f.thread.edit(MessageId(11), "corrigé").await.is_err());
    assert!(f.thread.delete(MessageId(11)).await.is_err());

    assert_eq!(f.thread.messages().await, before);
    assert_eq!(error_notices(&drain(&mut rx)), 2);
    assert_eq!(f.thread.pending_operation(MessageId(11)).await, None);
}

#[tokio::test]
async fn delete_removes_own_message_only() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;

    let err = f.thread.delete(MessageId(12)).await.unwrap_err();
    assert!(matches!(err, MolarisseError::Precondition(_)));

    f.thread.delete(MessageId(11)).await.unwrap();
    assert_eq!(ids(&f.thread.messages().await), vec![12, 13]);
    assert!(
        f.transport
            .stored_messages(DENTIST)
            .await
            .iter()
            .all(|m| m.id != Some(11))
    );
}

#[tokio::test]
async fn scroll_follows_bottom_or_offers_affordance() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    let mut rx = f.events.subscribe();

    f.thread.open(DENTIST).await;
    assert!(
        drain(&mut rx).contains(&SyncEvent::Scroll(ScrollDirective::ScrollToBottom)),
        "a fresh thread opens at the bottom"
    );

    f.thread.set_viewer_at_bottom(false).await;
    f.transport
        .push_message(DENTIST, wire_message(20, 2, 1, "Nouveau", "2025-05-05 14:00:00"))
        .await;
    f.thread.refresh_now().await.unwrap();

    assert!(drain(&mut rx).contains(&SyncEvent::Scroll(ScrollDirective::ShowUnreadAffordance)));
    assert!(f.thread.unread_affordance().await);

    f.thread.set_viewer_at_bottom(true).await;
    assert!(!f.thread.unread_affordance().await);
}

#[tokio::test]
async fn repaired_send_time_survives_refresh() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;

    let corrected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    f.transport
        .set_original_date(MessageId(11), RawTimestamp::Millis(corrected.timestamp_millis()))
        .await;

    assert!(f.thread.repair_sent_at(MessageId(11)).await.unwrap());
    assert_eq!(ids(&f.thread.messages().await), vec![12, 13, 11]);

    f.thread.refresh_now().await.unwrap();
    let messages = f.thread.messages().await;
    assert_eq!(ids(&messages), vec![12, 13, 11]);
    assert_eq!(messages[2].sent_at, corrected);

    assert!(!f.thread.repair_sent_at(MessageId(11)).await.unwrap());
}

#[tokio::test]
async fn close_returns_to_idle() {
    let f = fixture();
    seed_dentist_thread(&f.transport).await;
    f.thread.open(DENTIST).await;
    f.thread.close().await;

    assert_eq!(f.thread.state().await, ThreadState::Idle);
    assert!(f.thread.messages().await.is_empty());
    assert_eq!(f.thread.refresh_now().await.unwrap(), RefreshOutcome::Skipped);
}
