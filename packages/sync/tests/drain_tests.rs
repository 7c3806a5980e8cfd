//! Queue drain against the in-memory store

use std::sync::Arc;
use storyloom_editor::{
    Block, ChapterRef, ClosePolicy, EditSession, KeyId, Mutation, ParagraphNode, Place, SyncState,
};
use storyloom_sync::{InMemoryStore, SyncDriver};

fn chapter() -> ChapterRef {
    ChapterRef::new("story-1", "chapter-1")
}

fn seeded() -> (Arc<InMemoryStore>, EditSession) {
    let blocks: Vec<Block> = [("p1", "It was late."), ("p2", "Aria waited.")]
        .iter()
        .zip(Place::sequence(2))
        .map(|((key, text), place)| {
            Block::from_paragraph(&ParagraphNode::new(*key).with_text(*text), Some(place)).unwrap()
        })
        .collect();

    let store = Arc::new(InMemoryStore::new());
    store.load_chapter(&chapter(), blocks.clone());

    let mut session = EditSession::new("client-1");
    session.open_chapter(chapter(), &store.chapter_blocks(&chapter()));
    (store, session)
}

fn append(session: &mut EditSession, text: &str) -> KeyId {
    let commit = session
        .apply(Mutation::InsertParagraph {
            after: Some(KeyId::from("p2")),
            key_id: None,
            text: text.to_string(),
        })
        .unwrap();
    commit.changes.saves[0].key_id.clone()
}

#[tokio::test]
async fn test_drain_with_nothing_pending() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());

    let report = driver.drain(&mut session).await;

    assert_eq!(report.sent, 0);
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn test_drain_adopts_server_ids() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());
    let provisional = append(&mut session, "The door opened.");
    assert!(provisional.is_provisional());

    let report = driver.drain(&mut session).await;

    assert_eq!(report.sent, 1);
    assert_eq!(report.acked, 1);
    assert_eq!(report.assigned, 1);
    assert!(!session.has_pending_changes());

    let keys = session.key_ids();
    assert!(!keys[2].is_provisional());
    assert_eq!(session.queue().state(&chapter(), &keys[2]), SyncState::Clean);

    let stored = store.chapter_blocks(&chapter());
    let stored_keys: Vec<&KeyId> = stored.iter().map(|b| &b.key_id).collect();
    assert_eq!(stored_keys, keys.iter().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_failed_sends_retry_on_next_drain() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());
    session
        .apply(Mutation::InsertText {
            key_id: KeyId::from("p1"),
            offset: 0,
            text: "Now ".to_string(),
        })
        .unwrap();

    store.inject_failures(1);
    let first = driver.drain(&mut session).await;

    assert_eq!(first.failed, 1);
    assert!(session.has_pending_changes());
    assert_eq!(session.queue().state(&chapter(), &KeyId::from("p1")), SyncState::Failed);

    let second = driver.drain(&mut session).await;

    assert_eq!(second.acked, 1);
    assert!(!session.has_pending_changes());
    assert_eq!(store.request_count(), 2);
    let stored = store.chapter_blocks(&chapter());
    let paragraph = stored[0].to_paragraph().unwrap();
    assert_eq!(paragraph.text_content(), "Now It was late.");
}

#[tokio::test]
async fn test_edit_during_flight_stays_queued() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());
    session
        .apply(Mutation::InsertText {
            key_id: KeyId::from("p2"),
            offset: 12,
            text: " And waited.".to_string(),
        })
        .unwrap();

    let batch = session.take_batch();
    session
        .apply(Mutation::InsertText {
            key_id: KeyId::from("p2"),
            offset: 0,
            text: "Still, ".to_string(),
        })
        .unwrap();
    let outcomes = driver.send_batch(&batch).await;
    let report = driver.apply_outcomes(&mut session, outcomes);

    assert_eq!(report.acked, 1);
    assert!(session.has_pending_changes());
    assert_eq!(session.queue().state(&chapter(), &KeyId::from("p2")), SyncState::Queued);

    driver.drain(&mut session).await;
    let stored = store.chapter_blocks(&chapter());
    let paragraph = stored[1].to_paragraph().unwrap();
    assert_eq!(paragraph.text_content(), "Still, Aria waited. And waited.");
}

#[tokio::test]
async fn test_flush_on_close_sends_remaining_operations() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());
    session
        .apply(Mutation::RemoveParagraph {
            key_id: KeyId::from("p1"),
        })
        .unwrap();

    let closed = session.close_chapter(ClosePolicy::Flush);
    let report = driver.flush(&mut session, closed).await;

    assert_eq!(report.acked, 1);
    assert!(!session.has_pending_changes());
    let stored = store.chapter_blocks(&chapter());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key_id, KeyId::from("p2"));
}

#[tokio::test]
async fn test_outcome_after_discard_is_ignored() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());
    session
        .apply(Mutation::SetIndent {
            key_id: KeyId::from("p1"),
            indent: 2,
        })
        .unwrap();

    let batch = session.take_batch();
    session.close_chapter(ClosePolicy::Discard);
    store.inject_failures(1);
    let outcomes = driver.send_batch(&batch).await;
    let report = driver.apply_outcomes(&mut session, outcomes);

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    assert!(!session.has_pending_changes());
}

#[tokio::test]
async fn test_reopened_chapter_mints_fresh_keys() {
    let (store, mut session) = seeded();
    let driver = SyncDriver::new(store.clone());

    let first = append(&mut session, "First arrival.");
    driver.drain(&mut session).await;
    let closed = session.close_chapter(ClosePolicy::Flush);
    driver.flush(&mut session, closed).await;

    session.open_chapter(chapter(), &store.chapter_blocks(&chapter()));
    let commit = session
        .apply(Mutation::InsertParagraph {
            after: None,
            key_id: None,
            text: "Second arrival.".to_string(),
        })
        .unwrap();
    let second = commit.changes.saves[0].key_id.clone();
    driver.drain(&mut session).await;

    assert_ne!(first, second);
    assert!(!session.has_pending_changes());
    assert!(session.key_ids().iter().all(|key| !key.is_provisional()));

    let texts: Vec<String> = store
        .chapter_blocks(&chapter())
        .iter()
        .map(|block| block.to_paragraph().unwrap().text_content())
        .collect();
    assert_eq!(texts.len(), 4);
    assert!(texts.contains(&"First arrival.".to_string()));
    assert!(texts.contains(&"Second arrival.".to_string()));
    assert_eq!(session.key_ids().len(), 4);
}
