//! Integration tests for ThreadpostService
//!
//! Exercises the service layer as a whole with the mock API and an
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use libthreadpost::api::mock::MockApi;
use libthreadpost::error::{ApiError, ThreadpostError, ValidationError};
use libthreadpost::service::events::Event;
use libthreadpost::service::ThreadpostService;
use libthreadpost::store::{LocalStore, MemoryStore, DRAFTS_KEY};
use libthreadpost::{Config, FormatStyle, PostDraft};

fn setup(api: MockApi) -> (Arc<MockApi>, Arc<MemoryStore>, ThreadpostService) {
    let api = Arc::new(api);
    let store = Arc::new(MemoryStore::new());
    let service = ThreadpostService::with_parts(Config::default(), api.clone(), store.clone());
    (api, store, service)
}

async fn login(service: &ThreadpostService) {
    service
        .session()
        .authenticate("@alice.bsky.social", "abcd-efgh-ijkl-mnop")
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_styled_thread_is_posted_in_order() {
    let (api, _store, service) = setup(MockApi::success());
    login(&service).await;

    let mut composer = service.composer();
    composer.set_content(0, "Intro").unwrap();
    composer.set_style(0, FormatStyle::Bold).unwrap();
    composer.set_content(1, "middle").unwrap();
    composer.set_content(2, "end").unwrap();
    composer.set_style(2, FormatStyle::Italic).unwrap();

    let outcome = service.post_composer(&mut composer, None).await.unwrap();
    assert_eq!(outcome.posted, 3);

    let texts: Vec<String> = api.records().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["𝐈𝐧𝐭𝐫𝐨", "middle", "𝑒𝑛𝑑"]);

    let records = api.records();
    let root = api.reference_for(0);
    assert_eq!(records[2].reply.as_ref().unwrap().root, root);
    assert_eq!(records[2].reply.as_ref().unwrap().parent, api.reference_for(1));
}

#[tokio::test(start_paused = true)]
async fn test_over_length_thread_is_rejected_before_posting() {
    let (api, _store, service) = setup(MockApi::success());
    login(&service).await;

    let bodies = vec!["ok".to_string(), "x".repeat(301), "y".repeat(400)];
    let err = service.post_thread(&bodies, None).await.unwrap_err();

    match err {
        ThreadpostError::Validation(ValidationError::TooLong { posts, .. }) => {
            let reported: Vec<(usize, usize)> =
                posts.iter().map(|p| (p.index, p.length)).collect();
            assert_eq!(reported, vec![(2, 301), (3, 400)]);
        }
        other => panic!("Expected TooLong, got {:?}", other),
    }
    assert_eq!(api.record_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_keeps_drafts_for_retry() {
    let (api, store, service) = setup(MockApi::fail_on_call(
        3,
        ApiError::RateLimit("Rate Limit Exceeded".to_string()),
    ));
    login(&service).await;

    let mut composer = service.composer();
    for (i, text) in ["one", "two", "three", "four", "five"].iter().enumerate() {
        composer.set_content(i, text).unwrap();
    }

    let err = service.post_composer(&mut composer, None).await.unwrap_err();
    match &err {
        ThreadpostError::ThreadPost(e) => {
            assert_eq!((e.posted, e.total), (2, 5));
            assert!(e.to_string().contains("Rate limit exceeded"));
        }
        other => panic!("Expected ThreadPost error, got {:?}", other),
    }
    assert_eq!(api.record_call_count(), 3);

    assert!(store.get(DRAFTS_KEY).unwrap().is_some());
    assert_eq!(service.drafts().load().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_reach_subscribers() {
    let (_api, _store, service) = setup(MockApi::with_delay(Duration::from_millis(200)));
    login(&service).await;
    let mut events = service.subscribe();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(event) = events.recv().await {
            let done = event.is_terminal();
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    });

    service
        .post_thread(&["a", "b", "c"], None)
        .await
        .unwrap();
    let seen = handle.await.unwrap();

    let progress: Vec<usize> = seen
        .iter()
        .filter_map(|e| match e {
            Event::PostProgress { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3]);
    assert!(matches!(seen.last(), Some(Event::ThreadCompleted { posted: 3, .. })));
}

#[tokio::test]
async fn test_saved_drafts_survive_restart() {
    let store = Arc::new(MemoryStore::new());
    let first = ThreadpostService::with_parts(
        Config::default(),
        Arc::new(MockApi::success()),
        store.clone(),
    );
    first.drafts().save(&[
        PostDraft::new(0, "a"),
        PostDraft::new(1, "  "),
        PostDraft::new(2, "b").with_style(FormatStyle::Script),
    ]);

    let second =
        ThreadpostService::with_parts(Config::default(), Arc::new(MockApi::success()), store);
    let loaded = second.drafts().load();
    assert_eq!(
        loaded,
        vec![
            PostDraft::new(0, "a"),
            PostDraft::new(2, "b").with_style(FormatStyle::Script),
        ]
    );
}

#[tokio::test]
async fn test_logout_flow() {
    let (_api, store, service) = setup(MockApi::success());
    login(&service).await;
    assert!(service.session().is_authenticated());

    service.session().end_session();
    service.session().forget_credentials();

    assert!(!service.session().is_authenticated());
    assert!(store.is_empty());
}
