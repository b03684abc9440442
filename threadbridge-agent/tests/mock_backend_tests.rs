// ABOUTME: Tests for the scripted mock backend.
// ABOUTME: Verifies reply ordering, error mapping, and concurrency tracking.

use std::sync::Arc;
use std::time::Duration;
use threadbridge_agent::{AssistantBackend, MockBackend, MockReply, RunError};

#[tokio::test]
async fn test_replies_are_consumed_in_order() {
    let mock = MockBackend::new()
        .then(MockReply::Text("  first  ".to_string()))
        .then(MockReply::Text("second".to_string()));

    assert_eq!(mock.run("a").await.unwrap(), "first");
    assert_eq!(mock.run("b").await.unwrap(), "second");
    assert_eq!(mock.run("c").await.unwrap(), "ok");
    assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_scripted_errors_map_to_run_errors() {
    let mock = MockBackend::new()
        .then(MockReply::Timeout)
        .then(MockReply::Launch("codex: not found".to_string()))
        .then(MockReply::Exit {
            code: 1,
            message: "error: bad model".to_string(),
        })
        .then(MockReply::Empty)
        .then(MockReply::Text("   ".to_string()));

    assert!(matches!(mock.run("p").await, Err(RunError::Timeout(_))));
    assert!(matches!(mock.run("p").await, Err(RunError::Launch(_))));
    match mock.run("p").await {
        Err(RunError::Exit { code, message }) => {
            assert_eq!(code, Some(1));
            assert_eq!(message, "error: bad model");
        }
        other => panic!("expected exit error, got {:?}", other),
    }
    assert!(matches!(mock.run("p").await, Err(RunError::EmptyResponse)));
    assert!(matches!(mock.run("p").await, Err(RunError::EmptyResponse)));
}

#[tokio::test(start_paused = true)]
async fn test_peak_concurrency_counts_overlapping_runs() {
    let mock = Arc::new(MockBackend::new().with_delay(Duration::from_millis(50)));

    let mut handles = Vec::new();
    for i in 0..4 {
        let mock = Arc::clone(&mock);
        handles.push(tokio::spawn(async move { mock.run(&format!("p{}", i)).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(mock.peak_concurrency(), 4);
}
