use super::agent_harness::{OPERATOR, harness, title_locked};
use grouplock::enforcement::TitleState;
use grouplock::transport::SessionEvent;
use std::time::Duration;

const REVERT_WINDOW: Duration = Duration::from_secs(47);

async fn let_reverts_finish() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn rename_is_reverted_only_after_the_grace_window() {
    let h = harness(&[("g1", title_locked("Alpha"))], |_| {});
    h.session.add_thread("g1", Some("Alpha"), &[(OPERATOR, None)]);

    h.enforcement.poll_titles().await;
    assert_eq!(h.enforcement.watchdog().state("g1"), TitleState::Stable);

    h.session.rename_externally("g1", "Beta");
    h.enforcement.poll_titles().await;
    assert!(matches!(
        h.enforcement.watchdog().state("g1"),
        TitleState::Detected { .. }
    ));

    tokio::time::sleep(REVERT_WINDOW - Duration::from_secs(1)).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;
    assert!(h.session.title_calls().is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;

    assert_eq!(h.session.title_calls(), vec!["Alpha".to_string()]);
    assert_eq!(h.session.title_of("g1").as_deref(), Some("Alpha"));
    assert_eq!(h.enforcement.watchdog().state("g1"), TitleState::Stable);
}

#[tokio::test(start_paused = true)]
async fn rename_back_inside_the_window_cancels_the_revert() {
    let h = harness(&[("g1", title_locked("Alpha"))], |_| {});
    h.session.add_thread("g1", Some("Alpha"), &[]);

    h.session.rename_externally("g1", "Beta");
    h.enforcement.poll_titles().await;
    tokio::time::sleep(Duration::from_secs(20)).await;

    h.session.rename_externally("g1", "Alpha");
    h.enforcement.poll_titles().await;
    assert_eq!(h.enforcement.watchdog().state("g1"), TitleState::Stable);

    tokio::time::sleep(REVERT_WINDOW).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;
    assert!(h.session.title_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rename_event_starts_the_window_before_the_next_poll() {
    let h = harness(&[("g1", title_locked("Alpha"))], |_| {});
    h.session.add_thread("g1", Some("Alpha"), &[]);

    h.session.rename_externally("g1", "Beta");
    h.enforcement
        .dispatch(SessionEvent::TitleChanged {
            thread_id: "g1".into(),
            title: "Beta".into(),
            author_id: Some("m1".into()),
        })
        .await;
    assert!(matches!(
        h.enforcement.watchdog().state("g1"),
        TitleState::Detected { .. }
    ));

    tokio::time::sleep(REVERT_WINDOW).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;
    assert_eq!(h.session.title_calls(), vec!["Alpha".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn gclock_with_title_applies_it_immediately() {
    let h = harness(&[], |_| {});
    h.session.add_thread("g1", Some("Old"), &[(OPERATOR, None)]);

    h.enforcement
        .dispatch(SessionEvent::Message {
            thread_id: "g1".into(),
            sender_id: OPERATOR.into(),
            body: "/gclock Fortress".into(),
        })
        .await;
    let_reverts_finish().await;

    assert_eq!(h.session.title_calls(), vec!["Fortress".to_string()]);
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(policy.gclock);
    assert_eq!(policy.group_name.as_deref(), Some("Fortress"));
}

#[tokio::test(start_paused = true)]
async fn unlock_stops_title_enforcement() {
    let h = harness(&[("g1", title_locked("Alpha"))], |_| {});
    h.session.add_thread("g1", Some("Alpha"), &[(OPERATOR, None)]);

    h.enforcement
        .dispatch(SessionEvent::Message {
            thread_id: "g1".into(),
            sender_id: OPERATOR.into(),
            body: "/unlockgname".into(),
        })
        .await;
    let_reverts_finish().await;

    h.session.rename_externally("g1", "Beta");
    h.enforcement.poll_titles().await;
    tokio::time::sleep(REVERT_WINDOW * 2).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;

    assert!(h.session.title_calls().is_empty());
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(!policy.gclock);
    assert_eq!(policy.group_name.as_deref(), Some("Alpha"));
}

#[tokio::test(start_paused = true)]
async fn rejected_revert_is_retried_on_a_later_window() {
    let h = harness(&[("g1", title_locked("Alpha"))], |_| {});
    h.session.add_thread("g1", Some("Beta"), &[]);
    h.session.fail_titles(true);

    h.enforcement.poll_titles().await;
    tokio::time::sleep(REVERT_WINDOW).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;
    assert_eq!(h.session.title_calls().len(), 1);
    assert_eq!(h.enforcement.watchdog().state("g1"), TitleState::Stable);

    h.session.fail_titles(false);
    h.enforcement.poll_titles().await;
    tokio::time::sleep(REVERT_WINDOW).await;
    h.enforcement.poll_titles().await;
    let_reverts_finish().await;

    assert_eq!(h.session.title_calls().len(), 2);
    assert_eq!(h.session.title_of("g1").as_deref(), Some("Alpha"));
}
