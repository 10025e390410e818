use super::agent_harness::{OPERATOR, harness, nick_locked, settle};
use grouplock::commands::Command;
use grouplock::transport::SessionEvent;
use std::collections::BTreeMap;
use std::time::Duration;

fn message(thread_id: &str, sender_id: &str, body: &str) -> SessionEvent {
    SessionEvent::Message {
        thread_id: thread_id.into(),
        sender_id: sender_id.into(),
        body: body.into(),
    }
}

fn nickname_change(thread_id: &str, member_id: &str, nickname: &str) -> SessionEvent {
    SessionEvent::NicknameChanged {
        thread_id: thread_id.into(),
        member_id: member_id.into(),
        nickname: nickname.into(),
        author_id: Some(member_id.into()),
    }
}

async fn wait_for_calls(session: &grouplock::testkit::FakeSession, thread_id: &str, n: usize) {
    for _ in 0..1_000 {
        if session.nickname_calls(thread_id).len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {n} nickname calls in {thread_id}");
}

#[tokio::test(start_paused = true)]
async fn operator_nicklock_renames_operator_first_then_members() {
    let h = harness(&[], |_| {});
    h.session.add_thread(
        "g1",
        Some("Group"),
        &[(OPERATOR, None), ("m1", Some("a")), ("m2", None), ("m3", Some("c"))],
    );

    h.enforcement
        .dispatch(message("g1", OPERATOR, "/nicklock on Z"))
        .await;
    wait_for_calls(&h.session, "g1", 4).await;
    settle(&h.enforcement, "g1").await;

    let calls = h.session.nickname_calls("g1");
    let order: Vec<&str> = calls.iter().map(|(member, _)| member.as_str()).collect();
    assert_eq!(order, vec![OPERATOR, "m1", "m2", "m3"]);
    assert!(calls.iter().all(|(_, nick)| nick == "Z"));

    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(policy.enabled);
    assert_eq!(policy.nick.as_deref(), Some("Z"));
    assert_eq!(policy.count, 3);
    assert_eq!(
        policy.original.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["m1", "m2", "m3"]
    );
    assert!(h.config.policy_store_path().exists());
}

#[tokio::test(start_paused = true)]
async fn commands_from_members_are_ignored() {
    let h = harness(&[], |_| {});
    h.session
        .add_thread("g1", None, &[(OPERATOR, None), ("m1", None)]);

    h.enforcement
        .dispatch(message("g1", "m1", "/nicklock on pwned"))
        .await;
    h.enforcement.dispatch(message("g1", "m1", "/gclock pwned")).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(h.session.calls().is_empty());
    assert!(h.enforcement.store().get("g1").is_none());
}

#[tokio::test(start_paused = true)]
async fn drifted_nickname_is_restored_from_snapshot() {
    let mut policy = nick_locked("Z");
    policy.original = BTreeMap::from([("m1".to_string(), "Custom".to_string())]);
    let h = harness(&[("g1", policy)], |_| {});
    h.session.add_thread("g1", None, &[("m1", Some("Custom")), ("m2", None)]);

    h.enforcement
        .dispatch(nickname_change("g1", "m1", "renamed"))
        .await;
    h.enforcement.dispatch(nickname_change("g1", "m2", "Z")).await;
    settle(&h.enforcement, "g1").await;

    assert_eq!(
        h.session.nickname_calls("g1"),
        vec![("m1".to_string(), "Custom".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn correction_limit_enters_cooldown_until_timer_resets_it() {
    let h = harness(&[("g1", nick_locked("Z"))], |config| {
        config.enforcement.nickname_change_limit = 2;
        config.enforcement.nickname_cooldown_secs = 300;
    });
    h.session.add_thread("g1", None, &[("m1", None)]);

    for nick in ["x", "y"] {
        h.enforcement.dispatch(nickname_change("g1", "m1", nick)).await;
        settle(&h.enforcement, "g1").await;
    }
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(policy.cooldown);
    assert_eq!(policy.count, 2);

    h.enforcement.dispatch(nickname_change("g1", "m1", "w")).await;
    settle(&h.enforcement, "g1").await;
    assert_eq!(h.session.nickname_calls("g1").len(), 2);

    tokio::time::sleep(Duration::from_secs(301)).await;
    settle(&h.enforcement, "g1").await;
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(!policy.cooldown);
    assert_eq!(policy.count, 0);

    h.enforcement.dispatch(nickname_change("g1", "m1", "v")).await;
    settle(&h.enforcement, "g1").await;
    assert_eq!(h.session.nickname_calls("g1").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn one_mutation_in_flight_across_conversations() {
    let h = harness(
        &[("g1", nick_locked("A")), ("g2", nick_locked("B"))],
        |_| {},
    );
    h.session.add_thread("g1", None, &[("a1", None), ("a2", None)]);
    h.session.add_thread("g2", None, &[("b1", None), ("b2", None)]);

    for (conv, member) in [("g1", "a1"), ("g2", "b1"), ("g1", "a2"), ("g2", "b2")] {
        h.enforcement
            .dispatch(nickname_change(conv, member, "drift"))
            .await;
    }
    settle(&h.enforcement, "g1").await;
    settle(&h.enforcement, "g2").await;

    assert_eq!(h.session.nickname_calls("g1").len(), 2);
    assert_eq!(h.session.nickname_calls("g2").len(), 2);
    assert_eq!(h.session.peak_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn newcomer_is_captured_and_renamed_and_leaver_dropped() {
    let mut policy = nick_locked("Z");
    policy.original = BTreeMap::from([("m1".to_string(), "Z".to_string())]);
    let h = harness(&[("g1", policy)], |_| {});
    h.session.add_thread("g1", None, &[("m1", Some("Z")), ("m2", None)]);

    h.enforcement
        .dispatch(SessionEvent::MembersJoined {
            thread_id: "g1".into(),
            member_ids: vec!["m2".into(), OPERATOR.into()],
        })
        .await;
    settle(&h.enforcement, "g1").await;

    assert_eq!(
        h.session.nickname_calls("g1"),
        vec![("m2".to_string(), "Z".to_string())]
    );
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(policy.original.contains_key("m2"));
    assert!(!policy.original.contains_key(OPERATOR));

    h.enforcement
        .dispatch(SessionEvent::MemberLeft {
            thread_id: "g1".into(),
            member_id: "m1".into(),
        })
        .await;
    assert!(
        !h.enforcement
            .store()
            .get("g1")
            .unwrap()
            .original
            .contains_key("m1")
    );
}

#[tokio::test(start_paused = true)]
async fn nicklock_off_stops_corrections_but_keeps_snapshot() {
    let h = harness(&[], |_| {});
    h.session.add_thread("g1", None, &[(OPERATOR, None), ("m1", None)]);

    h.enforcement
        .execute_command("g1", Command::NickLockOn { nickname: Some("Z".into()) })
        .await
        .unwrap();
    settle(&h.enforcement, "g1").await;
    h.enforcement
        .execute_command("g1", Command::NickLockOff)
        .await
        .unwrap();
    let before = h.session.nickname_calls("g1").len();

    h.enforcement.dispatch(nickname_change("g1", "m1", "free")).await;
    settle(&h.enforcement, "g1").await;

    assert_eq!(h.session.nickname_calls("g1").len(), before);
    let policy = h.enforcement.store().get("g1").unwrap();
    assert!(!policy.enabled);
    assert_eq!(policy.nick.as_deref(), Some("Z"));
    assert!(policy.original.contains_key("m1"));
}

#[tokio::test(start_paused = true)]
async fn periodic_resync_repairs_drift_missed_by_the_stream() {
    let h = harness(&[("g1", nick_locked("Z"))], |_| {});
    h.session
        .add_thread("g1", None, &[(OPERATOR, Some("Z")), ("m1", Some("Z")), ("m2", Some("old"))]);

    h.enforcement.resync().await;
    settle(&h.enforcement, "g1").await;

    assert_eq!(
        h.session.nickname_calls("g1"),
        vec![("m2".to_string(), "Z".to_string())]
    );
    let policy = h.enforcement.store().get("g1").unwrap();
    assert_eq!(policy.original.len(), 2);
}
