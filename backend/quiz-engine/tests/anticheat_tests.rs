use std::sync::Arc;
use std::time::Duration;

use quizegon_engine::models::{BlockedAction, QuizType, SessionEvent, SessionState, SubmitTrigger};
use quizegon_engine::services::anticheat_service::VISIBILITY_WARNING_MESSAGE;
use quizegon_engine::store::memory::MemoryStore;
use quizegon_engine::store::QuizStore;
use tokio::sync::mpsc::UnboundedReceiver;

mod common;

fn drain_events(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

async fn seed_monitored_quiz(store: &MemoryStore) {
    common::seed_basic_quiz(store).await;
    let mut quiz = common::manual_active_quiz(QuizType::MultipleChoice);
    quiz.anti_cheating_enabled = true;
    store.put_quiz(quiz).await;
}

#[tokio::test]
async fn test_visibility_losses_escalate_to_forced_submission() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    seed_monitored_quiz(&store).await;
    let service = common::session_service(&store);

    let session = service
        .login(common::QUIZ_ID, &common::login_request())
        .await
        .unwrap();
    let mut events = session.take_events().unwrap();
    session.confirm_start().await.unwrap();
    session.submit_answer("q1", "Paris").unwrap();

    // First loss warns, the session keeps running.
    assert_eq!(session.report_visibility_loss(), 1);
    assert_eq!(session.state(), SessionState::Active);

    // Second loss forces submission.
    assert_eq!(session.report_visibility_loss(), 2);
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.state() != SessionState::Submitted {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("second visibility loss should force submission");

    assert_eq!(store.result_count(common::QUIZ_ID).await, 1);
    let stored = store
        .fetch_result(common::QUIZ_ID, common::CONTACT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.score, 1);
    assert_eq!(stored.answered_count, 1);

    // The monitor is gone with the submission; further reports are no-ops.
    assert_eq!(session.report_visibility_loss(), 0);
    session.report_blocked_action(BlockedAction::Copy);
    assert_eq!(store.result_count(common::QUIZ_ID).await, 1);

    let collected = drain_events(&mut events);
    let warning = collected
        .iter()
        .find_map(|event| match event {
            SessionEvent::CheatingWarning(warning) => Some(warning),
            _ => None,
        })
        .expect("first loss should emit a warning");
    assert_eq!(warning.violation_count, 1);
    assert_eq!(warning.message, VISIBILITY_WARNING_MESSAGE);

    let forced = collected
        .iter()
        .find_map(|event| match event {
            SessionEvent::SubmissionForced(forced) => Some(forced),
            _ => None,
        })
        .expect("second loss should emit a forced-submission event");
    assert_eq!(forced.violation_count, 2);

    let submitted = collected
        .iter()
        .find_map(|event| match event {
            SessionEvent::Submitted(notice) => Some(notice),
            _ => None,
        })
        .expect("forced submission should settle the session");
    assert_eq!(submitted.summary.trigger, SubmitTrigger::AntiCheat);

    // One warning, one force; nothing after the monitor came down.
    let warnings = collected
        .iter()
        .filter(|event| matches!(event, SessionEvent::CheatingWarning(_)))
        .count();
    let forces = collected
        .iter()
        .filter(|event| matches!(event, SessionEvent::SubmissionForced(_)))
        .count();
    assert_eq!((warnings, forces), (1, 1));
}

#[tokio::test]
async fn test_blocked_actions_inform_without_escalation() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    seed_monitored_quiz(&store).await;
    let service = common::session_service(&store);

    let session = service
        .login(common::QUIZ_ID, &common::login_request())
        .await
        .unwrap();
    let mut events = session.take_events().unwrap();
    session.confirm_start().await.unwrap();

    session.report_blocked_action(BlockedAction::Copy);
    session.report_blocked_action(BlockedAction::Paste);
    session.report_blocked_action(BlockedAction::ContextMenu);

    assert_eq!(session.state(), SessionState::Active);
    // Blocked actions never touch the visibility counter.
    assert_eq!(session.report_visibility_loss(), 1);

    let collected = drain_events(&mut events);
    let blocked: Vec<BlockedAction> = collected
        .iter()
        .filter_map(|event| match event {
            SessionEvent::ActionBlocked(blocked) => Some(blocked.action),
            _ => None,
        })
        .collect();
    assert_eq!(
        blocked,
        vec![
            BlockedAction::Copy,
            BlockedAction::Paste,
            BlockedAction::ContextMenu
        ]
    );
    assert!(!collected
        .iter()
        .any(|event| matches!(event, SessionEvent::SubmissionForced(_))));
}

#[tokio::test]
async fn test_monitor_absent_when_quiz_flag_disabled() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    common::seed_basic_quiz(&store).await;
    let service = common::session_service(&store);

    let session = service
        .login(common::QUIZ_ID, &common::login_request())
        .await
        .unwrap();
    let mut events = session.take_events().unwrap();
    session.confirm_start().await.unwrap();

    assert_eq!(session.report_visibility_loss(), 0);
    assert_eq!(session.report_visibility_loss(), 0);
    session.report_blocked_action(BlockedAction::Paste);

    assert_eq!(session.state(), SessionState::Active);
    assert!(drain_events(&mut events).iter().all(|event| !matches!(
        event,
        SessionEvent::CheatingWarning(_)
            | SessionEvent::SubmissionForced(_)
            | SessionEvent::ActionBlocked(_)
    )));
}
