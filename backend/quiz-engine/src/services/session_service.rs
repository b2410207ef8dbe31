use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;
use validator::Validate;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::metrics::{ANSWERS_RECORDED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::{
    ActionBlocked, BlockedAction, Candidate, CandidateLoginRequest, CandidateQuestion,
    CheatingWarning, Question, QuestionProgress, Quiz, QuizResult, ResultSummary, SessionEvent,
    SessionProgress, SessionState, StartedSession, SubmissionFailed, SubmissionForced,
    SubmitTrigger, SubmittedNotice, TimeExpired, TimerTick,
};
use crate::services::answer_ledger::AnswerLedger;
use crate::services::anticheat_service::{AnticheatMonitor, VISIBILITY_WARNING_MESSAGE};
use crate::services::scoring_service::{score_attempt, ScoreBreakdown};
use crate::services::selection_service;
use crate::services::session_clock::SessionClock;
use crate::store::{QuizStore, StoreError};
use crate::utils::retry::{retry_async_if, RetryConfig};

/// Entry point for candidates. Validates a login against the quiz window,
/// the roster and the one-submission rule, and hands back a live session.
pub struct SessionService {
    store: Arc<dyn QuizStore>,
    submit_retry: RetryConfig,
}

impl SessionService {
    pub fn new(store: Arc<dyn QuizStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            submit_retry: config.submit_retry(),
        }
    }

    /// Authenticates a candidate. Checks run in a fixed order: quiz exists,
    /// window open, credentials match, no prior submission. Attendance is
    /// stamped with the store's clock before any question is revealed.
    pub async fn login(
        &self,
        quiz_id: &str,
        req: &CandidateLoginRequest,
    ) -> Result<QuizSession, EngineError> {
        req.validate()?;

        let quiz = self.store.fetch_quiz(quiz_id).await?.ok_or_else(|| {
            tracing::warn!("Login rejected, quiz not found: quiz={}", quiz_id);
            EngineError::QuizNotFound(quiz_id.to_string())
        })?;

        let now = Utc::now();
        if !quiz.availability.is_open_at(now) {
            tracing::warn!(
                "Login rejected, quiz not open: quiz={}, status={:?}",
                quiz_id,
                quiz.availability.status_at(now)
            );
            return Err(EngineError::QuizNotActive);
        }

        let candidate = self
            .store
            .find_candidate(quiz_id, &req.contact)
            .await?
            .filter(|candidate| candidate.credential == req.credential)
            .ok_or_else(|| {
                tracing::warn!(
                    "Login rejected, bad credentials: quiz={}, contact={}",
                    quiz_id,
                    req.contact
                );
                EngineError::InvalidCredentials
            })?;

        if self
            .store
            .fetch_result(quiz_id, &candidate.contact)
            .await?
            .is_some()
        {
            tracing::warn!(
                "Login rejected, result already submitted: quiz={}, contact={}",
                quiz_id,
                candidate.contact
            );
            return Err(EngineError::DuplicateSubmission);
        }

        let session_start_time = self.store.begin_attendance(quiz_id, &candidate.contact).await?;

        let session_id = Uuid::new_v4().to_string();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Candidate logged in: session={}, quiz={}, contact={}",
            session_id,
            quiz_id,
            candidate.contact
        );

        let shared = Arc::new(SessionShared {
            session_id,
            quiz,
            candidate,
            session_start_time,
            store: Arc::clone(&self.store),
            submit_retry: self.submit_retry.clone(),
            events: events_tx,
            remaining_seconds: AtomicU32::new(0),
            core: Mutex::new(SessionCore {
                state: SessionState::AwaitingConfirmation,
                ledger: AnswerLedger::new(),
                questions: Vec::new(),
                clock: None,
                monitor: None,
                pending: None,
                persist_in_flight: false,
            }),
        });

        Ok(QuizSession {
            shared,
            events: Mutex::new(Some(events_rx)),
        })
    }
}

/// A logged-in candidate session. Starts in `AwaitingConfirmation`; the
/// paper is drawn and the clock armed by `confirm_start`. All three submit
/// triggers (manual, timer, anticheat) converge on one guarded path, so the
/// result document is written at most once.
pub struct QuizSession {
    shared: Arc<SessionShared>,
    events: Mutex<Option<UnboundedReceiver<SessionEvent>>>,
}

impl std::fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("session_id", &self.shared.session_id)
            .finish_non_exhaustive()
    }
}

struct SessionShared {
    session_id: String,
    quiz: Quiz,
    candidate: Candidate,
    session_start_time: DateTime<Utc>,
    store: Arc<dyn QuizStore>,
    submit_retry: RetryConfig,
    events: UnboundedSender<SessionEvent>,
    /// Mirrors the clock so readers never contend with the core lock.
    remaining_seconds: AtomicU32,
    core: Mutex<SessionCore>,
}

struct SessionCore {
    state: SessionState,
    ledger: AnswerLedger,
    questions: Vec<Question>,
    clock: Option<SessionClock>,
    monitor: Option<Arc<AnticheatMonitor>>,
    pending: Option<PendingSubmission>,
    persist_in_flight: bool,
}

/// Snapshot claimed at the submit transition. Kept until the write lands so
/// a retried submission persists the same answers, totals and trigger.
#[derive(Clone)]
struct PendingSubmission {
    answers: BTreeMap<String, String>,
    breakdown: ScoreBreakdown,
    submitted_at: DateTime<Utc>,
    trigger: SubmitTrigger,
}

impl QuizSession {
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn quiz(&self) -> &Quiz {
        &self.shared.quiz
    }

    pub fn candidate(&self) -> &Candidate {
        &self.shared.candidate
    }

    pub fn session_start_time(&self) -> DateTime<Utc> {
        self.shared.session_start_time
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock_core().state
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.shared.remaining_seconds.load(Ordering::Relaxed)
    }

    /// Hands out the event stream. Yields `None` after the first call.
    pub fn take_events(&self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Draws the paper, starts the clock and arms the anticheat monitor.
    /// Rejects when the quiz window lapsed since login (`Expired`) or the
    /// banks are empty (`Rejected`); both are terminal.
    pub async fn confirm_start(&self) -> Result<StartedSession, EngineError> {
        let shared = &self.shared;

        {
            let core = shared.lock_core();
            if core.state != SessionState::AwaitingConfirmation {
                return Err(EngineError::IllegalState(format!(
                    "session is {}",
                    core.state
                )));
            }
        }

        // The window may have closed between login and confirmation.
        let now = Utc::now();
        if !shared.quiz.availability.is_open_at(now) {
            let mut core = shared.lock_core();
            if core.state == SessionState::AwaitingConfirmation {
                core.state = SessionState::Expired;
                SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
                tracing::warn!(
                    "Quiz window closed before confirmation: session={}, quiz={}",
                    shared.session_id,
                    shared.quiz.id
                );
            }
            return Err(EngineError::QuizNotActive);
        }

        let partitions = shared.store.load_question_partitions(&shared.quiz.id).await?;
        let selection = selection_service::select_questions(
            partitions,
            shared.quiz.fixed_question_count,
            shared.quiz.pool_question_count,
        );

        if selection.questions.is_empty() {
            let mut core = shared.lock_core();
            if core.state == SessionState::AwaitingConfirmation {
                core.state = SessionState::Rejected;
                SESSIONS_TOTAL.with_label_values(&["rejected"]).inc();
                tracing::warn!(
                    "No questions available: session={}, quiz={}",
                    shared.session_id,
                    shared.quiz.id
                );
            }
            return Err(EngineError::NoQuestionsAvailable);
        }

        let duration_seconds = shared.quiz.duration_seconds;
        let started = {
            let mut core = shared.lock_core();
            if core.state != SessionState::AwaitingConfirmation {
                return Err(EngineError::IllegalState(format!(
                    "session is {}",
                    core.state
                )));
            }

            let questions: Vec<CandidateQuestion> =
                selection.questions.iter().map(CandidateQuestion::from).collect();
            core.questions = selection.questions;
            shared.remaining_seconds.store(duration_seconds, Ordering::Relaxed);

            let tick_shared = Arc::clone(shared);
            let expire_shared = Arc::clone(shared);
            core.clock = Some(SessionClock::start(
                duration_seconds,
                move |remaining| {
                    tick_shared
                        .remaining_seconds
                        .store(remaining, Ordering::Relaxed);
                    tick_shared.post_event(SessionEvent::TimerTick(TimerTick {
                        session_id: tick_shared.session_id.clone(),
                        remaining_seconds: remaining,
                        timestamp: Utc::now(),
                    }));
                },
                move || {
                    expire_shared.post_event(SessionEvent::TimeExpired(TimeExpired {
                        session_id: expire_shared.session_id.clone(),
                        message: "Time limit exceeded".to_string(),
                        timestamp: Utc::now(),
                    }));
                    let submit_shared = Arc::clone(&expire_shared);
                    tokio::spawn(async move {
                        let _ = submit_shared
                            .submit_with_trigger(SubmitTrigger::TimeExpired)
                            .await;
                    });
                },
            ));

            if shared.quiz.anti_cheating_enabled {
                core.monitor = Some(Arc::new(shared.arm_monitor()));
            }

            core.state = SessionState::Active;
            SESSIONS_TOTAL.with_label_values(&["started"]).inc();
            SESSIONS_ACTIVE.inc();

            StartedSession {
                session_id: shared.session_id.clone(),
                questions,
                duration_seconds,
                fixed_shortfall: selection.fixed_shortfall,
                pool_shortfall: selection.pool_shortfall,
            }
        };

        tracing::info!(
            "Session started: session={}, quiz={}, questions={}, duration={}s",
            shared.session_id,
            shared.quiz.id,
            started.questions.len(),
            duration_seconds
        );
        Ok(started)
    }

    /// Records an answer. Valid only while the session is `Active`.
    pub fn submit_answer(&self, question_id: &str, answer: &str) -> Result<(), EngineError> {
        let mut core = self.shared.lock_core();
        if core.state != SessionState::Active {
            return Err(EngineError::IllegalState(format!(
                "session is {}",
                core.state
            )));
        }
        core.ledger.set_answer(question_id, answer)?;
        ANSWERS_RECORDED_TOTAL.inc();
        Ok(())
    }

    /// Flips the review mark on a question.
    pub fn toggle_mark(&self, question_id: &str) -> Result<bool, EngineError> {
        let mut core = self.shared.lock_core();
        if core.state != SessionState::Active {
            return Err(EngineError::IllegalState(format!(
                "session is {}",
                core.state
            )));
        }
        core.ledger.toggle_mark(question_id)
    }

    pub fn progress(&self) -> SessionProgress {
        let core = self.shared.lock_core();
        SessionProgress {
            session_id: self.shared.session_id.clone(),
            state: core.state,
            remaining_seconds: self.shared.remaining_seconds.load(Ordering::Relaxed),
            answered_count: core.ledger.answered_count(),
            total_questions: core.questions.len() as u32,
            questions: core
                .questions
                .iter()
                .map(|q| QuestionProgress {
                    question_id: q.id.clone(),
                    answered: core.ledger.is_answered(&q.id),
                    marked: core.ledger.is_marked(&q.id),
                })
                .collect(),
        }
    }

    /// Forwards a visibility loss to the monitor. Returns the running count;
    /// zero when no monitor is armed.
    pub fn report_visibility_loss(&self) -> u32 {
        let monitor = self.shared.lock_core().monitor.clone();
        match monitor {
            Some(monitor) => monitor.record_visibility_loss(),
            None => 0,
        }
    }

    pub fn report_blocked_action(&self, action: BlockedAction) {
        let monitor = self.shared.lock_core().monitor.clone();
        if let Some(monitor) = monitor {
            monitor.record_blocked_action(action);
        }
    }

    /// Candidate-initiated submission. `Ok(None)` means another trigger
    /// already claimed the session or it is already settled.
    pub async fn submit(&self) -> Result<Option<ResultSummary>, EngineError> {
        self.shared.submit_with_trigger(SubmitTrigger::Manual).await
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        let (clock, monitor) = {
            let mut core = self.shared.lock_core();
            (core.clock.take(), core.monitor.take())
        };
        if let Some(clock) = clock {
            clock.cancel();
        }
        if let Some(monitor) = monitor {
            monitor.disarm();
        }
    }
}

impl SessionShared {
    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post_event(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(
                "Session event dropped, receiver closed: session={}",
                self.session_id
            );
        }
    }

    fn arm_monitor(self: &Arc<Self>) -> AnticheatMonitor {
        let warn_shared = Arc::clone(self);
        let force_shared = Arc::clone(self);
        let blocked_shared = Arc::clone(self);
        AnticheatMonitor::arm(
            move |count| {
                warn_shared.post_event(SessionEvent::CheatingWarning(CheatingWarning {
                    session_id: warn_shared.session_id.clone(),
                    violation_count: count,
                    message: VISIBILITY_WARNING_MESSAGE.to_string(),
                    timestamp: Utc::now(),
                }));
            },
            move |count| {
                force_shared.post_event(SessionEvent::SubmissionForced(SubmissionForced {
                    session_id: force_shared.session_id.clone(),
                    violation_count: count,
                    message: "Visibility lost twice. The quiz is being submitted automatically."
                        .to_string(),
                    timestamp: Utc::now(),
                }));
                let submit_shared = Arc::clone(&force_shared);
                tokio::spawn(async move {
                    let _ = submit_shared
                        .submit_with_trigger(SubmitTrigger::AntiCheat)
                        .await;
                });
            },
            move |action| {
                blocked_shared.post_event(SessionEvent::ActionBlocked(ActionBlocked {
                    session_id: blocked_shared.session_id.clone(),
                    action,
                    timestamp: Utc::now(),
                }));
            },
        )
    }

    /// Single entry point for all submit triggers. The first caller to
    /// claim an `Active` session stops the clock, disarms the monitor and
    /// seals the ledger before snapshotting; everyone else gets `Ok(None)`.
    /// The claimed snapshot survives transient storage failures and is
    /// retried by later calls.
    async fn submit_with_trigger(
        &self,
        trigger: SubmitTrigger,
    ) -> Result<Option<ResultSummary>, EngineError> {
        let pending = {
            let mut core = self.lock_core();
            match core.state {
                SessionState::Active => {
                    if let Some(clock) = core.clock.take() {
                        clock.cancel();
                    }
                    if let Some(monitor) = core.monitor.take() {
                        monitor.disarm();
                    }
                    core.ledger.seal();
                    core.state = SessionState::Submitting;
                    SESSIONS_ACTIVE.dec();

                    let answers = core.ledger.snapshot();
                    let breakdown = score_attempt(
                        &core.questions,
                        &answers,
                        self.quiz.quiz_type,
                        &BTreeMap::new(),
                    );
                    let pending = PendingSubmission {
                        answers,
                        breakdown,
                        submitted_at: Utc::now(),
                        trigger,
                    };
                    core.pending = Some(pending.clone());
                    core.persist_in_flight = true;
                    pending
                }
                SessionState::Submitting => {
                    if core.persist_in_flight {
                        return Ok(None);
                    }
                    // A previous attempt failed; retry the claimed snapshot.
                    match core.pending.clone() {
                        Some(pending) => {
                            core.persist_in_flight = true;
                            pending
                        }
                        None => return Ok(None),
                    }
                }
                state if state.is_terminal() => return Ok(None),
                state => {
                    return Err(EngineError::IllegalState(format!("session is {}", state)));
                }
            }
        };

        tracing::info!(
            "Submitting session: session={}, trigger={}, answered={}/{}",
            self.session_id,
            pending.trigger.as_str(),
            pending.breakdown.answered_count,
            pending.breakdown.total_questions
        );

        let result = self.build_result(&pending);
        let outcome = retry_async_if(self.submit_retry.clone(), StoreError::is_transient, || async {
            self.store.create_result(&self.quiz.id, &result).await
        })
        .await;

        match outcome {
            Ok(()) => Ok(Some(self.finalize_submitted(&pending))),
            Err(StoreError::AlreadyExists { .. }) => {
                self.resolve_submission_conflict(pending).await
            }
            Err(e) => {
                {
                    let mut core = self.lock_core();
                    core.persist_in_flight = false;
                }
                tracing::error!(
                    "Failed to persist submission: session={}, error={:#?}",
                    self.session_id,
                    e
                );
                self.post_event(SessionEvent::SubmissionFailed(SubmissionFailed {
                    session_id: self.session_id.clone(),
                    message: "The submission could not be saved. Please try again.".to_string(),
                    timestamp: Utc::now(),
                }));
                Err(EngineError::Persistence(e))
            }
        }
    }

    /// A duplicate key can be this session's own earlier write resurfacing
    /// after a retried request. Matching start stamp and answers identify
    /// the stored document as ours; anything else is a genuine conflict.
    async fn resolve_submission_conflict(
        &self,
        pending: PendingSubmission,
    ) -> Result<Option<ResultSummary>, EngineError> {
        match self
            .store
            .fetch_result(&self.quiz.id, &self.candidate.contact)
            .await
        {
            Ok(Some(existing))
                if existing.session_start_time == self.session_start_time
                    && existing.answers == pending.answers =>
            {
                Ok(Some(self.finalize_submitted(&pending)))
            }
            Ok(_) => {
                {
                    let mut core = self.lock_core();
                    core.state = SessionState::Rejected;
                    core.pending = None;
                    core.persist_in_flight = false;
                }
                SESSIONS_TOTAL.with_label_values(&["rejected"]).inc();
                tracing::warn!(
                    "Submission rejected, another result already stored: session={}, contact={}",
                    self.session_id,
                    self.candidate.contact
                );
                Err(EngineError::DuplicateSubmission)
            }
            Err(e) => {
                {
                    let mut core = self.lock_core();
                    core.persist_in_flight = false;
                }
                tracing::error!(
                    "Failed to inspect conflicting result: session={}, error={:#?}",
                    self.session_id,
                    e
                );
                self.post_event(SessionEvent::SubmissionFailed(SubmissionFailed {
                    session_id: self.session_id.clone(),
                    message: "The submission could not be saved. Please try again.".to_string(),
                    timestamp: Utc::now(),
                }));
                Err(EngineError::Persistence(e))
            }
        }
    }

    fn finalize_submitted(&self, pending: &PendingSubmission) -> ResultSummary {
        {
            let mut core = self.lock_core();
            core.state = SessionState::Submitted;
            core.pending = None;
            core.persist_in_flight = false;
        }
        SESSIONS_TOTAL.with_label_values(&["submitted"]).inc();
        SUBMISSIONS_TOTAL
            .with_label_values(&[pending.trigger.as_str()])
            .inc();
        tracing::info!(
            "Session submitted: session={}, trigger={}, score={}/{}",
            self.session_id,
            pending.trigger.as_str(),
            pending.breakdown.score,
            pending.breakdown.total_possible_score
        );

        let summary = ResultSummary {
            result_id: self.candidate.contact.clone(),
            trigger: pending.trigger,
            score: pending.breakdown.score,
            total_possible_score: pending.breakdown.total_possible_score,
            priority_score: pending.breakdown.priority_score,
            answered_count: pending.breakdown.answered_count,
            total_questions: pending.breakdown.total_questions,
            submitted_at: pending.submitted_at,
        };
        self.post_event(SessionEvent::Submitted(SubmittedNotice {
            session_id: self.session_id.clone(),
            summary: summary.clone(),
            timestamp: Utc::now(),
        }));
        summary
    }

    fn build_result(&self, pending: &PendingSubmission) -> QuizResult {
        QuizResult {
            id: self.candidate.contact.clone(),
            candidate_id: self.candidate.id.clone(),
            answers: pending.answers.clone(),
            score: pending.breakdown.score,
            total_possible_score: pending.breakdown.total_possible_score,
            priority_score: pending.breakdown.priority_score,
            answered_count: pending.breakdown.answered_count,
            total_questions: pending.breakdown.total_questions,
            session_start_time: self.session_start_time,
            submitted_at: pending.submitted_at,
            overrides: BTreeMap::new(),
        }
    }
}
