// src/runtime/session.rs

//! Hosts attempt engines for the HTTP layer.
//!
//! Each session owns a countdown task that ticks its engine once per period.
//! Persistence runs on its own task so a dropped request or an aborted
//! countdown cannot leave an attempt stuck in `Submitting`.
//!
//! The registry sweeps sessions nobody is looking at: an active attempt left
//! unobserved past the idle window is abandoned without being recorded, and a
//! finished one is released after its retention window.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    engine::{
        attempt::{AttemptEngine, AttemptError, AttemptResult, Phase, Submission},
        clock::Clock,
    },
    models::{question::PublicQuestion, quiz::Quiz},
    repository::QuizRepository,
    runtime::MIN_PERIOD,
};

/// Snapshot of a session as rendered to the student.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub attempt_id: Uuid,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub student_name: String,
    pub phase: Phase,
    pub question_index: usize,
    pub question_count: usize,
    /// Present only while the attempt is active.
    pub question: Option<PublicQuestion>,
    pub selected_answer: Option<usize>,
    pub time_limit: u32,
    pub time_remaining_secs: u32,
    pub result: Option<AttemptResult>,
}

pub struct AttemptSession {
    pub id: Uuid,
    engine: Mutex<AttemptEngine>,
    repo: Arc<dyn QuizRepository>,
    countdown: Mutex<Option<JoinHandle<()>>>,
    last_observed: Mutex<Instant>,
}

impl AttemptSession {
    /// Starts the engine and its countdown.
    pub async fn start(
        quiz: Quiz,
        student_name: String,
        repo: Arc<dyn QuizRepository>,
        clock: Arc<dyn Clock>,
        tick_period: Duration,
    ) -> Result<Arc<Self>, AttemptError> {
        let engine = AttemptEngine::start(quiz, student_name, clock)?;
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            engine: Mutex::new(engine),
            repo,
            countdown: Mutex::new(None),
            last_observed: Mutex::new(Instant::now()),
        });

        let handle = tokio::spawn(run_countdown(Arc::downgrade(&session), tick_period));
        *session.countdown.lock().await = Some(handle);

        Ok(session)
    }

    pub async fn view(&self) -> AttemptView {
        let engine = self.engine.lock().await;
        let state = engine.state();
        let active = state.phase == Phase::Active;

        AttemptView {
            attempt_id: self.id,
            quiz_id: state.quiz.id,
            quiz_title: state.quiz.title.clone(),
            student_name: state.student_name.clone(),
            phase: state.phase,
            question_index: state.current_index,
            question_count: state.quiz.questions.len(),
            question: active.then(|| PublicQuestion::from(&state.quiz.questions[state.current_index])),
            selected_answer: state.selected_answers[state.current_index],
            time_limit: state.quiz.time_limit,
            time_remaining_secs: state.time_remaining_secs,
            result: engine.result(),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.engine.lock().await.phase()
    }

    async fn touch(&self) {
        *self.last_observed.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_observed.lock().await.elapsed()
    }

    /// Ends the session if it went unobserved for too long. The engine lock is
    /// held throughout, so a stale active attempt cannot slip into `Submitting`.
    async fn expire_if_stale(&self, idle_after: Duration, retain: Duration) -> bool {
        let engine = self.engine.lock().await;
        let idle = self.idle_for().await;
        let stale = match engine.phase() {
            Phase::Active => idle >= idle_after,
            Phase::Completed => idle >= retain,
            Phase::Submitting => false,
        };

        if stale {
            if engine.phase() == Phase::Active {
                tracing::info!(
                    "Attempt {} abandoned after {}s without activity",
                    self.id,
                    idle.as_secs()
                );
            }
            self.abandon().await;
        }
        stale
    }

    pub async fn select_answer(&self, option: usize) -> Result<AttemptView, AttemptError> {
        self.engine.lock().await.select_answer(option)?;
        Ok(self.view().await)
    }

    /// Advances; on the last question this waits for the submission to resolve.
    pub async fn advance(self: &Arc<Self>) -> Result<AttemptView, AttemptError> {
        let submission = self.engine.lock().await.advance()?;
        if let Some(submission) = submission {
            self.submit(submission).await;
        }
        Ok(self.view().await)
    }

    /// One countdown step. Returns the phase afterwards.
    pub async fn tick(self: &Arc<Self>) -> Phase {
        let submission = self.engine.lock().await.tick();
        if let Some(submission) = submission {
            self.submit(submission).await;
        }
        self.phase().await
    }

    /// Stops the countdown. Safe to call repeatedly or after completion.
    pub async fn abandon(&self) {
        if let Some(handle) = self.countdown.lock().await.take() {
            handle.abort();
            tracing::debug!("Countdown stopped for attempt {}", self.id);
        }
    }

    async fn submit(self: &Arc<Self>, submission: Submission) {
        let session = Arc::clone(self);
        let task = tokio::spawn(async move { session.persist(submission).await });
        if let Err(e) = task.await {
            tracing::error!("Submission task for attempt {} failed: {:?}", self.id, e);
        }
    }

    async fn persist(&self, submission: Submission) {
        let attempt = submission.into_attempt();
        match self.repo.insert_attempt(attempt).await {
            Ok(record) => tracing::info!(
                attempt = %self.id,
                record_id = record.id,
                quiz_id = record.quiz_id,
                score = record.score,
                time_taken = record.time_taken,
                "Attempt saved"
            ),
            // The student still sees the locally computed score.
            Err(e) => tracing::error!("Failed to save attempt {}: {:?}", self.id, e),
        }
        self.engine.lock().await.mark_completed();
        // Retention is measured from completion.
        self.touch().await;
    }
}

async fn run_countdown(session: std::sync::Weak<AttemptSession>, period: Duration) {
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if session.tick().await != Phase::Active {
            break;
        }
    }
}

/// Live sessions keyed by attempt id.
#[derive(Clone)]
pub struct AttemptRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<AttemptSession>>>>,
    idle_after: Duration,
    retain_completed: Duration,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AttemptRegistry {
    pub fn new(idle_after: Duration, retain_completed: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_after,
            retain_completed,
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers the session and makes sure the sweeper is running.
    pub async fn insert(&self, session: Arc<AttemptSession>) {
        self.sessions.write().await.insert(session.id, session);

        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_none() {
            *sweeper = Some(tokio::spawn(self.clone().run_sweeper()));
        }
    }

    /// Looks up a session. Counts as an observation.
    pub async fn get(&self, id: Uuid) -> Option<Arc<AttemptSession>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch().await;
        Some(session)
    }

    /// Removes the session and stops its countdown.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<AttemptSession>> {
        let session = self.sessions.write().await.remove(&id)?;
        session.abandon().await;
        Some(session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops stale sessions. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for session in sessions {
            if session
                .expire_if_stale(self.idle_after, self.retain_completed)
                .await
            {
                expired.push(session.id);
            }
        }

        if !expired.is_empty() {
            let mut map = self.sessions.write().await;
            for id in &expired {
                map.remove(id);
            }
            tracing::debug!("Released {} stale attempt sessions", expired.len());
        }
        expired.len()
    }

    /// Stops the sweeper and every remaining countdown. Nothing is recorded.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.abandon().await;
        }
    }

    async fn run_sweeper(self) {
        let period = (self.idle_after.min(self.retain_completed) / 4).max(MIN_PERIOD);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::clock::ManualClock,
        models::{question::Question, quiz::NewQuiz},
        repository::testing::FlakyQuizRepository,
    };
    use chrono::{TimeZone, Utc};

    const TICK: Duration = Duration::from_secs(1);
    const IDLE: Duration = Duration::from_secs(60);
    const RETAIN: Duration = Duration::from_secs(120);

    async fn setup(correct: &[usize], time_limit: u32) -> (Arc<FlakyQuizRepository>, Quiz, Arc<ManualClock>) {
        let repo = Arc::new(FlakyQuizRepository::new());
        let quiz = repo
            .create_quiz(NewQuiz {
                title: "Photosynthesis".into(),
                questions: correct
                    .iter()
                    .map(|c| Question {
                        text: "Where does it happen?".into(),
                        options: vec!["Chloroplast".into(), "Nucleus".into(), "Ribosome".into()],
                        correct: *c,
                    })
                    .collect(),
                time_limit,
                teacher_id: None,
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()));
        (repo, quiz, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_auto_submits_at_zero() {
        let (repo, quiz, clock) = setup(&[0, 1], 3).await;
        let quiz_id = quiz.id;
        let session = AttemptSession::start(quiz, "Ananya".into(), repo.clone(), clock, TICK)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let view = session.view().await;
        assert_eq!(view.phase, Phase::Active);
        assert_eq!(view.time_remaining_secs, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let view = session.view().await;
        assert_eq!(view.phase, Phase::Completed);
        assert_eq!(view.time_remaining_secs, 0);
        assert_eq!(view.result.unwrap().score, 0);

        let rows = repo.fetch_attempts(quiz_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_name, "Ananya");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_attempt_stops_counting() {
        let (repo, quiz, clock) = setup(&[0], 5).await;
        let quiz_id = quiz.id;
        let session = AttemptSession::start(quiz, "Rahul".into(), repo.clone(), clock, TICK)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        session.abandon().await;
        session.abandon().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let view = session.view().await;
        assert_eq!(view.phase, Phase::Active);
        assert_eq!(view.time_remaining_secs, 4);
        assert!(repo.fetch_attempts(quiz_id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn last_advance_persists_and_completes() {
        let (repo, quiz, clock) = setup(&[0, 1, 1], 600).await;
        let quiz_id = quiz.id;
        let session = AttemptSession::start(quiz, "Ishaan".into(), repo.clone(), clock.clone(), TICK)
            .await
            .unwrap();

        for answer in [0, 1] {
            session.select_answer(answer).await.unwrap();
            session.advance().await.unwrap();
        }
        session.select_answer(0).await.unwrap();
        clock.advance(chrono::Duration::seconds(42));
        let view = session.advance().await.unwrap();

        assert_eq!(view.phase, Phase::Completed);
        assert!(view.question.is_none());
        let result = view.result.unwrap();
        assert_eq!(result.score, 67);
        assert_eq!(result.time_taken, 42);

        let rows = repo.fetch_attempts(quiz_id).await.unwrap();
        assert_eq!(rows[0].score, 67);
        assert_eq!(rows[0].time_taken, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_still_completes_with_score() {
        let (repo, quiz, clock) = setup(&[2], 600).await;
        repo.set_fail_inserts(true);
        let session = AttemptSession::start(quiz, "Sneha".into(), repo, clock, TICK)
            .await
            .unwrap();

        session.select_answer(2).await.unwrap();
        let view = session.advance().await.unwrap();

        assert_eq!(view.phase, Phase::Completed);
        assert_eq!(view.result.unwrap().score, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn contract_violations_leave_state_untouched() {
        let (repo, quiz, clock) = setup(&[0, 0], 600).await;
        let session = AttemptSession::start(quiz, "Aditya".into(), repo, clock, TICK)
            .await
            .unwrap();

        assert_eq!(session.advance().await.err(), Some(AttemptError::NotAnswered));
        session.select_answer(1).await.unwrap();
        assert_eq!(session.select_answer(0).await.err(), Some(AttemptError::AlreadyAnswered));

        let view = session.view().await;
        assert_eq!(view.question_index, 0);
        assert_eq!(view.selected_answer, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn registry_remove_stops_countdown() {
        let (repo, quiz, clock) = setup(&[0], 2).await;
        let registry = AttemptRegistry::new(IDLE, RETAIN);
        let session = AttemptSession::start(quiz, "Riya".into(), repo.clone(), clock, TICK)
            .await
            .unwrap();
        let id = session.id;
        registry.insert(session.clone()).await;
        assert!(registry.get(id).await.is_some());

        let removed = registry.remove(id).await.unwrap();
        assert!(registry.is_empty().await);
        assert!(registry.remove(id).await.is_none());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(removed.phase().await, Phase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn unobserved_attempts_are_swept_without_recording() {
        let (repo, quiz, clock) = setup(&[0, 1], 600).await;
        let quiz_id = quiz.id;
        let registry = AttemptRegistry::new(IDLE, RETAIN);

        let mut started = Vec::new();
        for i in 0..50 {
            let session = AttemptSession::start(
                quiz.clone(),
                format!("Student {}", i),
                repo.clone(),
                clock.clone(),
                TICK,
            )
            .await
            .unwrap();
            registry.insert(session.clone()).await;
            started.push(session);
        }

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(registry.is_empty().await);
        assert!(repo.fetch_attempts(quiz_id).await.unwrap().is_empty());
        // Countdowns stopped long before the time limit.
        let view = started[0].view().await;
        assert_eq!(view.phase, Phase::Active);
        assert!(view.time_remaining_secs > 500);
    }

    #[tokio::test(start_paused = true)]
    async fn observed_attempt_survives_and_result_is_retained() {
        let (repo, quiz, clock) = setup(&[1], 600).await;
        let quiz_id = quiz.id;
        let registry = AttemptRegistry::new(IDLE, RETAIN);
        let session = AttemptSession::start(quiz, "Meera".into(), repo.clone(), clock, TICK)
            .await
            .unwrap();
        let id = session.id;
        registry.insert(session).await;

        // Polled every 30s for four minutes.
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_secs(30)).await;
            assert!(registry.get(id).await.is_some());
        }

        let session = registry.get(id).await.unwrap();
        session.select_answer(1).await.unwrap();
        assert_eq!(session.advance().await.unwrap().phase, Phase::Completed);
        drop(session);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(registry.is_empty().await);
        assert_eq!(repo.fetch_attempts(quiz_id).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_period_still_counts_down() {
        let (repo, quiz, clock) = setup(&[0], 3).await;
        let session = AttemptSession::start(quiz, "Kabir".into(), repo, clock, Duration::ZERO)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(session.phase().await, Phase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everything() {
        let (repo, quiz, clock) = setup(&[0], 5).await;
        let quiz_id = quiz.id;
        let registry = AttemptRegistry::new(IDLE, RETAIN);
        let session = AttemptSession::start(quiz, "Dev".into(), repo.clone(), clock, TICK)
            .await
            .unwrap();
        registry.insert(session).await;

        registry.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(registry.is_empty().await);
        assert!(repo.fetch_attempts(quiz_id).await.unwrap().is_empty());
    }
}
