// src/runtime/poller.rs

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    engine::{clock::Clock, leaderboard::LeaderboardViewModel},
    repository::QuizRepository,
    runtime::MIN_PERIOD,
};

/// Keeps one quiz's leaderboard fresh while somebody is looking at it.
pub struct LeaderboardPoller {
    quiz_id: i64,
    view: RwLock<LeaderboardViewModel>,
    cancelled: AtomicBool,
    last_observed: Mutex<Instant>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LeaderboardPoller {
    fn new(quiz_id: i64) -> Self {
        Self {
            quiz_id,
            view: RwLock::new(LeaderboardViewModel::new()),
            cancelled: AtomicBool::new(false),
            last_observed: Mutex::new(Instant::now()),
            task: Mutex::new(None),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> LeaderboardViewModel {
        self.view.read().await.clone()
    }

    async fn touch(&self) {
        *self.last_observed.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_observed.lock().await.elapsed()
    }

    /// Refreshes a working copy and publishes it unless cancelled meanwhile.
    async fn refresh_once(&self, repo: &dyn QuizRepository, clock: &dyn Clock) {
        let mut next = self.view.read().await.clone();
        let updated = next.refresh(repo, clock, self.quiz_id).await;

        if self.is_cancelled() {
            tracing::debug!("Discarding late leaderboard response for quiz {}", self.quiz_id);
            return;
        }
        if updated {
            *self.view.write().await = next;
        }
    }

    /// Stops polling. Idempotent.
    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            tracing::debug!("Leaderboard poller stopped for quiz {}", self.quiz_id);
        }
    }
}

/// Registry of leaderboard pollers, one per observed quiz.
#[derive(Clone)]
pub struct LeaderboardHub {
    repo: Arc<dyn QuizRepository>,
    clock: Arc<dyn Clock>,
    refresh_every: Duration,
    idle_after: Duration,
    pollers: Arc<Mutex<HashMap<i64, Arc<LeaderboardPoller>>>>,
}

impl LeaderboardHub {
    pub fn new(
        repo: Arc<dyn QuizRepository>,
        clock: Arc<dyn Clock>,
        refresh_every: Duration,
        idle_after: Duration,
    ) -> Self {
        Self {
            repo,
            clock,
            refresh_every: refresh_every.max(MIN_PERIOD),
            idle_after,
            pollers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the current snapshot, starting a poller if none is running.
    ///
    /// A new poller is published with its view write-locked until the first
    /// refresh lands, so concurrent observers never see the empty placeholder.
    pub async fn observe(&self, quiz_id: i64) -> LeaderboardViewModel {
        let mut pollers = self.pollers.lock().await;
        let running = pollers.get(&quiz_id).filter(|p| !p.is_cancelled()).cloned();
        if let Some(poller) = running {
            drop(pollers);
            poller.touch().await;
            return poller.snapshot().await;
        }

        let poller = Arc::new(LeaderboardPoller::new(quiz_id));
        let mut warming = poller.view.write().await;
        pollers.insert(quiz_id, Arc::clone(&poller));
        drop(pollers);

        warming
            .refresh(self.repo.as_ref(), self.clock.as_ref(), quiz_id)
            .await;
        let snapshot = warming.clone();
        drop(warming);

        let handle = tokio::spawn(self.clone().run(Arc::clone(&poller)));
        *poller.task.lock().await = Some(handle);
        tracing::debug!("Leaderboard poller started for quiz {}", quiz_id);

        poller.touch().await;
        snapshot
    }

    /// Stops and forgets the poller for `quiz_id`, if any.
    pub async fn stop(&self, quiz_id: i64) {
        let poller = self.pollers.lock().await.remove(&quiz_id);
        if let Some(poller) = poller {
            poller.cancel().await;
        }
    }

    pub async fn shutdown(&self) {
        let pollers: Vec<_> = self.pollers.lock().await.drain().map(|(_, p)| p).collect();
        for poller in pollers {
            poller.cancel().await;
        }
    }

    pub async fn active_count(&self) -> usize {
        self.pollers.lock().await.len()
    }

    async fn run(self, poller: Arc<LeaderboardPoller>) {
        let mut interval = tokio::time::interval(self.refresh_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; `observe` already refreshed.
        interval.tick().await;

        loop {
            interval.tick().await;
            if poller.is_cancelled() {
                break;
            }

            if poller.idle_for().await >= self.idle_after {
                poller.cancelled.store(true, Ordering::SeqCst);
                let mut pollers = self.pollers.lock().await;
                if pollers
                    .get(&poller.quiz_id)
                    .is_some_and(|p| Arc::ptr_eq(p, &poller))
                {
                    pollers.remove(&poller.quiz_id);
                }
                tracing::debug!("Leaderboard for quiz {} no longer observed", poller.quiz_id);
                break;
            }

            poller
                .refresh_once(self.repo.as_ref(), self.clock.as_ref())
                .await;
        }
    }
}
