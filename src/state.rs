use std::sync::Arc;

use crate::{
    config::Config,
    engine::clock::{Clock, SystemClock},
    repository::{
        AccountRepository, QuizRepository,
        memory::{MemoryAccountRepository, MemoryQuizRepository},
    },
    runtime::{poller::LeaderboardHub, session::AttemptRegistry},
};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub quizzes: Arc<dyn QuizRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub attempts: AttemptRegistry,
    pub leaderboards: LeaderboardHub,
}

impl AppState {
    pub fn new(
        config: Config,
        quizzes: Arc<dyn QuizRepository>,
        accounts: Arc<dyn AccountRepository>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let leaderboards = LeaderboardHub::new(
            Arc::clone(&quizzes),
            Arc::clone(&clock),
            config.leaderboard_refresh,
            config.leaderboard_idle,
        );
        let attempts = AttemptRegistry::new(config.attempt_idle, config.attempt_retain);

        Self {
            quizzes,
            accounts,
            config,
            clock,
            attempts,
            leaderboards,
        }
    }

    /// State backed by process memory; nothing survives a restart.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryQuizRepository::new()),
            Arc::new(MemoryAccountRepository::new()),
        )
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
