// src/engine/leaderboard.rs

use serde::Serialize;

use chrono::{DateTime, Utc};

use crate::{engine::clock::Clock, models::attempt::AttemptRow, repository::QuizRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position after sorting.
    pub rank: usize,
    pub student_name: String,
    pub score: u32,
    pub time_taken: u64,
}

/// Aggregates recomputed on every refresh. All zero for an empty board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeaderboardStats {
    pub count: usize,
    pub avg_score: u32,
    pub avg_time: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaderboardViewModel {
    pub entries: Vec<LeaderboardEntry>,
    pub stats: LeaderboardStats,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl LeaderboardViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot wholesale with a ranking of `rows`, taken at `now`.
    pub fn apply(&mut self, rows: Vec<AttemptRow>, now: DateTime<Utc>) {
        let entries = rank_attempts(rows);
        self.stats = LeaderboardStats::from_entries(&entries);
        self.entries = entries;
        self.refreshed_at = Some(now);
    }

    /// Fetches and applies the latest attempts. On a repository error the
    /// previous snapshot is kept and `false` is returned.
    pub async fn refresh(
        &mut self,
        repo: &dyn QuizRepository,
        clock: &dyn Clock,
        quiz_id: i64,
    ) -> bool {
        match repo.fetch_attempts(quiz_id).await {
            Ok(rows) => {
                self.apply(rows, clock.now());
                true
            }
            Err(e) => {
                tracing::warn!("Leaderboard refresh failed for quiz {}: {:?}", quiz_id, e);
                false
            }
        }
    }
}

/// Orders by score descending, then time ascending. `sort_by` is stable, so
/// exact ties keep arrival order.
pub fn rank_attempts(mut rows: Vec<AttemptRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.time_taken.cmp(&b.time_taken))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            student_name: row.student_name,
            score: row.score,
            time_taken: row.time_taken,
        })
        .collect()
}

impl LeaderboardStats {
    pub fn from_entries(entries: &[LeaderboardEntry]) -> Self {
        let count = entries.len();
        if count == 0 {
            return Self::default();
        }

        let score_sum: u64 = entries.iter().map(|e| u64::from(e.score)).sum();
        let time_sum: u64 = entries.iter().map(|e| e.time_taken).sum();

        Self {
            count,
            avg_score: rounded_mean(score_sum, count as u64) as u32,
            avg_time: rounded_mean(time_sum, count as u64),
        }
    }
}

fn rounded_mean(sum: u64, count: u64) -> u64 {
    (2 * sum + count) / (2 * count)
}
