// src/engine/mod.rs

pub mod attempt;
pub mod clock;
pub mod leaderboard;
