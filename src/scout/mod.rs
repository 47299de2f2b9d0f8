// ─── Scoring + position lifecycle core ───
pub mod audit;
pub mod config;
pub mod exit;
pub mod monitor;
pub mod portfolio;
pub mod scoring;
pub mod types;
