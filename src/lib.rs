//! pool_scout — DEX liquidity-pool scoring and paper-position simulator.
//!
//! Repeating cycle:
//!   discovery source → dedup/validate → ScoringEngine → Portfolio (enter)
//!   watchlist → metrics source → ExitPolicy → Portfolio (exit)
//!
//! Decision support only: no funds move and no transactions are issued.

pub mod admin;
pub mod scout;
pub mod sources;
pub mod state;
