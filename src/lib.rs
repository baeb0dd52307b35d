//! Cycle prediction and pregnancy logging over an encrypted local vault.
//!
//! The prediction functions in [`prediction`] are pure and take the log
//! collection as plain data; everything else wires them to storage,
//! configuration and the command line.

pub mod clock;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod logging;
pub mod models;
pub mod prediction;
pub mod pregnancy;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use models::{
    CyclePrediction, CycleSummary, FlowLevel, KickSession, LogKind, PeriodDetails, PeriodLog,
    Regularity,
};
pub use prediction::{
    calculate_cycle_length, cycle_insights, cycle_summary, insight_messages, predict_next_cycle,
    CycleInsight, DatePolicy, Predictor, ValidationError,
};
