//! Quarry server library (gateway layer + test harness support).

pub mod gateway;
