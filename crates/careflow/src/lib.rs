//! Careflow: visit scheduling and verification engine for home-care agencies.
//!
//! The crate is organized around the [`scheduling`] module, which owns the
//! conflict detector, the EVV clock-in/clock-out state machine, the caregiver
//! matching engine, and the recurrence expander behind a single
//! [`scheduling::VisitScheduler`] facade. Persistence, location verification,
//! and caregiver data access are injected through traits so the engine can be
//! exercised without live infrastructure.

pub mod config;
pub mod error;
pub mod scheduling;
pub mod telemetry;
