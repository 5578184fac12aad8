//! Background jobs subsystem.
//!
//! # Data Flow
//! ```text
//! startup.rs
//!     → builtin.rs (register named jobs with the TaskRegistry)
//!     → periodic.rs (tick vs. shutdown select loop)
//!
//! On shutdown:
//!     coordinator fires → each loop exits after its current tick
//!     → TaskRegistry::await_all collects the handles
//! ```

pub mod builtin;
pub mod periodic;

pub use builtin::{register_builtin_jobs, JobDependencies};
pub use periodic::run_periodic;
