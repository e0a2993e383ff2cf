// src/batch/mod.rs

//! Batch data model and schedule computation.
//!
//! - [`spec`] holds the immutable [`Command`] and [`BatchSpec`] built from
//!   validated user input.
//! - [`schedule`] derives the list of batch sizes from `(count, step)`.

pub mod schedule;
pub mod spec;

pub use schedule::Schedule;
pub use spec::{BatchSpec, Command, RunOptions};
