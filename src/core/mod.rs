//! Core types for job authoring.
//!
//! This module holds the identifiers, tick signals, the job trait and the
//! schedule helpers that applications use to describe recurring work.

pub mod job;
pub mod schedule;
pub mod tick;
pub mod types;
