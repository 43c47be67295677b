//! Core types and trait definitions for the on-duty pharmacy lookup.
//!
//! No HTTP or database dependencies live here.
//! Storage backends implement [`store::PharmacyStore`]; callers go through
//! [`finder::DutyFinder`], which owns the validation, distance and ordering
//! policy.

pub mod duty;
pub mod error;
pub mod finder;
pub mod geo;
pub mod pharmacy;
pub mod query;
pub mod store;

pub use error::{Error, Result};
