//! Cross-implementation regression comparator.
//!
//! Fetches responses produced by two independently evolving backends for the
//! same named test cases, normalizes them into a canonical rendering so
//! implementation-specific artifacts (escaping conventions, field naming,
//! null-only fields) do not register as differences, diffs against a
//! reference baseline, and reports pass/fail plus latency deltas.
//!
//! Pipeline per case: fetch → [`escape`] decoding → [`schema`]
//! canonicalization → [`cache`] (staleness-aware canonical rendering) →
//! [`compare`] (external diff) → [`timing`] classification → [`report`]
//! aggregation, orchestrated by [`runner`].

pub mod cache;
pub mod cases;
pub mod compare;
pub mod error;
pub mod escape;
pub mod fetch;
pub mod layout;
pub mod report;
pub mod runner;
pub mod schema;
pub mod timing;

pub use error::{Result, SvcdiffError};
