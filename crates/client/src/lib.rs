//! REST adapter for the payout request backend.

pub mod http;

pub use http::{ClientBuildError, HttpPayoutRequestRepository};
