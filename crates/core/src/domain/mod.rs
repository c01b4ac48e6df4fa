pub mod actor;
pub mod payout;

pub use actor::Actor;
pub use payout::{Decision, PayoutRequest, PayoutRequestId, PayoutStatus, StatusFilter};
