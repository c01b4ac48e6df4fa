//! Presentation helpers shared by every front end of the approvals screen.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::PayoutStatus;

pub const RUPEE_SIGN: &str = "\u{20b9}";

pub const DELETE_CONFIRMATION_PROMPT: &str =
    "Are you sure you want to delete this payout request? This action cannot be undone.";

/// Whole rupees with Indian digit grouping, e.g. `₹1,23,457`.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let digits = rounded.abs().trunc().to_string();
    format!("{sign}{RUPEE_SIGN}{}", group_indian(&digits))
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("{},{tail}", groups.join(","))
}

/// `dd-mm-yy h:mmam` in the given display offset.
pub fn format_timestamp(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format("%d-%m-%y %-I:%M%P").to_string()
}

pub fn status_label(status: PayoutStatus) -> &'static str {
    match status {
        PayoutStatus::Pending => "Pending",
        PayoutStatus::Accepted => "Accepted",
        PayoutStatus::Rejected => "Rejected",
    }
}
