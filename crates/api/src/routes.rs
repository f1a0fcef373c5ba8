mod payout;
mod refund;

pub use payout::payout_routes;
pub use refund::refund_routes;
