mod env;
mod global_state;
mod response;
mod routes;
mod utils;

pub use env::ApiServerEnv;
pub use global_state::GlobalState;
pub use response::{AppError, AppSuccess};
pub use routes::{payout_routes, refund_routes};
pub use utils::setup_tracing;
