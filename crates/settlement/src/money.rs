/// Half-up rounding to 2 decimal places.
///
/// Every monetary step in the settlement pipeline rounds through this before
/// feeding the next step; reconciliation tooling recomputes the same chain
/// and compares stored values, so rounding only once at the end would drift.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
