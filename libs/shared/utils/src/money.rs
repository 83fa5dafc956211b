// libs/shared/utils/src/money.rs

/// Rounds a monetary amount to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
