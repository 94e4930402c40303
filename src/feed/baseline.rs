use crate::types::price::Price;

/// Recover the baseline (previous close) from a price and the percent change
/// reported against that baseline, by inverting `pct = (price/base - 1) * 100`.
///
/// This is an approximation: the provider rounded the percentage before
/// sending it, so the recovered baseline can differ from the true close in
/// the last decimal places. Returns None when the percentage is not
/// invertible (non-finite, or a move of -100% or beyond).
pub fn derive_baseline(price: Price, percent_change: f64) -> Option<Price> {
    if !percent_change.is_finite() {
        return None;
    }
    let denominator = 1.0 + percent_change / 100.0;
    if denominator <= 0.0 {
        return None;
    }
    Some(Price::from_f64(price.to_f64() / denominator))
}
