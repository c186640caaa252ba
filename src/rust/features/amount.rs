/// Fixed divisor that brings typical amounts near the range of text features.
pub const AMOUNT_SCALE: f64 = 1000.0;

/// Rescales a transaction amount. Stateless; negative and zero amounts
/// pass through unchanged.
#[inline]
pub fn normalize_amount(amount: f64) -> f32 {
    (amount / AMOUNT_SCALE) as f32
}
