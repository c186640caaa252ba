//! Turns a `(description, amount)` pair into the fixed-width model input.

mod amount;
mod fusion;
mod text;

use ndarray::Array2;

use crate::error::{Result, SpendcatError};

pub use amount::{normalize_amount, AMOUNT_SCALE};
pub use fusion::{fuse, FeatureVector};
pub use text::CharNgramEncoder;

/// Encodes, normalizes and fuses a single transaction.
pub fn encode_transaction(encoder: &CharNgramEncoder, description: &str, amount: f64) -> FeatureVector {
    fuse(&encoder.transform(description), normalize_amount(amount))
}

/// Builds the row-major training matrix, one fused vector per row.
pub fn feature_matrix<'a, I>(encoder: &CharNgramEncoder, rows: I) -> Result<Array2<f32>>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let width = encoder.feature_width();
    let mut data = Vec::new();
    let mut n_rows = 0;
    for (description, amount) in rows {
        data.extend(encode_transaction(encoder, description, amount).into_inner());
        n_rows += 1;
    }
    let actual = data.len();
    Array2::from_shape_vec((n_rows, width), data).map_err(|_| SpendcatError::DimensionMismatch {
        expected: n_rows * width,
        actual,
    })
}
