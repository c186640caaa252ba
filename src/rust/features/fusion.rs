use ndarray::{Array1, ArrayView1};

/// Fused model input: text columns first, normalized amount last.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f32>);

impl FeatureVector {
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self(Array1::from_vec(values))
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }

    /// The trailing amount coordinate
    pub fn amount(&self) -> Option<f32> {
        self.0.last().copied()
    }

    pub fn into_inner(self) -> Array1<f32> {
        self.0
    }
}

/// Appends the normalized amount to the encoded description.
pub fn fuse(text: &Array1<f32>, normalized_amount: f32) -> FeatureVector {
    let mut fused = Vec::with_capacity(text.len() + 1);
    fused.extend(text.iter().copied());
    fused.push(normalized_amount);
    FeatureVector(Array1::from_vec(fused))
}
