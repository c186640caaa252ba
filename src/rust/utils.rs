use ndarray::Array1;

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

/// Numerically stable softmax over one row of logits, in place.
pub(crate) fn softmax_inplace(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }
    let max_val = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for x in row.iter_mut() {
        *x = (*x - max_val).exp();
        sum += *x;
    }
    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}

/// Index of the largest value; the lowest index wins ties.
pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_normalize_zero_vector() {
        let v = normalize_vector(&Array1::zeros(4));
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize_vector(&array![3.0, 4.0]);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut row = [1.0f32, 0.0, 0.0];
        softmax_inplace(&mut row);
        assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(row[0], 0.576, epsilon = 1e-3);

        let mut large = [1000.0f32, 1000.0];
        softmax_inplace(&mut large);
        assert_relative_eq!(large[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
