//! Vector pooling and normalization.

use ndarray::ArrayView2;

/// Compute the L2 (Euclidean) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize a vector in-place. Zero vectors remain zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Average the hidden-state rows whose attention mask is 1.
///
/// Returns a zero vector of width `hidden.ncols()` when no position is valid.
/// Mask positions beyond the last row are ignored.
pub fn mean_pool(hidden: ArrayView2<'_, f32>, attention_mask: &[u8]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden.ncols()];
    let mut count = 0usize;
    for (row, _) in hidden
        .rows()
        .into_iter()
        .zip(attention_mask)
        .filter(|(_, m)| **m == 1)
    {
        for (acc, x) in pooled.iter_mut().zip(row.iter()) {
            *acc += *x;
        }
        count += 1;
    }
    if count > 0 {
        let n = count as f32;
        for x in &mut pooled {
            *x /= n;
        }
    }
    pooled
}

/// Arithmetic mean of equal-length vectors. Empty input yields `None`.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut mean = vec![0.0f32; first.len()];
    for v in vectors {
        for (acc, x) in mean.iter_mut().zip(v) {
            *acc += *x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut mean {
        *x /= n;
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn l2_norm_known() {
        assert!(approx_eq(l2_norm(&[3.0, 4.0]), 5.0));
    }

    #[test]
    fn l2_normalize_known_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!(approx_eq(v[0], 0.6));
        assert!(approx_eq(v[1], 0.8));
    }

    #[test]
    fn l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0), "zero vector stays zero");
        assert!(!v.iter().any(|x| x.is_nan()), "no NaN");
    }

    #[test]
    fn mean_pool_respects_mask() {
        let hidden = array![[1.0, 2.0], [3.0, 4.0], [100.0, 100.0]];
        let pooled = mean_pool(hidden.view(), &[1, 1, 0]);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_no_valid_positions_is_zero() {
        let hidden = array![[1.0, 2.0], [3.0, 4.0]];
        let pooled = mean_pool(hidden.view(), &[0, 0]);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    #[test]
    fn mean_pool_ignores_mask_beyond_rows() {
        let hidden: Array2<f32> = array![[2.0, 2.0]];
        let pooled = mean_pool(hidden.view(), &[1, 1, 1]);
        assert_eq!(pooled, vec![2.0, 2.0]);
    }

    #[test]
    fn mean_vector_averages() {
        let mean = mean_vector(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(mean, vec![0.5, 0.5]);
    }

    #[test]
    fn mean_vector_empty_is_none() {
        assert!(mean_vector(&[]).is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_produces_unit(v in proptest::collection::vec(-100.0f32..100.0, 1..64)) {
                let has_nonzero = v.iter().any(|x| *x != 0.0);
                let mut v = v;
                l2_normalize(&mut v);
                if has_nonzero {
                    prop_assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
                }
            }
        }
    }
}
