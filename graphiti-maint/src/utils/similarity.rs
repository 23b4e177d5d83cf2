//! Vector helpers for embedding sanity checks.

use ndarray::ArrayView1;

/// Euclidean (L2) norm of `v`. Returns `0.0` for an empty slice.
pub fn l2_norm(v: &[f32]) -> f32 {
    let arr = ArrayView1::from(v);
    arr.dot(&arr).sqrt()
}

/// Cosine similarity between two vectors.
///
/// Returns `None` when the vectors cannot be compared: either is empty, their
/// lengths differ (a dimensionality mismatch), or either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let dot = ArrayView1::from(a).dot(&ArrayView1::from(b));
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// L2-normalize a vector. Zero vectors are returned unchanged.
pub fn normalize_l2(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Whether every component is finite (no NaN or infinity).
pub fn is_finite_vector(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = [1.0_f32, 2.0, 3.0];
        assert!(approx_eq(cosine_similarity(&v, &v).unwrap(), 1.0));
    }

    #[test]
    fn cosine_known_vectors() {
        // dot = 24, |a| = |b| = 5 -> 0.96
        let a = [3.0_f32, 4.0];
        let b = [4.0_f32, 3.0];
        assert!(approx_eq(cosine_similarity(&a, &b).unwrap(), 0.96));
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = [1.0_f32, 0.0, 0.0];
        let b = [-1.0_f32, 0.0, 0.0];
        assert!(approx_eq(cosine_similarity(&a, &b).unwrap(), -1.0));
    }

    #[test]
    fn cosine_dimension_mismatch_is_none() {
        let old = vec![0.1_f32; 768];
        let new = vec![0.1_f32; 1024];
        assert!(cosine_similarity(&old, &new).is_none());
    }

    #[test]
    fn cosine_empty_or_zero_is_none() {
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let n = normalize_l2(&[3.0, 4.0]);
        assert!(approx_eq(l2_norm(&n), 1.0));
        assert!(approx_eq(n[0], 0.6));
        assert!(approx_eq(n[1], 0.8));
    }

    #[test]
    fn normalize_zero_vector_unchanged() {
        assert_eq!(normalize_l2(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalize_l2(&[]).is_empty());
    }

    #[test]
    fn finite_check() {
        assert!(is_finite_vector(&[0.1, -2.0]));
        assert!(!is_finite_vector(&[0.1, f32::NAN]));
        assert!(!is_finite_vector(&[f32::INFINITY]));
    }
}
