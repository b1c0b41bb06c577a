//! Distance metrics and score conversion for embeddings

/// Squared Euclidean (L2) distance between two vectors
///
/// # Panics
/// Panics if vectors have different dimensions
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have same dimension: {} vs {}",
        a.len(),
        b.len()
    );

    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Convert an L2 distance into a ranking score in (0, 1]
///
/// Monotonically decreasing in distance. Not a probability.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}
