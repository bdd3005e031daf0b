//! Distance-to-relevance transform.

/// Map a smaller-is-closer distance to a relevance score in (0, 1],
/// monotonically decreasing in distance. Negative distances (possible for
/// cosine under float error) clamp to zero.
pub fn relevance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_decreasing() {
        assert!(relevance(0.0) > relevance(0.5));
        assert!(relevance(0.5) > relevance(2.0));
        assert!(relevance(2.0) > relevance(100.0));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(relevance(0.0), 1.0);
        assert_eq!(relevance(-0.001), 1.0);
        assert!(relevance(1e9) > 0.0);
        assert!(relevance(1e9) < 1e-6);
    }
}
