/// Converts a squared L2 distance into a bounded similarity score.
///
/// Distance zero maps to 1.0 and the score decays monotonically towards
/// zero, so rankings by ascending distance and descending similarity agree.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}
