/// Rounds `value` to a multiple of `step_size`, ties away from zero.
///
/// `step_size` must be non-zero.
pub fn round_to_step(value: f64, step_size: f64) -> f64 {
    let step = step_size.abs();
    let magnitude = value.abs();
    let steps = (magnitude / step).floor();
    let steps = if magnitude - steps * step < 0.5 * step {
        steps
    } else {
        steps + 1.0
    };
    (steps * step).copysign(value)
}

/// Nearest member of the ascending `supported` list.
///
/// Exactly halfway between two members, the lower one wins. Outside the list
/// the closest end is returned.
pub fn nearest_supported(target: f64, supported: &[f64]) -> f64 {
    let above = supported.partition_point(|value| *value < target);
    if above == 0 {
        return supported.first().copied().unwrap_or(target);
    }
    if above == supported.len() {
        return supported[above - 1];
    }

    let candidate_below = supported[above - 1];
    let candidate_above = supported[above];
    if candidate_above - target < target - candidate_below {
        candidate_above
    } else {
        candidate_below
    }
}
