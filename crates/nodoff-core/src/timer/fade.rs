/// Volume for a duration timer with `remaining_secs` left.
///
/// Returns `None` outside the fade-out window (volume should sit at `base_volume`);
/// inside it the volume falls linearly to zero, clamped to `[0, base_volume]`.
pub fn fade_volume(remaining_secs: u64, fade_window_secs: u64, base_volume: f64) -> Option<f64> {
    if fade_window_secs == 0 || remaining_secs >= fade_window_secs {
        return None;
    }
    let base = clamp_volume(base_volume);
    let volume = remaining_secs as f64 / fade_window_secs as f64 * base;
    Some(volume.clamp(0.0, base))
}

/// Volumes live in `[0, 1]`; anything else is clamped, NaN becomes full volume.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        1.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
