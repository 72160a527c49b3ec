use std::f64::consts::{PI, TAU};

/// Wraps an angle in radians into (-pi, pi].
pub fn wrap_pi(angle: f64) -> f64 {
    let a = angle % TAU;
    if a > PI {
        a - TAU
    } else if a <= -PI {
        a + TAU
    } else {
        a
    }
}

/// Shortest signed rotation from `from` to `to`, in (-pi, pi].
pub fn angle_diff(to: f64, from: f64) -> f64 {
    wrap_pi(to - from)
}
