// src/policy/kinematics.rs
//
// Closed-form inverse kinematics for the 2-link planar arm.

/// Goals closer to the origin than this are not rescaled (direction undefined).
const MIN_RADIUS: f64 = 1e-6;

/// Joint angles `(theta1, theta2)` placing the end effector at `(x, y)`.
///
/// Goals outside the annulus `[|l1 - l2|, l1 + l2]` are first rescaled
/// radially onto its nearest boundary. Returns the elbow-down solution
/// (`theta2 >= 0`).
pub fn inverse_kinematics(x: f64, y: f64, l1: f64, l2: f64) -> (f64, f64) {
    let max_reach = l1 + l2;
    let min_reach = (l1 - l2).abs();

    let mut r = x.hypot(y);
    let (mut x, mut y) = (x, y);
    if r > max_reach {
        let scale = max_reach / r;
        x *= scale;
        y *= scale;
        r = max_reach;
    } else if r < min_reach {
        let scale = if r > MIN_RADIUS { min_reach / r } else { 1.0 };
        x *= scale;
        y *= scale;
        r = min_reach;
    }

    let cos_theta2 = ((r * r - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
    let theta2 = cos_theta2.acos();

    let alpha = y.atan2(x);
    let beta = (l2 * theta2.sin()).atan2(l1 + l2 * theta2.cos());
    (alpha - beta, theta2)
}
