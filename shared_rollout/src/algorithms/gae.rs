//! Generalized Advantage Estimation.
//!
//! ## Formula
//!
//! A_t = δ_t + γλ (1 - d_{t+1}) A_{t+1}
//! where δ_t = r_t + γ (1 - d_{t+1}) V(s_{t+1}) - V(s_t)
//!
//! `d_{t+1}` is the terminated flag of the frame *following* step `t`, so a
//! terminal boundary zeroes both the bootstrap and the propagated advantage.
//!
//! ## References
//!
//! - Schulman et al., "High-Dimensional Continuous Control Using
//!   Generalized Advantage Estimation" (2016)

/// Epsilon added to the standard deviation when standardising advantages.
pub const ADVANTAGE_EPS: f32 = 1e-5;

/// Compute GAE advantages and returns for one trajectory.
///
/// # Arguments
///
/// * `rewards` - `r_t` [T]
/// * `values` - `V(s_t)` [T]
/// * `next_terminated` - terminated flag of frame `t + 1` [T]
/// * `bootstrap_value` - `V(s_T)`, used only for the last step
/// * `discount` - γ
/// * `gae_lambda` - λ
///
/// # Returns
///
/// (advantages, returns) - both [T]
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    next_terminated: &[bool],
    bootstrap_value: f32,
    discount: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(next_terminated.len(), n);

    let mut advantages = vec![0.0f32; n];
    let mut returns = vec![0.0f32; n];

    let mut gae = 0.0f32;
    let mut next_value = bootstrap_value;

    for t in (0..n).rev() {
        let next_non_terminal = if next_terminated[t] { 0.0 } else { 1.0 };

        let delta = rewards[t] + discount * next_value * next_non_terminal - values[t];
        gae = delta + discount * gae_lambda * next_non_terminal * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];

        next_value = values[t];
    }

    (advantages, returns)
}

/// Standardise in place: `(x - mean) / (std + ADVANTAGE_EPS)`.
///
/// Uses the unbiased (n - 1) standard deviation. A degenerate all-equal
/// batch, or a single element, maps to zeros.
pub fn normalize_advantages(advantages: &mut [f32]) {
    let n = advantages.len();
    if n == 0 {
        return;
    }

    let mean = advantages.iter().sum::<f32>() / n as f32;
    let std = if n > 1 {
        let var = advantages
            .iter()
            .map(|a| (a - mean) * (a - mean))
            .sum::<f32>()
            / (n - 1) as f32;
        var.sqrt()
    } else {
        0.0
    };

    for a in advantages.iter_mut() {
        *a = (*a - mean) / (std + ADVANTAGE_EPS);
    }
}
