//! Discounted returns.

/// Computes `R_t = r_t + gamma * R_t+1 * (1 - d_t)` from the last step to the first.
///
/// The `(1 - d_t)` factor stops carry-over at every episode boundary in the window.
pub fn discount_with_dones(rewards: &[f32], dones: &[bool], gamma: f32) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), dones.len());
    let mut discounted = vec![0f32; rewards.len()];
    let mut r = 0f32;
    for (t, (&reward, &done)) in rewards.iter().zip(dones).enumerate().rev() {
        r = reward + gamma * r * if done { 0.0 } else { 1.0 };
        discounted[t] = r;
    }
    discounted
}

/// Returns of a single instance over a rollout, bootstrapped off `last_value`.
///
/// If the last step of the rollout is non-terminal, `last_value` is appended to the
/// rewards (with a `false` done flag), the recursion is run, and the extra element is
/// dropped. Otherwise `last_value` is never used.
pub fn bootstrapped_returns(
    rewards: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
) -> Vec<f32> {
    match dones.last() {
        Some(false) => {
            let rewards = [rewards, &[last_value]].concat();
            let dones = [dones, &[false]].concat();
            let mut returns = discount_with_dones(&rewards, &dones, gamma);
            returns.pop();
            returns
        }
        _ => discount_with_dones(rewards, dones, gamma),
    }
}
