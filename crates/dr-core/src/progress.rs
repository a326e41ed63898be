/// Convert a zero-based model iteration index into a percentage of the
/// requested step count, rounded to one decimal and capped at 100.
pub fn step_percent(step: usize, steps: u32) -> f32 {
    let pct = (step as f32 + 1.0) / (steps.max(1) as f32) * 100.0;
    ((pct * 10.0).round() / 10.0).min(100.0)
}
