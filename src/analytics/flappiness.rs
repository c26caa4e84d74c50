/// Alert flappiness: over a 6-hour window, a `[0,1]` score that
/// grows with transition count and shrinks with mean state-duration.
use crate::time::NanoTime;

const WINDOW_NS: i64 = 6 * 60 * 60 * 1_000_000_000;

/// `transitions`: alert firing/resolving events within the trailing 6h
/// window, each a timestamp. Score is monotone in transition count for a
/// fixed mean duration, and capped at 1.0.
pub fn flappiness_score(transitions: &[NanoTime], now: NanoTime) -> f64 {
    let in_window: Vec<NanoTime> = transitions.iter().copied().filter(|t| now - t <= WINDOW_NS).collect();
    if in_window.len() < 2 {
        return 0.0;
    }

    let mut sorted = in_window;
    sorted.sort_unstable();
    let durations: Vec<i64> = sorted.windows(2).map(|w| (w[1] - w[0]).max(1)).collect();
    let mean_duration_ns = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
    let transition_count = durations.len() as f64;

    // transitions grow the score, mean duration (normalized against the
    // window) shrinks it — both bounded so the product stays in [0,1].
    let transition_term = 1.0 - (1.0 / (1.0 + transition_count / 10.0));
    let duration_term = 1.0 - (mean_duration_ns / WINDOW_NS as f64).min(1.0);

    (transition_term * 0.5 + duration_term * 0.5).clamp(0.0, 1.0)
}
