use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIOD: usize = 14;

/// RSI for the most recent complete period and the one before it.
///
/// `None` marks a value that could not be produced, either because the
/// history was too short or because the inputs never arrived.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiReading {
    pub current: Option<f64>,
    pub previous: Option<f64>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl RsiReading {
    pub fn trend(&self) -> Trend {
        match (self.current, self.previous) {
            (Some(cur), Some(prev)) if cur > prev => Trend::Up,
            (Some(cur), Some(prev)) if cur < prev => Trend::Down,
            _ => Trend::Neutral,
        }
    }
}

/// Wilder's RSI over `closes` (oldest first).
///
/// The first `period` differences seed the average gain and loss, every later
/// difference is folded in with weight `1/period`. Returns `None` when fewer
/// than `period + 1` usable closes are available. Non-finite entries are
/// skipped rather than poisoning the averages.
pub fn compute_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }

    let closes: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();
    if closes.len() < period + 1 {
        return None;
    }

    let n = period as f64;
    let mut gains = 0.0;
    let mut losses = 0.0;

    for w in closes[..=period].windows(2) {
        let diff = w[1] - w[0];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    let mut avg_gain = gains / n;
    let mut avg_loss = losses / n;

    for w in closes[period..].windows(2) {
        let diff = w[1] - w[0];
        avg_gain = (avg_gain * (n - 1.0) + diff.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-diff).max(0.0)) / n;
    }

    Some(from_averages(avg_gain, avg_loss))
}

fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // flat series: no gains and no losses
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Current and previous RSI, each from its own `period + 1` window.
///
/// The previous window is the current one shifted back by a single close and
/// is seeded from scratch, not derived from the current value.
pub fn rsi_reading(closes: &[f64], period: usize) -> RsiReading {
    let closes: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();
    let window = period + 1;
    let len = closes.len();

    let current = (len >= window)
        .then(|| compute_rsi(&closes[len - window..], period))
        .flatten();
    let previous = (len > window)
        .then(|| compute_rsi(&closes[len - window - 1..len - 1], period))
        .flatten();

    RsiReading { current, previous }
}

/// Last two points of an indicator series already computed by the provider.
pub fn reading_from_series(values: &[f64]) -> RsiReading {
    let mut finite = values.iter().copied().filter(|v| v.is_finite()).rev();
    let current = finite.next();
    let previous = finite.next();
    RsiReading { current, previous }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WILDER: [f64; 15] = [
        44.0, 44.25, 44.5, 43.75, 44.65, 45.12, 45.34, 45.86, 46.48, 45.88, 45.82, 45.72, 46.21,
        46.21, 45.22,
    ];

    #[test]
    fn golden_wilder_example() {
        let rsi = compute_rsi(&WILDER, DEFAULT_PERIOD).unwrap();
        assert!((rsi - 59.807_073_954_983_9).abs() < 1e-9, "rsi = {rsi}");
    }

    #[test]
    fn needs_period_plus_one_points() {
        assert_eq!(compute_rsi(&WILDER[..14], 14), None);
        assert!(compute_rsi(&WILDER[..15], 14).is_some());
        assert_eq!(compute_rsi(&[], 14), None);
        assert_eq!(compute_rsi(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn constant_series() {
        assert_eq!(compute_rsi(&[10.0; 10], 14), None);
        assert_eq!(compute_rsi(&[10.0; 30], 14), Some(50.0));
    }

    #[test]
    fn strictly_increasing_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(compute_rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn strictly_decreasing_is_0() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert_eq!(compute_rsi(&closes, 14), Some(0.0));
    }

    #[test]
    fn deterministic() {
        let a = compute_rsi(&WILDER, 14).unwrap();
        let b = compute_rsi(&WILDER, 14).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn smoothing_applies_past_seed() {
        let mut closes = WILDER.to_vec();
        closes.push(46.0);
        // seeded on the first 15 closes, then one smoothing step
        let smoothed = compute_rsi(&closes, 14).unwrap();
        let reseeded = compute_rsi(&closes[1..], 14).unwrap();
        assert!((reseeded - 62.962_962_962_962_96).abs() < 1e-9);
        assert!((smoothed - reseeded).abs() > 1e-6);
    }

    #[test]
    fn skips_non_finite_entries() {
        let mut closes = WILDER.to_vec();
        closes.insert(3, f64::NAN);
        closes.insert(7, f64::INFINITY);
        assert_eq!(compute_rsi(&closes, 14), compute_rsi(&WILDER, 14));
    }

    #[test]
    fn reading_uses_independent_windows() {
        let mut closes = WILDER.to_vec();
        closes.push(46.0);

        let reading = rsi_reading(&closes, 14);
        assert_eq!(reading.current, compute_rsi(&closes[1..], 14));
        assert_eq!(reading.previous, compute_rsi(&closes[..15], 14));
        assert_eq!(reading.trend(), Trend::Up);
    }

    #[test]
    fn reading_with_exactly_one_window() {
        let reading = rsi_reading(&WILDER, 14);
        assert!(reading.current.is_some());
        assert_eq!(reading.previous, None);
        assert_eq!(reading.trend(), Trend::Neutral);

        assert_eq!(rsi_reading(&WILDER[..5], 14), RsiReading::default());
    }

    #[test]
    fn reading_from_provider_series() {
        let reading = reading_from_series(&[40.0, 45.5, f64::NAN, 41.0]);
        assert_eq!(reading.current, Some(41.0));
        assert_eq!(reading.previous, Some(45.5));
        assert_eq!(reading.trend(), Trend::Down);
        assert_eq!(reading_from_series(&[]), RsiReading::default());
    }
}
