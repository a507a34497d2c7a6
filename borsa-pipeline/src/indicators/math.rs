//! Series arithmetic behind the technical indicators.
//!
//! Every function returns a vector aligned with its input, holding NaN where
//! the value is undefined (warm-up period, NaN inputs, zero denominators).

/// Simple moving average; NaN until `window` values and wherever the window
/// contains a NaN.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Population standard deviation over a rolling window.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, population_std)
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for end in window..=values.len() {
        let w = &values[end - window..end];
        if w.iter().all(|v| v.is_finite()) {
            out[end - 1] = f(w);
        }
    }
    out
}

fn population_std(w: &[f64]) -> f64 {
    let mean = w.iter().sum::<f64>() / w.len() as f64;
    let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / w.len() as f64;
    var.sqrt()
}

/// Recursive exponential moving average with `alpha = 2 / (span + 1)`,
/// seeded with the first finite value. NaN for the first `span - 1`
/// observations.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = vec![f64::NAN; values.len()];
    let mut state: Option<f64> = None;
    let mut seen = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        let next = match state {
            None => v,
            Some(prev) => prev + alpha * (v - prev),
        };
        state = Some(next);
        seen += 1;
        if seen >= span {
            out[i] = next;
        }
    }
    out
}

/// Exponentially weighted mean with adjusted weights `(1 - alpha)^i`.
///
/// Defined once `min_periods` finite observations have been seen. NaN inputs
/// contribute nothing but still age the older weights.
pub fn ewm_adjusted(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let decay = 1.0 - alpha;
    let mut out = vec![f64::NAN; values.len()];
    let mut num = 0.0;
    let mut den = 0.0;
    let mut seen = 0usize;

    for (i, &v) in values.iter().enumerate() {
        num *= decay;
        den *= decay;
        if v.is_finite() {
            num += v;
            den += 1.0;
            seen += 1;
        }
        if seen >= min_periods && den > 0.0 {
            out[i] = num / den;
        }
    }
    out
}

/// First differences; the first element is NaN.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// RSI with center-of-mass `period - 1` adjusted averaging.
///
/// Undefined deltas (the first one, or next to a NaN close) count as zero
/// movement. NaN where the average loss and gain are both zero.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let deltas = diff(closes);
    let gains: Vec<f64> = deltas.iter().map(|&d| if d > 0.0 { d } else { 0.0 }).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| if d < 0.0 { -d } else { 0.0 }).collect();

    let alpha = 1.0 / period as f64;
    let avg_gain = ewm_adjusted(&gains, alpha, period);
    let avg_loss = ewm_adjusted(&losses, alpha, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if !g.is_finite() || !l.is_finite() {
                f64::NAN
            } else if l == 0.0 {
                if g > 0.0 {
                    100.0
                } else {
                    f64::NAN
                }
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}

/// MACD line, signal line and histogram.
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();
    Macd {
        line,
        signal: signal_line,
        histogram,
    }
}

/// Stochastic oscillator %K and its `smooth`-period SMA %D.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    window: usize,
    smooth: usize,
) -> (Vec<f64>, Vec<f64>) {
    let hh = rolling_max(highs, window);
    let ll = rolling_min(lows, window);
    let k: Vec<f64> = closes
        .iter()
        .zip(hh.iter().zip(&ll))
        .map(|(&c, (&h, &l))| safe_div(100.0 * (c - l), h - l))
        .collect();
    let d = sma(&k, smooth);
    (k, d)
}

pub fn typical_price(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    highs
        .iter()
        .zip(lows)
        .zip(closes)
        .map(|((h, l), c)| (h + l + c) / 3.0)
        .collect()
}

/// Commodity channel index using mean absolute deviation.
pub fn cci(highs: &[f64], lows: &[f64], closes: &[f64], window: usize, constant: f64) -> Vec<f64> {
    let tp = typical_price(highs, lows, closes);
    let mean = sma(&tp, window);
    let mad = rolling(&tp, window, |w| {
        let m = w.iter().sum::<f64>() / w.len() as f64;
        w.iter().map(|v| (v - m).abs()).sum::<f64>() / w.len() as f64
    });
    tp.iter()
        .zip(mean.iter().zip(&mad))
        .map(|(&t, (&m, &d))| safe_div(t - m, constant * d))
        .collect()
}

/// Bollinger bands: upper, middle, lower and width in percent of the middle.
pub struct Bollinger {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub width: Vec<f64>,
}

pub fn bollinger(closes: &[f64], window: usize, k: f64) -> Bollinger {
    let middle = sma(closes, window);
    let std = rolling_std(closes, window);
    let upper: Vec<f64> = middle.iter().zip(&std).map(|(m, s)| m + k * s).collect();
    let lower: Vec<f64> = middle.iter().zip(&std).map(|(m, s)| m - k * s).collect();
    let width = upper
        .iter()
        .zip(&lower)
        .zip(&middle)
        .map(|((u, l), m)| safe_div((u - l) * 100.0, *m))
        .collect();
    Bollinger {
        upper,
        middle,
        lower,
        width,
    }
}

/// True range; the first bar uses high − low.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                hl
            } else {
                let pc = closes[i - 1];
                hl.max((highs[i] - pc).abs()).max((lows[i] - pc).abs())
            }
        })
        .collect()
}

/// Wilder smoothing seeded with the mean of the first `window` values.
pub fn wilder(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let seed = &values[..window];
    if !seed.iter().all(|v| v.is_finite()) {
        return out;
    }
    let mut prev = seed.iter().sum::<f64>() / window as f64;
    out[window - 1] = prev;
    for i in window..values.len() {
        if values[i].is_finite() {
            prev = (prev * (window as f64 - 1.0) + values[i]) / window as f64;
        }
        out[i] = prev;
    }
    out
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], window: usize) -> Vec<f64> {
    wilder(&true_range(highs, lows, closes), window)
}

/// Rate of change in percent over `window` bars.
pub fn roc(closes: &[f64], window: usize) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            if i < window {
                f64::NAN
            } else {
                safe_div((closes[i] - closes[i - window]) * 100.0, closes[i - window])
            }
        })
        .collect()
}

/// Average directional index with the +DI and −DI lines.
pub struct Adx {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], window: usize) -> Adx {
    let n = closes.len();
    let tr = true_range(highs, lows, closes);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    // Wilder sums over bars 1..=window, then running updates
    let smooth = |x: &[f64]| -> Vec<f64> {
        let mut out = vec![f64::NAN; n];
        if n <= window {
            return out;
        }
        let mut s: f64 = x[1..=window].iter().sum();
        out[window] = s;
        for i in window + 1..n {
            s = s - s / window as f64 + x[i];
            out[i] = s;
        }
        out
    };
    let str_ = smooth(&tr);
    let spdm = smooth(&plus_dm);
    let smdm = smooth(&minus_dm);

    let plus_di: Vec<f64> = spdm.iter().zip(&str_).map(|(p, t)| safe_div(100.0 * p, *t)).collect();
    let minus_di: Vec<f64> = smdm.iter().zip(&str_).map(|(m, t)| safe_div(100.0 * m, *t)).collect();
    let dx: Vec<f64> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(p, m)| safe_div(100.0 * (p - m).abs(), p + m))
        .collect();

    let mut adx = vec![f64::NAN; n];
    let first = window; // first defined DX
    if n >= first + window {
        let seed = &dx[first..first + window];
        if seed.iter().all(|v| v.is_finite()) {
            let mut prev = seed.iter().sum::<f64>() / window as f64;
            adx[first + window - 1] = prev;
            for i in first + window..n {
                if dx[i].is_finite() {
                    prev = (prev * (window as f64 - 1.0) + dx[i]) / window as f64;
                }
                adx[i] = prev;
            }
        }
    }

    Adx {
        adx,
        plus_di,
        minus_di,
    }
}

/// Money flow index.
pub fn mfi(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64], window: usize) -> Vec<f64> {
    let n = closes.len();
    let tp = typical_price(highs, lows, closes);
    let mut pos = vec![0.0; n];
    let mut neg = vec![0.0; n];
    for i in 1..n {
        let flow = tp[i] * volumes[i];
        if tp[i] > tp[i - 1] {
            pos[i] = flow;
        } else if tp[i] < tp[i - 1] {
            neg[i] = flow;
        }
    }
    let mut out = vec![f64::NAN; n];
    for i in window..n {
        let p: f64 = pos[i + 1 - window..=i].iter().sum();
        let m: f64 = neg[i + 1 - window..=i].iter().sum();
        out[i] = safe_div(100.0 * p, p + m);
    }
    out
}

/// Division yielding NaN for zero or non-finite denominators.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        f64::NAN
    } else {
        num / den
    }
}

/// The last value if it is finite.
pub fn last_finite(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

/// Population mean of the finite values, `None` when there are none.
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}
