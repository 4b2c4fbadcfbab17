//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first value, then EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are undefined.

/// Unmasked recursive EMA over the whole input, seeded with `values[0]`.
pub(crate) fn ema_raw(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if span == 0 {
        return out;
    }
    let k = 2.0 / (span as f64 + 1.0);
    let mut ema = 0.0;
    for (i, &x) in values.iter().enumerate() {
        ema = if i == 0 { x } else { x * k + ema * (1.0 - k) };
        out.push(ema);
    }
    out
}

pub fn calculate_ema(values: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; values.len()];
    }
    ema_raw(values, span)
        .into_iter()
        .enumerate()
        .map(|(i, v)| if i + 1 < span { None } else { Some(v) })
        .collect()
}
