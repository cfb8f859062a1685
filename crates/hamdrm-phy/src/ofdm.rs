use core::f64::consts::SQRT_2;

use hamdrm_core::{
    CARRIERS_PER_SYMBOL, FFT_SIZE, FRAME_SAMPLES, FrameLayout, GUARD_SAMPLES, SYMBOL_SAMPLES,
    SYMBOLS_PER_FRAME, carrier_bin, carrier_offset,
};
use num_complex::Complex64;
use thiserror::Error;

use crate::fft::fft_in_place;

/// Reference value transmitted on every pilot slot (~ +3 dB over data).
pub const PILOT_VALUE: Complex64 = Complex64::new(SQRT_2, 0.0);

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhyError {
    #[error("not enough samples for a frame")]
    ShortInput,
}

/// One data cell addressed by (symbol, carrier index) within a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataCell {
    pub symbol: usize,
    pub carrier: usize,
    pub value: Complex64,
}

/// Received carriers of one frame: 15 symbols x 29 active carriers.
pub type FrameGrid = Vec<[Complex64; CARRIERS_PER_SYMBOL]>;

#[derive(Debug, Clone)]
pub struct OfdmModulator {
    layout: FrameLayout,
}

impl OfdmModulator {
    #[must_use]
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    /// Produce one frame of real audio (4800 samples): per symbol the
    /// active carriers are written into a 256-bin spectrum (pilot slots
    /// get the pilot value), inverse transformed, and emitted as guard
    /// interval plus useful part.
    ///
    /// No output scaling happens here; peak normalisation is a single
    /// pass over the whole transmission.
    #[must_use]
    pub fn modulate_frame(&self, cells: &[DataCell]) -> Vec<f64> {
        let mut grid = [[ZERO; CARRIERS_PER_SYMBOL]; SYMBOLS_PER_FRAME];
        for cell in cells {
            grid[cell.symbol][cell.carrier] = cell.value;
        }

        let mut out = Vec::with_capacity(FRAME_SAMPLES);
        let mut spectrum = [ZERO; FFT_SIZE];
        for (symbol, row) in grid.iter().enumerate() {
            spectrum.fill(ZERO);
            for (idx, &value) in row.iter().enumerate() {
                let bin = carrier_bin(carrier_offset(idx));
                spectrum[bin] = if self.layout.is_pilot(symbol, idx) {
                    PILOT_VALUE
                } else {
                    value
                };
            }
            fft_in_place(&mut spectrum, true);

            for sample in &spectrum[FFT_SIZE - GUARD_SAMPLES..] {
                out.push(sample.re);
            }
            for sample in &spectrum[..FFT_SIZE] {
                out.push(sample.re);
            }
        }
        out
    }
}

/// Coarse time synchronisation: the guard interval repeats the tail of
/// the useful part, so the lag-N_u autocorrelation peaks at a symbol
/// boundary. Earliest candidate wins on (floating-point) ties.
#[must_use]
pub fn coarse_sync(samples: &[f64]) -> usize {
    if samples.len() < SYMBOL_SAMPLES {
        return 0;
    }
    let limit = (2 * SYMBOL_SAMPLES).min(samples.len() - SYMBOL_SAMPLES);

    let mut best_p = 0usize;
    let mut best = -1.0f64;
    for p in 0..limit {
        let mut corr = 0.0;
        let mut head = 0.0;
        let mut tail = 0.0;
        for i in 0..GUARD_SAMPLES {
            let a = samples[p + i];
            let b = samples[p + FFT_SIZE + i];
            corr += a * b;
            head += a * a;
            tail += b * b;
        }
        let denom = (head * tail).sqrt();
        let c = if denom > 1e-30 { corr.abs() / denom } else { 0.0 };
        if c > best + 1e-9 {
            best = c;
            best_p = p;
        }
    }
    best_p
}

/// Demodulate one frame starting at `start`: skip each guard, forward
/// FFT, read the active bins scaled by 1/N_u.
pub fn demodulate_frame(samples: &[f64], start: usize) -> Result<FrameGrid, PhyError> {
    if start + FRAME_SAMPLES > samples.len() {
        return Err(PhyError::ShortInput);
    }

    let mut grid: FrameGrid = vec![[ZERO; CARRIERS_PER_SYMBOL]; SYMBOLS_PER_FRAME];
    let mut buf = [ZERO; FFT_SIZE];
    for (symbol, row) in grid.iter_mut().enumerate() {
        let base = start + symbol * SYMBOL_SAMPLES + GUARD_SAMPLES;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex64::new(samples[base + i], 0.0);
        }
        fft_in_place(&mut buf, false);

        for (idx, cell) in row.iter_mut().enumerate() {
            let bin = carrier_bin(carrier_offset(idx));
            *cell = buf[bin] / FFT_SIZE as f64;
        }
    }
    Ok(grid)
}

/// Guarded zero-forcing division of a received cell by the channel
/// estimate.
#[must_use]
pub fn equalize(rx: Complex64, h: Complex64) -> Complex64 {
    let d = h.norm_sqr();
    if d < 1e-12 {
        ZERO
    } else {
        Complex64::new(
            (rx.re * h.re + rx.im * h.im) / d,
            (rx.im * h.re - rx.re * h.im) / d,
        )
    }
}

/// Per-symbol pilot-based channel estimator with linear interpolation
/// across carriers. A symbol without pilots (cannot happen with the
/// fixed layout, but the fallback is kept) reuses the previous
/// symbol's estimate, or a unit response before any pilot was seen.
#[derive(Debug, Clone)]
pub struct ChannelEstimator {
    layout: FrameLayout,
    prev: Option<[Complex64; CARRIERS_PER_SYMBOL]>,
}

impl ChannelEstimator {
    #[must_use]
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout, prev: None }
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }

    /// Estimate the channel response across all active carriers of one
    /// received symbol.
    pub fn estimate_symbol(
        &mut self,
        symbol: usize,
        rx: &[Complex64; CARRIERS_PER_SYMBOL],
    ) -> [Complex64; CARRIERS_PER_SYMBOL] {
        let pilots: Vec<(usize, Complex64)> = (0..CARRIERS_PER_SYMBOL)
            .filter(|&idx| self.layout.is_pilot(symbol, idx))
            .map(|idx| (idx, rx[idx] / PILOT_VALUE))
            .collect();

        if pilots.is_empty() {
            return self.prev.unwrap_or([ONE; CARRIERS_PER_SYMBOL]);
        }

        let mut estimate = [ONE; CARRIERS_PER_SYMBOL];
        for (idx, slot) in estimate.iter_mut().enumerate() {
            let before = pilots.iter().rev().find(|&&(p, _)| p <= idx);
            let after = pilots.iter().find(|&&(p, _)| p >= idx);
            *slot = match (before, after) {
                (Some(&(bi, bh)), Some(&(ai, ah))) => {
                    if bi == ai {
                        bh
                    } else {
                        let t = (idx - bi) as f64 / (ai - bi) as f64;
                        bh + (ah - bh) * t
                    }
                }
                (Some(&(_, bh)), None) => bh,
                (None, Some(&(_, ah))) => ah,
                (None, None) => ONE,
            };
        }

        self.prev = Some(estimate);
        estimate
    }
}

/// Pilot-referenced SNR estimate in dB for one demodulated frame.
///
/// Pilot cells are equalised against the frame's time-averaged
/// per-carrier pilot response, so per-symbol deviation shows up as
/// noise; a clean channel floors at +40 dB.
#[must_use]
pub fn estimate_snr_db(grid: &FrameGrid, layout: &FrameLayout) -> f64 {
    let mut sums = [ZERO; CARRIERS_PER_SYMBOL];
    let mut counts = [0u32; CARRIERS_PER_SYMBOL];
    for (symbol, row) in grid.iter().enumerate() {
        for (idx, &rx) in row.iter().enumerate() {
            if layout.is_pilot(symbol, idx) {
                sums[idx] += rx / PILOT_VALUE;
                counts[idx] += 1;
            }
        }
    }

    let mut signal = 0.0;
    let mut noise = 0.0;
    let mut observed = 0usize;
    for (symbol, row) in grid.iter().enumerate() {
        for (idx, &rx) in row.iter().enumerate() {
            if layout.is_pilot(symbol, idx) && counts[idx] > 0 {
                let mean_h = sums[idx] / f64::from(counts[idx]);
                let eq = equalize(rx, mean_h);
                signal += PILOT_VALUE.norm_sqr();
                noise += (eq - PILOT_VALUE).norm_sqr();
                observed += 1;
            }
        }
    }

    if observed == 0 || noise < 1e-15 {
        40.0
    } else {
        10.0 * (signal / noise).log10()
    }
}
