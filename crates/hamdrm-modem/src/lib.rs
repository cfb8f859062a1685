//! End-to-end encoder/decoder pair for the hamdrm digital-SSTV
//! waveform: opaque payload bytes in, 12 kHz PCM audio out, and back.

mod wav;

use std::time::Instant;

use hamdrm_core::{
    FAC_BITS, FAC_BITS_PER_FRAME, FRAME_SAMPLES, FacParams, FrameLayout, INTERNAL_SAMPLE_RATE_HZ,
    MAX_PAYLOAD_BYTES, MAX_SEGMENT_DATA_BYTES, MSC_BITS_PER_FRAME, MSC_BITS_PER_SUPERFRAME,
    MSC_CELLS_PER_FRAME, PUNCTURE_MSC, RobustnessMode, SDC_BITS_PER_FRAME, SpectrumOccupancy,
    pack_bits, unpack_bits,
};
use hamdrm_fec::{
    FecError, FrequencyInterleaver, TIME_INTERLEAVER_COLS, TimeInterleaver, conv_encode,
    viterbi_decode,
};
use hamdrm_link::{
    FrameError, decode_fac, decode_sdc, deserialise_segments, encode_fac, encode_sdc,
    reassemble_msc, segment_msc, serialise_segment,
};
use hamdrm_phy::{
    ChannelEstimator, DataCell, FrameGrid, OfdmModulator, PhyError, Qam4, Qam16, coarse_sync,
    demodulate_frame, equalize, estimate_snr_db,
};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hamdrm_link::SdcInfo;
pub use wav::{parse_wav, resample_linear, write_wav};

pub const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModemError {
    #[error("payload exceeds the 24-bit length field")]
    PayloadTooLarge,
    #[error("malformed wav input")]
    InputMalformed,
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl From<FecError> for ModemError {
    fn from(_: FecError) -> Self {
        Self::Internal("interleaver length mismatch")
    }
}

impl From<PhyError> for ModemError {
    fn from(_: PhyError) -> Self {
        Self::Internal("frame demodulation out of bounds")
    }
}

/// Receiver-side report for one decode call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub sample_rate_in: u32,
    pub file_duration_s: f64,
    pub mode: RobustnessMode,
    pub spectrum_occupancy: SpectrumOccupancy,
    pub fec_rate: String,
    pub snr_db: f64,
    pub frames_decoded: usize,
    pub segment_errors: usize,
    pub decode_duration_ms: f64,
}

#[derive(Debug, Clone)]
pub struct DecodeOutput {
    /// Reassembled payload; `None` when segments are missing or corrupt.
    pub payload: Option<Vec<u8>>,
    /// Service description, when enough SDC bits were recovered.
    pub sdc: Option<SdcInfo>,
    pub diagnostics: Diagnostics,
}

struct Machinery {
    layout: FrameLayout,
    freq: FrequencyInterleaver,
    time: TimeInterleaver,
    qam16: Qam16,
    qam4: Qam4,
}

impl Machinery {
    fn new() -> Self {
        let layout = FrameLayout::new();
        let freq = FrequencyInterleaver::new(layout.msc_group_lens());
        let time = TimeInterleaver::new(MSC_CELLS_PER_FRAME, TIME_INTERLEAVER_COLS);
        Self {
            layout,
            freq,
            time,
            qam16: Qam16::new(),
            qam4: Qam4::new(),
        }
    }
}

/// Encode a payload into the normalised 12 kHz sample stream. The
/// output length is always a whole number of super-frames.
pub fn encode_samples(payload: &[u8], mime: &str) -> Result<Vec<f64>, ModemError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(ModemError::PayloadTooLarge);
    }
    let m = Machinery::new();
    let modulator = OfdmModulator::new(m.layout.clone());

    let segments = segment_msc(payload).map_err(|_| ModemError::PayloadTooLarge)?;
    let mut stream = Vec::new();
    for segment in &segments {
        stream.extend_from_slice(&serialise_segment(segment));
    }
    let bits = unpack_bits(&stream, stream.len() * 8);

    let mut coded = conv_encode(&bits, &PUNCTURE_MSC);
    let target = coded.len().div_ceil(MSC_BITS_PER_SUPERFRAME).max(1) * MSC_BITS_PER_SUPERFRAME;
    coded.resize(target, 0);

    let fac_bits = encode_fac(&FacParams::default());
    let sdc_bytes = encode_sdc(payload.len(), mime).map_err(|_| ModemError::PayloadTooLarge)?;
    let sdc_bits = unpack_bits(&sdc_bytes, sdc_bytes.len() * 8);

    let frames = coded.len() / MSC_BITS_PER_FRAME;
    let mut samples = Vec::with_capacity(frames * FRAME_SAMPLES);
    for frame in 0..frames {
        let frame_bits = &coded[frame * MSC_BITS_PER_FRAME..(frame + 1) * MSC_BITS_PER_FRAME];
        let cells: Vec<Complex64> = frame_bits.chunks(4).map(|c| m.qam16.map(c)).collect();
        let cells = m.time.interleave(&m.freq.interleave(&cells)?)?;

        let mut data_cells = Vec::with_capacity(cells.len() + 8);
        for (&(symbol, carrier), value) in m.layout.msc_slots().iter().zip(cells) {
            data_cells.push(DataCell {
                symbol: usize::from(symbol),
                carrier: usize::from(carrier),
                value,
            });
        }

        let fac_off = (frame * FAC_BITS_PER_FRAME) % FAC_BITS;
        for (j, &(symbol, carrier)) in m.layout.fac_slots().iter().enumerate() {
            data_cells.push(DataCell {
                symbol: usize::from(symbol),
                carrier: usize::from(carrier),
                value: m.qam4.map(&fac_bits[fac_off + 2 * j..fac_off + 2 * j + 2]),
            });
        }

        let l = sdc_bits.len();
        let sdc_off = (frame * SDC_BITS_PER_FRAME) % l;
        for (j, &(symbol, carrier)) in m.layout.sdc_slots().iter().enumerate() {
            let pair = [
                sdc_bits[(sdc_off + 2 * j) % l],
                sdc_bits[(sdc_off + 2 * j + 1) % l],
            ];
            data_cells.push(DataCell {
                symbol: usize::from(symbol),
                carrier: usize::from(carrier),
                value: m.qam4.map(&pair),
            });
        }

        samples.extend(modulator.modulate_frame(&data_cells));
    }

    let peak = samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
    if peak > 1e-9 {
        let gain = 0.9 / peak;
        for sample in &mut samples {
            *sample *= gain;
        }
    }
    Ok(samples)
}

/// Encode straight to WAV bytes.
pub fn encode_wav(payload: &[u8], mime: &str) -> Result<Vec<u8>, ModemError> {
    Ok(wav::write_wav(&encode_samples(payload, mime)?))
}

/// Decode from WAV bytes.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodeOutput, ModemError> {
    let (samples, rate) = wav::parse_wav(bytes)?;
    decode_samples(&samples, rate)
}

/// Decode from raw samples at an arbitrary rate.
pub fn decode_samples(samples: &[f64], sample_rate: u32) -> Result<DecodeOutput, ModemError> {
    let started = Instant::now();
    if sample_rate == 0 {
        return Err(ModemError::InputMalformed);
    }
    let file_duration_s = samples.len() as f64 / f64::from(sample_rate);

    let resampled;
    let samples = if sample_rate != INTERNAL_SAMPLE_RATE_HZ {
        resampled = wav::resample_linear(samples, sample_rate, INTERNAL_SAMPLE_RATE_HZ);
        &resampled[..]
    } else {
        samples
    };

    let start = coarse_sync(samples);
    if samples.len() < start + FRAME_SAMPLES {
        return Err(ModemError::InputMalformed);
    }
    let frames = (samples.len() - start) / FRAME_SAMPLES;

    let m = Machinery::new();
    let mut estimator = ChannelEstimator::new(m.layout.clone());
    let mut msc_bits = Vec::with_capacity(frames * MSC_BITS_PER_FRAME);
    let mut fac_bits = Vec::with_capacity(frames * FAC_BITS_PER_FRAME);
    let mut sdc_bits = Vec::with_capacity(frames * SDC_BITS_PER_FRAME);
    let mut snr_db = 40.0;

    for frame in 0..frames {
        let grid = demodulate_frame(samples, start + frame * FRAME_SAMPLES)?;
        if frame == 0 {
            snr_db = estimate_snr_db(&grid, &m.layout);
        }

        let mut equalised: FrameGrid = Vec::with_capacity(grid.len());
        for (symbol, row) in grid.iter().enumerate() {
            let h = estimator.estimate_symbol(symbol, row);
            let mut out = *row;
            for (idx, cell) in out.iter_mut().enumerate() {
                *cell = equalize(*cell, h[idx]);
            }
            equalised.push(out);
        }

        let msc_cells: Vec<Complex64> = m
            .layout
            .msc_slots()
            .iter()
            .map(|&(s, c)| equalised[usize::from(s)][usize::from(c)])
            .collect();
        let cells = m.freq.deinterleave(&m.time.deinterleave(&msc_cells)?)?;
        for cell in cells {
            msc_bits.extend_from_slice(&m.qam16.demap(cell));
        }
        for &(s, c) in m.layout.fac_slots() {
            fac_bits.extend_from_slice(&m.qam4.demap(equalised[usize::from(s)][usize::from(c)]));
        }
        for &(s, c) in m.layout.sdc_slots() {
            sdc_bits.extend_from_slice(&m.qam4.demap(equalised[usize::from(s)][usize::from(c)]));
        }
    }

    let fac = if fac_bits.len() >= FAC_BITS {
        decode_fac(&fac_bits[..FAC_BITS]).ok()
    } else {
        None
    };
    let fac_params = fac.unwrap_or_default();
    let sdc = decode_sdc(&pack_bits(&sdc_bits)).ok();

    let decoded = viterbi_decode(&msc_bits, &PUNCTURE_MSC);
    let bytes = pack_bits(&decoded);
    let segments = deserialise_segments(&bytes, sdc.as_ref().map(|s| s.payload_len));

    let expected_total = match &sdc {
        Some(info) => info
            .payload_len
            .div_ceil(MAX_SEGMENT_DATA_BYTES)
            .max(1)
            .min(u16::MAX as usize) as u16,
        None => segments.first().map_or(0, |s| s.total),
    };

    let (payload, segment_errors) = if expected_total == 0 {
        (None, 1)
    } else {
        let mut present = vec![false; usize::from(expected_total)];
        for segment in &segments {
            if usize::from(segment.seg_no) < present.len() {
                present[usize::from(segment.seg_no)] = true;
            }
        }
        let errors = present.iter().filter(|&&p| !p).count();
        match reassemble_msc(&segments, expected_total) {
            Ok(payload) => (Some(payload), errors),
            Err(FrameError::Missing(_)) => (None, errors.max(1)),
            Err(_) => (None, errors.max(1)),
        }
    };

    Ok(DecodeOutput {
        payload,
        sdc,
        diagnostics: Diagnostics {
            sample_rate_in: sample_rate,
            file_duration_s,
            mode: fac_params.mode,
            spectrum_occupancy: fac_params.occupancy,
            fec_rate: fac_params.fec_rate_label().to_owned(),
            snr_db,
            frames_decoded: frames,
            segment_errors,
            decode_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        },
    })
}

#[cfg(test)]
mod tests {
    use hamdrm_core::SYMBOL_SAMPLES;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn ten_byte_round_trip() {
        let payload: Vec<u8> = (0..10u8).collect();
        let wav_bytes = encode_wav(&payload, DEFAULT_MIME).expect("payload fits");

        // One super-frame: 3 frames of 4800 samples, 2 bytes each.
        let data_bytes = u32::from_le_bytes(wav_bytes[40..44].try_into().expect("header"));
        assert_eq!(data_bytes % 9600, 0);
        assert_eq!(usize::try_from(data_bytes).expect("fits") % (SYMBOL_SAMPLES * 2), 0);

        let out = decode_wav(&wav_bytes).expect("well formed");
        assert_eq!(out.payload.as_deref(), Some(payload.as_slice()));
        assert_eq!(out.diagnostics.segment_errors, 0);
        assert_eq!(out.diagnostics.frames_decoded, 3);
        assert_eq!(out.diagnostics.mode, RobustnessMode::B);
        assert_eq!(out.diagnostics.spectrum_occupancy, SpectrumOccupancy::So0);
        assert_eq!(out.diagnostics.fec_rate, "1/2");
        // Quantisation noise from the 16-bit PCM path keeps the pilot
        // SNR at or above the clean-channel floor.
        assert!(out.diagnostics.snr_db >= 40.0);
    }

    #[test]
    fn one_byte_round_trip() {
        let wav_bytes = encode_wav(&[0xA7], DEFAULT_MIME).expect("payload fits");
        let out = decode_wav(&wav_bytes).expect("well formed");
        assert_eq!(out.payload.as_deref(), Some(&[0xA7][..]));
    }

    #[test]
    fn empty_payload_round_trip() {
        let wav_bytes = encode_wav(&[], DEFAULT_MIME).expect("payload fits");
        let out = decode_wav(&wav_bytes).expect("well formed");
        assert_eq!(out.payload.as_deref(), Some(&[][..]));
        assert_eq!(out.diagnostics.segment_errors, 0);
    }

    #[test]
    fn multi_segment_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5357);
        let payload: Vec<u8> = (0..2000).map(|_| rng.random()).collect();
        let samples = encode_samples(&payload, "image/png").expect("payload fits");
        let out = decode_samples(&samples, INTERNAL_SAMPLE_RATE_HZ).expect("decodes");
        assert_eq!(out.payload.as_deref(), Some(payload.as_slice()));
        assert_eq!(out.diagnostics.segment_errors, 0);
    }

    #[test]
    fn survives_light_noise() {
        let mut rng = StdRng::seed_from_u64(17);
        let payload: Vec<u8> = (0..600).map(|_| rng.random()).collect();
        let mut samples = encode_samples(&payload, DEFAULT_MIME).expect("payload fits");
        for sample in &mut samples {
            *sample += (rng.random::<f64>() - 0.5) * 0.05;
        }
        let out = decode_samples(&samples, INTERNAL_SAMPLE_RATE_HZ).expect("decodes");
        assert_eq!(out.payload.as_deref(), Some(payload.as_slice()));
        assert!(out.diagnostics.snr_db < 40.0);
    }

    #[test]
    fn sdc_is_recovered_on_long_transmissions() {
        let mut rng = StdRng::seed_from_u64(3);
        // 18 KB spans enough frames for both FAC and SDC accumulation.
        let payload: Vec<u8> = (0..18_000).map(|_| rng.random()).collect();
        let samples = encode_samples(&payload, "image/png").expect("payload fits");
        let out = decode_samples(&samples, INTERNAL_SAMPLE_RATE_HZ).expect("decodes");
        assert_eq!(out.payload.as_deref(), Some(payload.as_slice()));
        let sdc = out.sdc.expect("sdc recovered");
        assert_eq!(sdc.payload_len, payload.len());
        assert_eq!(sdc.mime, "image/png");
    }

    #[test]
    fn oversize_payload_is_refused() {
        let payload = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        assert_eq!(
            encode_wav(&payload, DEFAULT_MIME),
            Err(ModemError::PayloadTooLarge)
        );
    }

    #[test]
    fn short_sample_input_is_rejected() {
        assert!(matches!(
            decode_samples(&[0.0; 1000], INTERNAL_SAMPLE_RATE_HZ),
            Err(ModemError::InputMalformed)
        ));
    }
}
