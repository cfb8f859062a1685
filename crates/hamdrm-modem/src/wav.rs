use hamdrm_core::INTERNAL_SAMPLE_RATE_HZ;

use crate::ModemError;

/// Render samples as a 16-bit little-endian mono PCM WAV at the
/// internal rate.
#[must_use]
pub fn write_wav(samples: &[f64]) -> Vec<u8> {
    let data_bytes = samples.len() * 2;
    let mut out = Vec::with_capacity(44 + data_bytes);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_bytes as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&INTERNAL_SAMPLE_RATE_HZ.to_le_bytes());
    out.extend_from_slice(&(INTERNAL_SAMPLE_RATE_HZ * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_bytes as u32).to_le_bytes());
    for &sample in samples {
        let v = (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parse a 16-bit mono PCM WAV, walking RIFF chunks. Returns samples
/// scaled to [-1, 1) and the file's sample rate.
pub fn parse_wav(bytes: &[u8]) -> Result<(Vec<f64>, u32), ModemError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(ModemError::InputMalformed);
    }

    let mut pos = 12usize;
    let mut fmt: Option<u32> = None;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;
        let body = pos + 8;
        if body + size > bytes.len() {
            return Err(ModemError::InputMalformed);
        }

        match id {
            b"fmt " => {
                if size < 16 {
                    return Err(ModemError::InputMalformed);
                }
                let format = u16::from_le_bytes([bytes[body], bytes[body + 1]]);
                let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
                let rate = u32::from_le_bytes([
                    bytes[body + 4],
                    bytes[body + 5],
                    bytes[body + 6],
                    bytes[body + 7],
                ]);
                let bits = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
                if format != 1 || channels != 1 || bits != 16 || rate == 0 {
                    return Err(ModemError::InputMalformed);
                }
                fmt = Some(rate);
            }
            b"data" => {
                let rate = fmt.ok_or(ModemError::InputMalformed)?;
                if size % 2 != 0 {
                    return Err(ModemError::InputMalformed);
                }
                let samples = bytes[body..body + size]
                    .chunks_exact(2)
                    .map(|pair| f64::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
                    .collect();
                return Ok((samples, rate));
            }
            _ => {}
        }
        pos = body + size + (size & 1);
    }
    Err(ModemError::InputMalformed)
}

/// Linear-interpolation resampler for the decoder input boundary.
#[must_use]
pub fn resample_linear(input: &[f64], from_hz: u32, to_hz: u32) -> Vec<f64> {
    if input.is_empty() || from_hz == to_hz || from_hz == 0 || to_hz == 0 {
        return input.to_vec();
    }
    let out_len = input.len().saturating_mul(to_hz as usize) / from_hz as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos_num = i.saturating_mul(from_hz as usize);
        let idx = pos_num / to_hz as usize;
        let frac = (pos_num % to_hz as usize) as f64 / f64::from(to_hz);
        let a = input.get(idx).copied().unwrap_or(0.0);
        let b = input.get(idx + 1).copied().unwrap_or(a);
        out.push(a * (1.0 - frac) + b * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_bit_exact() {
        let wav = write_wav(&[0.0; 4]);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 8);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 12_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 24_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(wav.len(), 44 + 8);
    }

    #[test]
    fn wav_round_trip() {
        let samples = [0.0, 0.5, -0.5, 0.25, -1.0];
        let wav = write_wav(&samples);
        let (parsed, rate) = parse_wav(&wav).expect("well formed");
        assert_eq!(rate, 12_000);
        assert_eq!(parsed.len(), samples.len());
        for (a, b) in parsed.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut wav = write_wav(&[0.0; 4]);
        wav[0] = b'X';
        assert!(matches!(parse_wav(&wav), Err(ModemError::InputMalformed)));
    }

    #[test]
    fn truncated_data_chunk_is_rejected() {
        let wav = write_wav(&[0.0; 64]);
        assert!(matches!(
            parse_wav(&wav[..wav.len() - 10]),
            Err(ModemError::InputMalformed)
        ));
    }

    #[test]
    fn resample_passthrough_and_ratio() {
        let input: Vec<f64> = (0..480).map(|i| (i as f64 * 0.13).sin()).collect();
        assert_eq!(resample_linear(&input, 12_000, 12_000), input);

        let down = resample_linear(&input, 48_000, 12_000);
        assert_eq!(down.len(), input.len() / 4);
        assert!((down[1] - input[4]).abs() < 1e-12);
    }
}
