#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use hamdrm_core::{
    FAC_BITS, FAC_DATA_BITS, FacParams, MAX_MIME_BYTES, MAX_PAYLOAD_BYTES, MAX_SEGMENT_DATA_BYTES,
    MAX_SEGMENT_WIRE_BYTES, QamOrder, RobustnessMode, SEGMENT_HEADER_BYTES, SpectrumOccupancy,
    crc8_fac, crc16_ccitt_false, pack_bits, unpack_bits,
};
use heapless::Vec as HVec;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("crc mismatch")]
    CrcMismatch,
    #[error("record too short")]
    TooShort,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("segment {0} missing")]
    Missing(u16),
}

fn put_field(bits: &mut [u8], start: usize, width: usize, value: u8) {
    for j in 0..width {
        bits[start + j] = (value >> (width - 1 - j)) & 1;
    }
}

fn get_field(bits: &[u8], start: usize, width: usize) -> u8 {
    let mut out = 0u8;
    for j in 0..width {
        out = (out << 1) | (bits[start + j] & 1);
    }
    out
}

fn qam_to_field(order: QamOrder) -> u8 {
    match order {
        QamOrder::Qam4 => 0b001,
        QamOrder::Qam16 => 0b011,
    }
}

fn qam_from_field(v: u8, fallback: QamOrder) -> QamOrder {
    match v {
        0b001 => QamOrder::Qam4,
        0b011 => QamOrder::Qam16,
        _ => fallback,
    }
}

/// Build the 72-bit FAC word: 64 packed parameter bits followed by
/// their CRC-8.
#[must_use]
pub fn encode_fac(params: &FacParams) -> Vec<u8> {
    let mut data = [0u8; FAC_DATA_BITS];
    put_field(&mut data, 0, 2, params.mode.to_field());
    put_field(&mut data, 2, 3, params.occupancy.to_field());
    data[5] = u8::from(params.long_interleave);
    put_field(&mut data, 6, 3, qam_to_field(params.msc_qam));
    put_field(&mut data, 9, 3, qam_to_field(params.sdc_qam));
    put_field(&mut data, 12, 2, params.num_services.saturating_sub(1));
    data[14] = u8::from(params.data_service);
    put_field(&mut data, 21, 7, params.service_id & 0x7F);

    let packed = pack_bits(&data);
    let crc = crc8_fac(&packed);

    let mut bits = Vec::with_capacity(FAC_BITS);
    bits.extend_from_slice(&data);
    bits.extend_from_slice(&unpack_bits(&[crc], 8));
    bits
}

/// Parse and CRC-check a received FAC word.
pub fn decode_fac(bits: &[u8]) -> Result<FacParams, FrameError> {
    if bits.len() < FAC_BITS {
        return Err(FrameError::TooShort);
    }
    let packed = pack_bits(&bits[..FAC_DATA_BITS]);
    let crc = pack_bits(&bits[FAC_DATA_BITS..FAC_BITS])[0];
    if crc8_fac(&packed) != crc {
        return Err(FrameError::CrcMismatch);
    }

    let data = &bits[..FAC_DATA_BITS];
    Ok(FacParams {
        mode: RobustnessMode::from_field(get_field(data, 0, 2)),
        occupancy: SpectrumOccupancy::from_field(get_field(data, 2, 3)),
        long_interleave: data[5] == 1,
        msc_qam: qam_from_field(get_field(data, 6, 3), QamOrder::Qam16),
        sdc_qam: qam_from_field(get_field(data, 9, 3), QamOrder::Qam4),
        num_services: get_field(data, 12, 2) + 1,
        data_service: data[14] == 1,
        service_id: get_field(data, 21, 7),
    })
}

/// Service description carried by the SDC: end-to-end payload length
/// and MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdcInfo {
    pub payload_len: usize,
    pub mime: String,
}

/// `len_24be || mime (clipped to 32 bytes) || 0x00 || crc16_be`.
pub fn encode_sdc(payload_len: usize, mime: &str) -> Result<Vec<u8>, FrameError> {
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(FrameError::PayloadTooLarge);
    }
    let mime_bytes = mime.as_bytes();
    let mime_bytes = &mime_bytes[..mime_bytes.len().min(MAX_MIME_BYTES)];

    let mut out = Vec::with_capacity(3 + mime_bytes.len() + 3);
    out.push((payload_len >> 16) as u8);
    out.push((payload_len >> 8) as u8);
    out.push(payload_len as u8);
    out.extend_from_slice(mime_bytes);
    out.push(0x00);
    let crc = crc16_ccitt_false(&out);
    out.push((crc >> 8) as u8);
    out.push(crc as u8);
    Ok(out)
}

/// Parse and CRC-check an SDC record from the head of `bytes`; extra
/// trailing bytes are ignored.
pub fn decode_sdc(bytes: &[u8]) -> Result<SdcInfo, FrameError> {
    if bytes.len() < 6 {
        return Err(FrameError::TooShort);
    }
    let payload_len =
        (usize::from(bytes[0]) << 16) | (usize::from(bytes[1]) << 8) | usize::from(bytes[2]);
    let rel = bytes[3..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(FrameError::TooShort)?;
    let term = 3 + rel;
    if term + 3 > bytes.len() {
        return Err(FrameError::TooShort);
    }
    let stored = (u16::from(bytes[term + 1]) << 8) | u16::from(bytes[term + 2]);
    if crc16_ccitt_false(&bytes[..=term]) != stored {
        return Err(FrameError::CrcMismatch);
    }
    Ok(SdcInfo {
        payload_len,
        mime: String::from_utf8_lossy(&bytes[3..term]).into_owned(),
    })
}

/// One MSC payload segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seg_no: u16,
    pub total: u16,
    pub data: HVec<u8, MAX_SEGMENT_DATA_BYTES>,
}

/// Split a payload into numbered segments of at most 796 data bytes.
/// The empty payload becomes a single empty segment so the stream
/// stays parseable.
pub fn segment_msc(payload: &[u8]) -> Result<Vec<Segment>, FrameError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(FrameError::PayloadTooLarge);
    }
    let total = payload.len().div_ceil(MAX_SEGMENT_DATA_BYTES).max(1);

    let mut out = Vec::with_capacity(total);
    for i in 0..total {
        let start = i * MAX_SEGMENT_DATA_BYTES;
        let end = (start + MAX_SEGMENT_DATA_BYTES).min(payload.len());
        let mut data = HVec::new();
        data.extend_from_slice(&payload[start..end])
            .expect("segment data fits");
        out.push(Segment {
            seg_no: i as u16,
            total: total as u16,
            data,
        });
    }
    Ok(out)
}

/// `seg_no_be16 || total_be16 || data || crc16_be` with the CRC over
/// header and data.
#[must_use]
pub fn serialise_segment(segment: &Segment) -> HVec<u8, MAX_SEGMENT_WIRE_BYTES> {
    let mut out = HVec::new();
    let _ = out.extend_from_slice(&segment.seg_no.to_be_bytes());
    let _ = out.extend_from_slice(&segment.total.to_be_bytes());
    let _ = out.extend_from_slice(&segment.data);
    let crc = crc16_ccitt_false(&out);
    let _ = out.extend_from_slice(&crc.to_be_bytes());
    out
}

fn parse_at(stream: &[u8], pos: usize, seg_no: u16, total: u16, dlen: usize) -> Option<Segment> {
    let end = pos + SEGMENT_HEADER_BYTES + dlen;
    if end + 2 > stream.len() {
        return None;
    }
    let stored = (u16::from(stream[end]) << 8) | u16::from(stream[end + 1]);
    if crc16_ccitt_false(&stream[pos..end]) != stored {
        return None;
    }
    let mut data = HVec::new();
    data.extend_from_slice(&stream[pos + SEGMENT_HEADER_BYTES..end])
        .ok()?;
    Some(Segment {
        seg_no,
        total,
        data,
    })
}

/// Scan a decoded byte stream for CRC-valid segments, resynchronising
/// byte-by-byte on failures. Every segment but the last carries the
/// full 796 data bytes; the last segment's length comes from
/// `payload_len` when the SDC was recovered, otherwise from a
/// shortest-first CRC scan. Shortest-first matters: past the real
/// boundary the CRC register has absorbed the stored CRC and sits at
/// zero over the zero padding, which would match every longer window.
#[must_use]
pub fn deserialise_segments(stream: &[u8], payload_len: Option<usize>) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos + SEGMENT_HEADER_BYTES + 2 <= stream.len() {
        let seg_no = u16::from_be_bytes([stream[pos], stream[pos + 1]]);
        let total = u16::from_be_bytes([stream[pos + 2], stream[pos + 3]]);
        if total == 0 || seg_no >= total {
            pos += 1;
            continue;
        }

        let remaining = stream.len() - pos - SEGMENT_HEADER_BYTES - 2;
        let parsed = if usize::from(seg_no) + 1 < usize::from(total) {
            parse_at(stream, pos, seg_no, total, MAX_SEGMENT_DATA_BYTES)
        } else if let Some(len) = payload_len {
            len.checked_sub(MAX_SEGMENT_DATA_BYTES * (usize::from(total) - 1))
                .filter(|&d| d <= MAX_SEGMENT_DATA_BYTES)
                .and_then(|d| parse_at(stream, pos, seg_no, total, d))
        } else {
            (0..=MAX_SEGMENT_DATA_BYTES.min(remaining))
                .find_map(|d| parse_at(stream, pos, seg_no, total, d))
        };

        match parsed {
            Some(segment) => {
                pos += SEGMENT_HEADER_BYTES + segment.data.len() + 2;
                out.push(segment);
            }
            None => pos += 1,
        }
    }
    out
}

/// Concatenate segments 0..expected_total in order, keeping the first
/// copy seen for each index.
pub fn reassemble_msc(segments: &[Segment], expected_total: u16) -> Result<Vec<u8>, FrameError> {
    let mut parts: Vec<Option<&Segment>> = vec![None; usize::from(expected_total)];
    for segment in segments {
        let idx = usize::from(segment.seg_no);
        if idx < parts.len() && parts[idx].is_none() {
            parts[idx] = Some(segment);
        }
    }

    let mut out = Vec::new();
    for (i, slot) in parts.iter().enumerate() {
        match slot {
            Some(segment) => out.extend_from_slice(&segment.data),
            None => return Err(FrameError::Missing(i as u16)),
        }
    }
    Ok(out)
}
