#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

pub const INTERNAL_SAMPLE_RATE_HZ: u32 = 12_000;

/// Useful symbol length N_u in samples (the FFT size).
pub const FFT_SIZE: usize = 256;
/// Guard interval N_g in samples (N_u / 4).
pub const GUARD_SAMPLES: usize = 64;
/// Full OFDM symbol N_s = N_u + N_g.
pub const SYMBOL_SAMPLES: usize = FFT_SIZE + GUARD_SAMPLES;
pub const SYMBOLS_PER_FRAME: usize = 15;
pub const FRAME_SAMPLES: usize = SYMBOL_SAMPLES * SYMBOLS_PER_FRAME;
pub const FRAMES_PER_SUPERFRAME: usize = 3;

/// FFT bin of the centre subcarrier k = 0 (1500 Hz at 12 kHz).
pub const CENTER_BIN: usize = 32;
pub const K_MIN: i32 = -10;
pub const K_MAX: i32 = 18;
pub const CARRIERS_PER_SYMBOL: usize = (K_MAX - K_MIN + 1) as usize;

pub const MSC_CELLS_PER_FRAME: usize = 352;
pub const FAC_CELLS_PER_FRAME: usize = 2;
pub const SDC_CELLS_PER_FRAME: usize = 6;
pub const PILOT_CELLS_PER_FRAME: usize = 75;

/// MSC bits carried by one frame (16-QAM, 4 bits per cell).
pub const MSC_BITS_PER_FRAME: usize = MSC_CELLS_PER_FRAME * 4;
pub const MSC_BITS_PER_SUPERFRAME: usize = MSC_BITS_PER_FRAME * FRAMES_PER_SUPERFRAME;
pub const FAC_BITS_PER_FRAME: usize = FAC_CELLS_PER_FRAME * 2;
pub const SDC_BITS_PER_FRAME: usize = SDC_CELLS_PER_FRAME * 2;

/// Carriers that carry a time pilot in every symbol.
pub const TIME_PILOT_CARRIERS: [i32; 5] = [-9, -3, 4, 8, 12];
/// Fixed (symbol, carrier) frequency references. They all sit on
/// time-pilot carriers and carry the same reference value.
pub const FREQ_PILOT_SLOTS: [(usize, i32); 7] = [
    (0, -9),
    (0, 8),
    (5, -3),
    (5, 12),
    (10, 4),
    (14, -9),
    (14, 8),
];
pub const FAC_SLOTS: [(usize, i32); 2] = [(0, -7), (0, 6)];
pub const SDC_SLOTS: [(usize, i32); 6] = [(0, -6), (0, -5), (0, -4), (0, 7), (0, 9), (0, 10)];

/// Rate-1/6 mother code, constraint length 7.
pub const CODE_POLYS: [u8; 6] = [0o133, 0o171, 0o145, 0o165, 0o117, 0o135];
pub const CODE_STATES: usize = 64;
pub const CODE_TAIL_BITS: usize = 6;
pub const PUNCTURE_MSC: [u8; 6] = [1, 1, 0, 1, 0, 0];
pub const PUNCTURE_FAC: [u8; 6] = [1, 1, 0, 1, 1, 0];
pub const PUNCTURE_SDC: [u8; 6] = [1, 1, 0, 0, 0, 0];

pub const FAC_BITS: usize = 72;
pub const FAC_DATA_BITS: usize = 64;

pub const SEGMENT_HEADER_BYTES: usize = 4;
pub const MAX_SEGMENT_DATA_BYTES: usize = 796;
pub const MAX_SEGMENT_WIRE_BYTES: usize = SEGMENT_HEADER_BYTES + MAX_SEGMENT_DATA_BYTES + 2;

/// The SDC length field is 24 bits wide.
pub const MAX_PAYLOAD_BYTES: usize = (1 << 24) - 1;
pub const MAX_MIME_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobustnessMode {
    A,
    B,
    C,
    D,
}

impl RobustnessMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    #[must_use]
    pub fn from_field(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => Self::D,
        }
    }

    #[must_use]
    pub fn to_field(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectrumOccupancy {
    So0,
    So1,
    So2,
    So3,
    So4,
    So5,
}

impl SpectrumOccupancy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::So0 => "SO0",
            Self::So1 => "SO1",
            Self::So2 => "SO2",
            Self::So3 => "SO3",
            Self::So4 => "SO4",
            Self::So5 => "SO5",
        }
    }

    #[must_use]
    pub fn from_field(v: u8) -> Self {
        match v & 0b111 {
            0 => Self::So0,
            1 => Self::So1,
            2 => Self::So2,
            3 => Self::So3,
            4 => Self::So4,
            _ => Self::So5,
        }
    }

    #[must_use]
    pub fn to_field(self) -> u8 {
        match self {
            Self::So0 => 0,
            Self::So1 => 1,
            Self::So2 => 2,
            Self::So3 => 3,
            Self::So4 => 4,
            Self::So5 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QamOrder {
    Qam4,
    Qam16,
}

impl QamOrder {
    #[must_use]
    pub fn bits_per_cell(self) -> usize {
        match self {
            Self::Qam4 => 2,
            Self::Qam16 => 4,
        }
    }
}

/// Parameters carried by the fast access channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacParams {
    pub mode: RobustnessMode,
    pub occupancy: SpectrumOccupancy,
    /// false = short (one-frame) interleaver depth.
    pub long_interleave: bool,
    pub msc_qam: QamOrder,
    pub sdc_qam: QamOrder,
    pub num_services: u8,
    pub data_service: bool,
    pub service_id: u8,
}

impl Default for FacParams {
    fn default() -> Self {
        Self {
            mode: RobustnessMode::B,
            occupancy: SpectrumOccupancy::So0,
            long_interleave: false,
            msc_qam: QamOrder::Qam16,
            sdc_qam: QamOrder::Qam4,
            num_services: 1,
            data_service: true,
            service_id: 1,
        }
    }
}

impl FacParams {
    /// Nominal code-rate label for the single protection level in use.
    #[must_use]
    pub fn fec_rate_label(&self) -> &'static str {
        "1/2"
    }
}

/// Classification of one (symbol, carrier) slot within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Pilot,
    Fac,
    Sdc,
    Msc,
}

/// 0-based carrier index of subcarrier `k`.
#[must_use]
pub fn carrier_index(k: i32) -> usize {
    (k - K_MIN) as usize
}

/// Subcarrier offset of carrier index `idx`.
#[must_use]
pub fn carrier_offset(idx: usize) -> i32 {
    K_MIN + idx as i32
}

/// FFT bin of subcarrier `k`.
#[must_use]
pub fn carrier_bin(k: i32) -> usize {
    (CENTER_BIN as i32 + k).rem_euclid(FFT_SIZE as i32) as usize
}

/// Per-frame slot map. Computed once and treated as a constant of the
/// system; the canonical MSC order is symbol-major, carrier-ascending.
#[derive(Debug, Clone)]
pub struct FrameLayout {
    kinds: [[CellKind; CARRIERS_PER_SYMBOL]; SYMBOLS_PER_FRAME],
    msc_slots: heapless::Vec<(u8, u8), MSC_CELLS_PER_FRAME>,
    fac_slots: [(u8, u8); FAC_CELLS_PER_FRAME],
    sdc_slots: [(u8, u8); SDC_CELLS_PER_FRAME],
    msc_group_lens: [usize; SYMBOLS_PER_FRAME],
}

impl FrameLayout {
    #[must_use]
    pub fn new() -> Self {
        let mut kinds = [[CellKind::Msc; CARRIERS_PER_SYMBOL]; SYMBOLS_PER_FRAME];

        for row in kinds.iter_mut() {
            for &k in &TIME_PILOT_CARRIERS {
                row[carrier_index(k)] = CellKind::Pilot;
            }
        }
        for &(sym, k) in &FREQ_PILOT_SLOTS {
            kinds[sym][carrier_index(k)] = CellKind::Pilot;
        }
        for &(sym, k) in &FAC_SLOTS {
            kinds[sym][carrier_index(k)] = CellKind::Fac;
        }
        for &(sym, k) in &SDC_SLOTS {
            kinds[sym][carrier_index(k)] = CellKind::Sdc;
        }

        let mut msc_slots = heapless::Vec::new();
        let mut msc_group_lens = [0usize; SYMBOLS_PER_FRAME];
        for (sym, row) in kinds.iter().enumerate() {
            for (idx, &kind) in row.iter().enumerate() {
                if kind == CellKind::Msc {
                    let _ = msc_slots.push((sym as u8, idx as u8));
                    msc_group_lens[sym] += 1;
                }
            }
        }

        let fac_slots = FAC_SLOTS.map(|(sym, k)| (sym as u8, carrier_index(k) as u8));
        let sdc_slots = SDC_SLOTS.map(|(sym, k)| (sym as u8, carrier_index(k) as u8));

        Self {
            kinds,
            msc_slots,
            fac_slots,
            sdc_slots,
            msc_group_lens,
        }
    }

    #[must_use]
    pub fn kind(&self, symbol: usize, carrier_idx: usize) -> CellKind {
        self.kinds[symbol][carrier_idx]
    }

    #[must_use]
    pub fn is_pilot(&self, symbol: usize, carrier_idx: usize) -> bool {
        self.kinds[symbol][carrier_idx] == CellKind::Pilot
    }

    /// MSC slots in canonical order.
    #[must_use]
    pub fn msc_slots(&self) -> &[(u8, u8)] {
        &self.msc_slots
    }

    #[must_use]
    pub fn fac_slots(&self) -> &[(u8, u8); FAC_CELLS_PER_FRAME] {
        &self.fac_slots
    }

    #[must_use]
    pub fn sdc_slots(&self) -> &[(u8, u8); SDC_CELLS_PER_FRAME] {
        &self.sdc_slots
    }

    /// Number of MSC slots in each symbol (16 in symbol 0, 24 elsewhere).
    #[must_use]
    pub fn msc_group_lens(&self) -> &[usize; SYMBOLS_PER_FRAME] {
        &self.msc_group_lens
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Pack bit values (one per element, LSB significant) into bytes,
/// MSB first.
#[must_use]
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit & 1 == 1 {
            out[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    out
}

/// Unpack `bit_len` bits from bytes, MSB first.
#[must_use]
pub fn unpack_bits(bytes: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; bit_len];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = (bytes[i / 8] >> (7 - (i % 8))) & 1;
    }
    out
}

#[must_use]
pub fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if (crc & 0x8000) != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// CRC-8 used by the FAC word: poly 0xD5, init 0xFF, final XOR 0xFF.
#[must_use]
pub fn crc8_fac(bytes: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if (crc & 0x80) != 0 {
                (crc << 1) ^ 0xD5
            } else {
                crc << 1
            };
        }
    }
    crc ^ 0xFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_vector() {
        assert_eq!(crc16_ccitt_false(b"123456789"), 0x29B1);
    }

    #[test]
    fn crc8_empty_is_zero() {
        assert_eq!(crc8_fac(&[]), 0x00);
    }

    #[test]
    fn crc8_single_bit_sensitivity() {
        let base = [0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let reference = crc8_fac(&base);
        for byte in 0..base.len() {
            for bit in 0..8 {
                let mut flipped = base;
                flipped[byte] ^= 1 << bit;
                assert_ne!(crc8_fac(&flipped), reference, "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn bits_round_trip_msb_first() {
        let bytes = [0xA5u8, 0x3C, 0x01];
        let bits = unpack_bits(&bytes, 24);
        assert_eq!(&bits[..8], &[1, 0, 1, 0, 0, 1, 0, 1]);
        assert_eq!(pack_bits(&bits), bytes);
    }

    #[test]
    fn partial_byte_packs_high_bits() {
        let bits = [1u8, 1, 0, 1];
        assert_eq!(pack_bits(&bits), [0b1101_0000]);
    }

    #[test]
    fn layout_slot_counts() {
        let layout = FrameLayout::new();
        let mut pilots = 0usize;
        let mut fac = 0usize;
        let mut sdc = 0usize;
        let mut msc = 0usize;
        for sym in 0..SYMBOLS_PER_FRAME {
            for idx in 0..CARRIERS_PER_SYMBOL {
                match layout.kind(sym, idx) {
                    CellKind::Pilot => pilots += 1,
                    CellKind::Fac => fac += 1,
                    CellKind::Sdc => sdc += 1,
                    CellKind::Msc => msc += 1,
                }
            }
        }
        assert_eq!(pilots, PILOT_CELLS_PER_FRAME);
        assert_eq!(fac, FAC_CELLS_PER_FRAME);
        assert_eq!(sdc, SDC_CELLS_PER_FRAME);
        assert_eq!(msc, MSC_CELLS_PER_FRAME);
        assert_eq!(pilots + fac + sdc + msc, SYMBOLS_PER_FRAME * CARRIERS_PER_SYMBOL);
    }

    #[test]
    fn layout_msc_groups() {
        let layout = FrameLayout::new();
        let lens = layout.msc_group_lens();
        assert_eq!(lens[0], 16);
        for sym in 1..SYMBOLS_PER_FRAME {
            assert_eq!(lens[sym], 24, "symbol {sym}");
        }
        assert_eq!(lens.iter().sum::<usize>(), MSC_CELLS_PER_FRAME);
        assert_eq!(layout.msc_slots().len(), MSC_CELLS_PER_FRAME);
    }

    #[test]
    fn layout_msc_order_is_symbol_major() {
        let layout = FrameLayout::new();
        let slots = layout.msc_slots();
        for pair in slots.windows(2) {
            assert!(pair[0].0 < pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1));
        }
    }

    #[test]
    fn fac_and_sdc_positions() {
        let layout = FrameLayout::new();
        assert_eq!(layout.fac_slots(), &[(0, 3), (0, 16)]);
        assert_eq!(
            layout.sdc_slots(),
            &[(0, 4), (0, 5), (0, 6), (0, 17), (0, 19), (0, 20)]
        );
    }

    #[test]
    fn carrier_bin_wraps_negative_offsets() {
        assert_eq!(carrier_bin(0), CENTER_BIN);
        assert_eq!(carrier_bin(K_MIN), CENTER_BIN - 10);
        assert_eq!(carrier_bin(K_MAX), CENTER_BIN + 18);
        assert_eq!(carrier_bin(-40), FFT_SIZE - 8);
    }

    #[test]
    fn fac_defaults_describe_the_fixed_profile() {
        let fac = FacParams::default();
        assert_eq!(fac.mode, RobustnessMode::B);
        assert_eq!(fac.occupancy, SpectrumOccupancy::So0);
        assert!(!fac.long_interleave);
        assert_eq!(fac.msc_qam, QamOrder::Qam16);
        assert_eq!(fac.sdc_qam, QamOrder::Qam4);
        assert_eq!(fac.fec_rate_label(), "1/2");
    }
}
