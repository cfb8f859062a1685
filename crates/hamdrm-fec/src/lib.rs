#![allow(clippy::cast_possible_truncation)]

use hamdrm_core::{CODE_POLYS, CODE_STATES, CODE_TAIL_BITS};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FecError {
    #[error("invalid length")]
    InvalidLength,
}

/// Marks an unreachable state in the packed traceback table.
const NO_PREDECESSOR: u8 = 0xFF;

fn parity(v: u8) -> u8 {
    (v.count_ones() & 1) as u8
}

/// Encode with the rate-1/6 mother code, emitting only the parity bits
/// the puncture pattern keeps, and flush with six zero tail bits.
///
/// Output length is `(bits.len() + 6) * popcount(puncture)`.
#[must_use]
pub fn conv_encode(bits: &[u8], puncture: &[u8; 6]) -> Vec<u8> {
    let kept = puncture.iter().filter(|&&p| p == 1).count();
    let mut out = Vec::with_capacity((bits.len() + CODE_TAIL_BITS) * kept);

    let mut state = 0u8;
    for &bit in bits.iter().chain(core::iter::repeat_n(&0u8, CODE_TAIL_BITS)) {
        let b = bit & 1;
        let full = (b << 6) | state;
        for (i, &poly) in CODE_POLYS.iter().enumerate() {
            if puncture[i] == 1 {
                out.push(parity(full & poly));
            }
        }
        state = ((state >> 1) | (b << 5)) & 0x3F;
    }
    out
}

/// Hard-decision Viterbi decoder for the punctured stream produced by
/// [`conv_encode`]. Punctured positions never reach the receiver, so
/// each information step consumes exactly `popcount(puncture)` bits.
/// The six tail bits are dropped from the result.
#[must_use]
pub fn viterbi_decode(received: &[u8], puncture: &[u8; 6]) -> Vec<u8> {
    let kept_positions: Vec<usize> = (0..6).filter(|&i| puncture[i] == 1).collect();
    let bits_per_step = kept_positions.len();
    if bits_per_step == 0 {
        return Vec::new();
    }
    let steps = received.len() / bits_per_step;
    if steps <= CODE_TAIL_BITS {
        return Vec::new();
    }

    // Expected kept parity bits for every (input, state) pair, packed
    // little-endian by kept index so one XOR + popcount scores a branch.
    let mut branch = [0u8; 2 * CODE_STATES];
    for (full, slot) in branch.iter_mut().enumerate() {
        let mut word = 0u8;
        for (j, &i) in kept_positions.iter().enumerate() {
            word |= parity(full as u8 & CODE_POLYS[i]) << j;
        }
        *slot = word;
    }

    const INF: u32 = u32::MAX / 2;
    let mut metrics = [INF; CODE_STATES];
    metrics[0] = 0;
    let mut traceback = vec![NO_PREDECESSOR; steps * CODE_STATES];

    for step in 0..steps {
        let rx = &received[step * bits_per_step..(step + 1) * bits_per_step];
        let rx_word = rx
            .iter()
            .enumerate()
            .fold(0u8, |acc, (j, &b)| acc | ((b & 1) << j));

        let mut next = [INF; CODE_STATES];
        let entries = &mut traceback[step * CODE_STATES..(step + 1) * CODE_STATES];
        for (s, &metric) in metrics.iter().enumerate() {
            if metric >= INF {
                continue;
            }
            for b in 0..2usize {
                let full = (b << 6) | s;
                let dist = (branch[full] ^ rx_word).count_ones();
                let ns = ((s >> 1) | (b << 5)) & 0x3F;
                let cand = metric + dist;
                if cand < next[ns] {
                    next[ns] = cand;
                    entries[ns] = s as u8;
                }
            }
        }
        metrics = next;
    }

    let mut best = 0usize;
    for (s, &metric) in metrics.iter().enumerate() {
        if metric < metrics[best] {
            best = s;
        }
    }

    let mut decoded = vec![0u8; steps];
    let mut cur = best;
    for step in (0..steps).rev() {
        let prev = traceback[step * CODE_STATES + cur];
        if prev == NO_PREDECESSOR {
            decoded[step] = 0;
            cur = 0;
        } else {
            decoded[step] = ((cur >> 5) & 1) as u8;
            cur = usize::from(prev);
        }
    }
    decoded.truncate(steps - CODE_TAIL_BITS);
    decoded
}

/// Bit-reversal permutation of `[0, n)` over `ceil(log2(max(n, 2)))`
/// bits: reversed values >= n and duplicates are skipped, which keeps
/// the result a total bijection for non-power-of-two sizes.
#[must_use]
pub fn bit_reversal_permutation(n: usize) -> Vec<usize> {
    let m = n.max(2);
    let bits = usize::BITS - (m - 1).leading_zeros();
    let mut perm = Vec::with_capacity(n);
    let mut seen = vec![false; n];
    let mut i = 0usize;
    while perm.len() < n {
        let mut r = 0usize;
        for j in 0..bits {
            r = (r << 1) | ((i >> j) & 1);
        }
        if r < n && !seen[r] {
            seen[r] = true;
            perm.push(r);
        }
        i += 1;
    }
    perm
}

#[derive(Debug, Clone)]
struct Group {
    offset: usize,
    perm: Vec<usize>,
    inv: Vec<usize>,
}

/// Per-symbol carrier permutation over the contiguous MSC groups of a
/// frame. Permutations and their inverses are computed once.
#[derive(Debug, Clone)]
pub struct FrequencyInterleaver {
    groups: Vec<Group>,
    total: usize,
}

impl FrequencyInterleaver {
    #[must_use]
    pub fn new(group_lens: &[usize]) -> Self {
        let mut groups = Vec::with_capacity(group_lens.len());
        let mut offset = 0usize;
        for &len in group_lens {
            let perm = bit_reversal_permutation(len);
            let mut inv = vec![0usize; len];
            for (i, &p) in perm.iter().enumerate() {
                inv[p] = i;
            }
            groups.push(Group { offset, perm, inv });
            offset += len;
        }
        Self {
            groups,
            total: offset,
        }
    }

    pub fn interleave<T: Copy>(&self, cells: &[T]) -> Result<Vec<T>, FecError> {
        self.permute(cells, false)
    }

    pub fn deinterleave<T: Copy>(&self, cells: &[T]) -> Result<Vec<T>, FecError> {
        self.permute(cells, true)
    }

    fn permute<T: Copy>(&self, cells: &[T], inverse: bool) -> Result<Vec<T>, FecError> {
        if cells.len() != self.total {
            return Err(FecError::InvalidLength);
        }
        let mut out = cells.to_vec();
        for group in &self.groups {
            let table = if inverse { &group.inv } else { &group.perm };
            for (i, &p) in table.iter().enumerate() {
                out[group.offset + p] = cells[group.offset + i];
            }
        }
        Ok(out)
    }
}

pub const TIME_INTERLEAVER_COLS: usize = 30;

/// Row-column transpose over the flat per-frame MSC cell array: write
/// row-by-row, read column-by-column, skipping the padding positions
/// of the final partial row.
#[derive(Debug, Clone)]
pub struct TimeInterleaver {
    forward: Vec<usize>,
}

impl TimeInterleaver {
    #[must_use]
    pub fn new(len: usize, cols: usize) -> Self {
        let rows = len.div_ceil(cols);
        let mut forward = Vec::with_capacity(len);
        for c in 0..cols {
            for r in 0..rows {
                let src = r * cols + c;
                if src < len {
                    forward.push(src);
                }
            }
        }
        Self { forward }
    }

    pub fn interleave<T: Copy>(&self, cells: &[T]) -> Result<Vec<T>, FecError> {
        if cells.len() != self.forward.len() {
            return Err(FecError::InvalidLength);
        }
        Ok(self.forward.iter().map(|&src| cells[src]).collect())
    }

    pub fn deinterleave<T: Copy>(&self, cells: &[T]) -> Result<Vec<T>, FecError> {
        if cells.len() != self.forward.len() {
            return Err(FecError::InvalidLength);
        }
        let mut out = cells.to_vec();
        for (k, &src) in self.forward.iter().enumerate() {
            out[src] = cells[k];
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use hamdrm_core::{
        FrameLayout, MSC_CELLS_PER_FRAME, PUNCTURE_FAC, PUNCTURE_MSC, PUNCTURE_SDC,
    };

    use super::*;

    #[test]
    fn encode_all_zero_block() {
        let bits = vec![0u8; 32];
        let coded = conv_encode(&bits, &PUNCTURE_MSC);
        assert_eq!(coded.len(), (32 + 6) * 3);
        assert!(coded.iter().all(|&b| b == 0));
        assert_eq!(viterbi_decode(&coded, &PUNCTURE_MSC), bits);
    }

    #[test]
    fn encode_lengths_match_puncture_weight() {
        let bits = vec![1u8; 10];
        assert_eq!(conv_encode(&bits, &PUNCTURE_MSC).len(), 16 * 3);
        assert_eq!(conv_encode(&bits, &PUNCTURE_FAC).len(), 16 * 4);
        assert_eq!(conv_encode(&bits, &PUNCTURE_SDC).len(), 16 * 2);
    }

    #[test]
    fn round_trip_all_punctures() {
        let bits: Vec<u8> = (0..240)
            .map(|i| u8::from((i % 3) == 0 || (i % 7) == 2))
            .collect();
        for puncture in [PUNCTURE_MSC, PUNCTURE_FAC, PUNCTURE_SDC] {
            let coded = conv_encode(&bits, &puncture);
            assert_eq!(viterbi_decode(&coded, &puncture), bits, "{puncture:?}");
        }
    }

    #[test]
    fn corrects_isolated_bit_errors() {
        let bits: Vec<u8> = (0..120).map(|i| u8::from((i % 5) < 2)).collect();
        let mut coded = conv_encode(&bits, &PUNCTURE_MSC);
        coded[20] ^= 1;
        coded[200] ^= 1;
        assert_eq!(viterbi_decode(&coded, &PUNCTURE_MSC), bits);
    }

    #[test]
    fn short_input_decodes_empty() {
        assert!(viterbi_decode(&[1, 0, 1], &PUNCTURE_MSC).is_empty());
    }

    #[test]
    fn bit_reversal_is_a_bijection() {
        for n in [2usize, 16, 24] {
            let perm = bit_reversal_permutation(n);
            let mut seen = vec![false; n];
            for &p in &perm {
                assert!(!seen[p]);
                seen[p] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn bit_reversal_16_starts_with_reversed_nibbles() {
        assert_eq!(&bit_reversal_permutation(16)[..4], &[0, 8, 4, 12]);
    }

    #[test]
    fn frequency_interleave_round_trip() {
        let layout = FrameLayout::new();
        let fi = FrequencyInterleaver::new(layout.msc_group_lens());
        let cells: Vec<u32> = (1..=MSC_CELLS_PER_FRAME as u32).collect();
        let mixed = fi.interleave(&cells).expect("lengths match");
        assert_ne!(mixed, cells);
        assert!(mixed.iter().all(|&c| c != 0), "bijection dropped a cell");
        assert_eq!(fi.deinterleave(&mixed).expect("lengths match"), cells);
    }

    #[test]
    fn time_interleave_round_trip() {
        let ti = TimeInterleaver::new(MSC_CELLS_PER_FRAME, TIME_INTERLEAVER_COLS);
        let cells: Vec<u32> = (1..=MSC_CELLS_PER_FRAME as u32).collect();
        let mixed = ti.interleave(&cells).expect("lengths match");
        // Column-major read: second output cell is the start of row 1.
        assert_eq!(mixed[1], cells[TIME_INTERLEAVER_COLS]);
        assert_eq!(ti.deinterleave(&mixed).expect("lengths match"), cells);
    }

    #[test]
    fn combined_interleaver_identity() {
        let layout = FrameLayout::new();
        let fi = FrequencyInterleaver::new(layout.msc_group_lens());
        let ti = TimeInterleaver::new(MSC_CELLS_PER_FRAME, TIME_INTERLEAVER_COLS);
        let cells: Vec<u32> = (0..MSC_CELLS_PER_FRAME as u32).map(|i| i * 31 + 7).collect();

        let forward = ti
            .interleave(&fi.interleave(&cells).expect("freq"))
            .expect("time");
        let back = fi
            .deinterleave(&ti.deinterleave(&forward).expect("time"))
            .expect("freq");
        assert_eq!(back, cells);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let fi = FrequencyInterleaver::new(&[16, 24]);
        assert_eq!(fi.interleave(&[0u8; 39]), Err(FecError::InvalidLength));
    }
}
