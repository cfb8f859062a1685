#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

//! OFDM physical layer for the hamdrm modem: FFT, QAM constellations,
//! modulation, coarse synchronisation, channel estimation and
//! equalisation.

mod fft;
mod ofdm;
mod qam;

pub use fft::fft_in_place;
pub use ofdm::{
    ChannelEstimator, DataCell, FrameGrid, OfdmModulator, PILOT_VALUE, PhyError, coarse_sync,
    demodulate_frame, equalize, estimate_snr_db,
};
pub use qam::{Qam4, Qam16};
