use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use hamdrm_core::{
    FrameLayout, MSC_BITS_PER_FRAME, MSC_CELLS_PER_FRAME, PUNCTURE_MSC, unpack_bits,
};
use hamdrm_fec::{
    FrequencyInterleaver, TIME_INTERLEAVER_COLS, TimeInterleaver, conv_encode, viterbi_decode,
};
use hamdrm_modem::{DEFAULT_MIME, decode_samples, encode_samples};
use hamdrm_phy::{DataCell, OfdmModulator, Qam16, demodulate_frame};
use num_complex::Complex64;

fn bench_fec(c: &mut Criterion) {
    let payload: Vec<u8> = (0..512u32).map(|i| (i * 31 & 0xFF) as u8).collect();
    let bits = unpack_bits(&payload, payload.len() * 8);
    let coded = conv_encode(&bits, &PUNCTURE_MSC);

    let mut group = c.benchmark_group("fec_conv");
    group.throughput(Throughput::Elements(bits.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| conv_encode(&bits, &PUNCTURE_MSC));
    });
    group.bench_function("viterbi", |b| {
        b.iter(|| viterbi_decode(&coded, &PUNCTURE_MSC));
    });
    group.finish();
}

fn bench_interleave(c: &mut Criterion) {
    let layout = FrameLayout::new();
    let freq = FrequencyInterleaver::new(layout.msc_group_lens());
    let time = TimeInterleaver::new(MSC_CELLS_PER_FRAME, TIME_INTERLEAVER_COLS);
    let cells: Vec<Complex64> = (0..MSC_CELLS_PER_FRAME)
        .map(|i| Complex64::new(i as f64, -(i as f64)))
        .collect();

    let mut group = c.benchmark_group("interleave");
    group.throughput(Throughput::Elements(MSC_CELLS_PER_FRAME as u64));
    group.bench_function("freq_then_time", |b| {
        b.iter(|| {
            let mixed = freq.interleave(&cells).expect("length");
            time.interleave(&mixed).expect("length")
        });
    });
    group.finish();
}

fn bench_ofdm(c: &mut Criterion) {
    let layout = FrameLayout::new();
    let modulator = OfdmModulator::new(layout.clone());
    let qam = Qam16::new();
    let bits: Vec<u8> = (0..MSC_BITS_PER_FRAME).map(|i| (i % 3 == 0) as u8).collect();
    let cells: Vec<DataCell> = layout
        .msc_slots()
        .iter()
        .zip(bits.chunks(4))
        .map(|(&(symbol, carrier), chunk)| DataCell {
            symbol: usize::from(symbol),
            carrier: usize::from(carrier),
            value: qam.map(chunk),
        })
        .collect();
    let frame = modulator.modulate_frame(&cells);

    let mut group = c.benchmark_group("ofdm");
    group.bench_function("modulate_frame", |b| {
        b.iter(|| modulator.modulate_frame(&cells));
    });
    group.bench_function("demodulate_frame", |b| {
        b.iter(|| demodulate_frame(&frame, 0).expect("frame fits"));
    });
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let payload: Vec<u8> = (0..1024u32).map(|i| (i * 17 & 0xFF) as u8).collect();
    let samples = encode_samples(&payload, DEFAULT_MIME).expect("payload fits");

    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("encode_1k", |b| {
        b.iter(|| encode_samples(&payload, DEFAULT_MIME).expect("payload fits"));
    });
    group.bench_function("decode_1k", |b| {
        b.iter(|| decode_samples(&samples, 12_000).expect("decodes"));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_fec,
    bench_interleave,
    bench_ofdm,
    bench_round_trip
);
criterion_main!(benches);
