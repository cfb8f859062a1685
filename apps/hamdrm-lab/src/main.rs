use std::env;

use hamdrm_modem::{DEFAULT_MIME, decode_samples, encode_samples};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
struct Config {
    trials: usize,
    payload_bytes: usize,
    noise_start: f64,
    noise_end: f64,
    noise_step: f64,
    gain: f64,
    dc_offset: f64,
    clip: f64,
    seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trials: 20,
            payload_bytes: 600,
            noise_start: 0.0,
            noise_end: 0.1,
            noise_step: 0.01,
            gain: 1.0,
            dc_offset: 0.0,
            clip: 1.0,
            seed: 0x44D3_2026,
        }
    }
}

#[derive(Default)]
struct Stats {
    total_bits: usize,
    bit_errors: usize,
    frames: usize,
    frame_errors: usize,
    recovered: usize,
    snr_acc: f64,
}

fn main() {
    let cfg = parse_args(env::args().skip(1).collect());
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    println!("hamdrm-lab stress sweep");
    println!(
        "  cfg: trials={} payload_bytes={} noise=[{:.3}..{:.3}] step={:.3}",
        cfg.trials, cfg.payload_bytes, cfg.noise_start, cfg.noise_end, cfg.noise_step
    );
    println!(
        "  channel: gain={:.2} dc_offset={:.3} clip={:.2}",
        cfg.gain, cfg.dc_offset, cfg.clip
    );
    println!("  columns: noise_std, ber, fer, recover_rate, avg_snr_db");

    for noise in noise_points(&cfg) {
        let mut stats = Stats::default();
        for _ in 0..cfg.trials {
            run_trial(&cfg, noise, &mut rng, &mut stats);
        }

        let ber = ratio(stats.bit_errors, stats.total_bits);
        let fer = ratio(stats.frame_errors, stats.frames);
        let rec = ratio(stats.recovered, stats.frames);
        let snr = if stats.frames > 0 {
            stats.snr_acc / stats.frames as f64
        } else {
            0.0
        };

        println!("  {noise:8.3}, {ber:0.6}, {fer:0.6}, {rec:0.6}, {snr:0.2}");
    }
}

fn run_trial(cfg: &Config, noise_std: f64, rng: &mut StdRng, stats: &mut Stats) {
    let payload: Vec<u8> = (0..cfg.payload_bytes).map(|_| rng.random()).collect();

    let mut samples = encode_samples(&payload, DEFAULT_MIME).expect("encode must succeed");
    apply_channel(&mut samples, cfg, noise_std, rng);

    stats.frames += 1;
    stats.total_bits += payload.len() * 8;

    match decode_samples(&samples, 12_000) {
        Ok(out) => {
            stats.snr_acc += out.diagnostics.snr_db;
            match out.payload {
                Some(decoded) if decoded.len() == payload.len() => {
                    let errors: usize = decoded
                        .iter()
                        .zip(payload.iter())
                        .map(|(a, b)| (a ^ b).count_ones() as usize)
                        .sum();
                    stats.bit_errors += errors;
                    if errors == 0 {
                        stats.recovered += 1;
                    } else {
                        stats.frame_errors += 1;
                    }
                }
                _ => {
                    stats.bit_errors += payload.len() * 8;
                    stats.frame_errors += 1;
                }
            }
        }
        Err(_) => {
            stats.bit_errors += payload.len() * 8;
            stats.frame_errors += 1;
        }
    }
}

fn apply_channel(samples: &mut [f64], cfg: &Config, noise_std: f64, rng: &mut StdRng) {
    for sample in samples {
        let mut x = *sample + box_muller(rng) * noise_std;
        x = x * cfg.gain + cfg.dc_offset;
        *sample = x.clamp(-cfg.clip, cfg.clip);
    }
}

fn box_muller(rng: &mut StdRng) -> f64 {
    let u1 = rng.random::<f64>().max(1e-12);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn parse_args(args: Vec<String>) -> Config {
    let mut cfg = Config::default();

    for arg in args {
        if arg == "--help" || arg == "-h" {
            print_help_and_exit();
        }
        let Some((k, v)) = arg.split_once('=') else {
            continue;
        };

        match k {
            "--trials" => cfg.trials = parse_or(v, cfg.trials),
            "--payload-bytes" => cfg.payload_bytes = parse_or(v, cfg.payload_bytes),
            "--noise" => {
                let n = parse_or(v, cfg.noise_start);
                cfg.noise_start = n;
                cfg.noise_end = n;
                cfg.noise_step = 1.0;
            }
            "--noise-start" => cfg.noise_start = parse_or(v, cfg.noise_start),
            "--noise-end" => cfg.noise_end = parse_or(v, cfg.noise_end),
            "--noise-step" => cfg.noise_step = parse_or(v, cfg.noise_step),
            "--gain" => cfg.gain = parse_or(v, cfg.gain),
            "--dc-offset" => cfg.dc_offset = parse_or(v, cfg.dc_offset),
            "--clip" => cfg.clip = parse_or(v, cfg.clip),
            "--seed" => cfg.seed = parse_or(v, cfg.seed),
            _ => {}
        }
    }

    cfg.payload_bytes = cfg.payload_bytes.clamp(1, 20_000);
    cfg.noise_step = cfg.noise_step.max(1e-4);
    cfg.clip = cfg.clip.max(0.1);

    cfg
}

fn print_help_and_exit() -> ! {
    println!("hamdrm-lab options (key=value):");
    println!("  --trials=20");
    println!("  --payload-bytes=600          (1..20000)");
    println!("  --noise=0.05                 (single point)");
    println!("  --noise-start=0.0 --noise-end=0.1 --noise-step=0.01");
    println!("  --gain=1.0 --dc-offset=0 --clip=1.0");
    println!("  --seed=1154875430");
    std::process::exit(0);
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    s.parse().ok().unwrap_or(default)
}

fn noise_points(cfg: &Config) -> Vec<f64> {
    if cfg.noise_start >= cfg.noise_end {
        return vec![cfg.noise_start];
    }

    let mut out = Vec::new();
    let mut n = cfg.noise_start;
    while n <= cfg.noise_end + 1e-9 {
        out.push(n);
        n += cfg.noise_step;
    }
    out
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
