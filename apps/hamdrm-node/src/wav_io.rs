pub(crate) fn read_wav_mono(path: &str) -> Result<(Vec<f64>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err("only mono WAV input is supported".into());
    }

    let samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample <= 16 {
                reader
                    .samples::<i16>()
                    .map(|s| f64::from(s.unwrap_or(0)) / 32768.0)
                    .collect()
            } else {
                let scale = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f64;
                reader
                    .samples::<i32>()
                    .map(|s| f64::from(s.unwrap_or(0)) / scale)
                    .collect()
            }
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| f64::from(s.unwrap_or(0.0)))
            .collect(),
    };
    Ok((samples, spec.sample_rate))
}
