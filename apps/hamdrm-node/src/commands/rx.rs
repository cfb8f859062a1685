use std::fs;
use std::path::Path;

use hamdrm_modem::decode_samples;

use crate::cli::RxArgs;
use crate::wav_io::read_wav_mono;

pub(crate) fn run(args: &RxArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = read_wav_mono(&args.r#in)?;
    let out = decode_samples(&samples, sample_rate)?;
    let diag = &out.diagnostics;

    if args.json {
        println!("{}", serde_json::to_string_pretty(diag)?);
    } else {
        println!("rx done");
        println!("  in:               {}", args.r#in);
        println!("  sample_rate_in:   {}", diag.sample_rate_in);
        println!("  file_duration_s:  {:.2}", diag.file_duration_s);
        println!("  mode:             {}", diag.mode.label());
        println!("  spectrum:         {}", diag.spectrum_occupancy.label());
        println!("  fec_rate:         {}", diag.fec_rate);
        println!("  snr_db:           {:.1}", diag.snr_db);
        println!("  frames_decoded:   {}", diag.frames_decoded);
        println!("  segment_errors:   {}", diag.segment_errors);
        println!("  decode_ms:        {:.1}", diag.decode_duration_ms);
        if let Some(sdc) = &out.sdc {
            println!("  sdc_mime:         {}", sdc.mime);
            println!("  sdc_length:       {}", sdc.payload_len);
        }
    }

    let Some(payload) = out.payload else {
        return Err("payload not recovered (missing or corrupt segments)".into());
    };

    if let Some(parent) = Path::new(&args.out).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, &payload)?;
    println!("  out:              {}", args.out);
    println!("  bytes_out:        {}", payload.len());

    Ok(())
}
