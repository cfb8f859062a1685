use std::fs;
use std::path::Path;

use hamdrm_modem::encode_wav;

use crate::cli::TxArgs;

pub(crate) fn run(args: &TxArgs) -> Result<(), Box<dyn std::error::Error>> {
    let payload = fs::read(&args.r#in)?;
    let wav = encode_wav(&payload, &args.mime)?;

    if let Some(parent) = Path::new(&args.out).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, &wav)?;

    let samples = (wav.len() - 44) / 2;
    let frames = samples / 4800;
    println!("tx done");
    println!("  in:          {}", args.r#in);
    println!("  out:         {}", args.out);
    println!("  bytes_in:    {}", payload.len());
    println!("  mime:        {}", args.mime);
    println!("  frames_out:  {frames}");
    println!("  superframes: {}", frames / 3);
    println!("  samples:     {samples}");
    println!("  duration_s:  {:.2}", samples as f64 / 12_000.0);

    Ok(())
}
