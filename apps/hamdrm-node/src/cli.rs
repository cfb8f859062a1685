use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "hamdrm-node",
    about = "HAMDRM digital-SSTV reference node",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Encode a payload file into a 12 kHz WAV transmission.
    Tx(TxArgs),
    /// Decode a received WAV back into the payload file.
    Rx(RxArgs),
}

#[derive(Debug, Args)]
pub(crate) struct TxArgs {
    #[arg(long)]
    pub(crate) r#in: String,
    #[arg(long)]
    pub(crate) out: String,
    #[arg(long, default_value = "image/jpeg")]
    pub(crate) mime: String,
}

#[derive(Debug, Args)]
pub(crate) struct RxArgs {
    #[arg(long)]
    pub(crate) r#in: String,
    #[arg(long)]
    pub(crate) out: String,
    /// Print the diagnostics record as JSON instead of the key list.
    #[arg(long, default_value_t = false)]
    pub(crate) json: bool,
}
