use clap::Parser;

mod cli;
mod commands;
mod wav_io;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse();
    match cli.command {
        cli::Commands::Tx(args) => commands::tx::run(&args),
        cli::Commands::Rx(args) => commands::rx::run(&args),
    }
}
