mod cli;
mod headers_cmd;
mod parse_cmd;
mod score_cmd;
mod shared;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        cli::Commands::Parse {
            ref file,
            ref output_dir,
            ref source_key,
            ref job_id,
            ref user_id,
            ref country,
            pages,
            ref config,
        } => parse_cmd::run(
            file,
            output_dir,
            source_key.as_deref(),
            job_id.as_deref(),
            user_id.as_deref(),
            country.as_deref(),
            pages,
            config.as_deref(),
        ),
        cli::Commands::Headers {
            ref file,
            ref format,
            pages,
        } => headers_cmd::run(file, format, pages),
        cli::Commands::Score { ref file } => score_cmd::run(file),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
