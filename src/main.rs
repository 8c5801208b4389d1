use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tx_lint::cli::{self, Args};

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (只写 stderr，stdout 留给报告)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let code = cli::handle_command(args.command)?;
    std::process::exit(code);
}
