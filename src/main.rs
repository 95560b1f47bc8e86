// src/main.rs

use bundlewatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("bundlewatch error: {err:?}");
        std::process::exit(1);
    }
    // The stdin reader may still sit in a blocking read; don't wait for it.
    std::process::exit(0);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
