use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = hashlb::cli::Cli::parse();
    if let Err(e) = hashlb::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
