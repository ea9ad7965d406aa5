use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout is reserved for answer text
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = shopchat::cli::run().await {
        eprintln!("{e:#}"); // pretty anyhow chain
        std::process::exit(1);
    }
}
