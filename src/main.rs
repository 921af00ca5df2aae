use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = sticker_bot::run().await {
        tracing::error!("Fatal error: {err}");
        eprintln!("Error: {}", &err);
        std::process::exit(1);
    }
}
