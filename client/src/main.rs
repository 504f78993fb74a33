/// Ripedly Client
///
/// Submits one clip job to the Ripedly API and saves the returned mp4.
///
/// Usage: ripedly-client <youtube-url> <start> <end>
mod config;
mod delivery;
mod error;
mod progress;
mod submitter;

use std::sync::Arc;

use config::ClientConfig;
use progress::TerminalProgress;
use submitter::Submitter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing; stdout is reserved for the saved path
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripedly_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [url, start, end] = args.as_slice() else {
        eprintln!("Usage: ripedly-client <youtube-url> <start mm:ss|hh:mm:ss> <end mm:ss|hh:mm:ss>");
        std::process::exit(2);
    };

    let config = ClientConfig::from_env();
    tracing::debug!("API: {}, output: {}", config.api_url, config.output_dir.display());

    let submitter = Submitter::new(&config, Arc::new(TerminalProgress))?;

    match submitter.submit(url, start, end).await {
        Ok(artifact) => {
            println!("{}", artifact.path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
