use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vistream::cli::Cli;
use vistream::config::AnnotateConfig;
use vistream::consumer::LogConsumer;
use vistream::streaming::StreamingSession;
use vistream::transport::Channel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = cli.session_options();

    let config = AnnotateConfig::load(&cli.config).await?;
    let input = cli.input();
    let mut source = input
        .open()
        .await
        .with_context(|| format!("Failed to open input {}", input.path().display()))?;

    let channel = Channel::connect(&cli.endpoint, options.deadline).await?;
    let (reader, writer) = channel.split();

    let session = StreamingSession::start(config.to_request(), reader, writer, options).await?;
    match session.run(source.as_mut(), Box::new(LogConsumer)).await {
        Ok(report) => {
            tracing::info!(
                chunks = report.chunks_sent,
                bytes = report.bytes_sent,
                results = report.results_received,
                "done"
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!("session failed: {err}");
            std::process::exit(1);
        }
    }
}
