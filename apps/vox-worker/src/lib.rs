pub mod worker;

use std::sync::Arc;

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vox_providers::HttpPipeline;
use vox_service::VoxService;

#[derive(Debug, Parser)]
#[command(
	version = env!("CARGO_PKG_VERSION"),
	rename_all = "kebab",
	styles = styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = vox_config::load(&args.config)?;

	init_tracing(&config.service.log_level);

	let store = vox_service::connect_store(&config).await?;
	let pipeline = Arc::new(HttpPipeline::new(&config.providers));
	let service = VoxService::new(config, store, pipeline);
	let shutdown = CancellationToken::new();

	tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

	tracing::info!(version = env!("CARGO_PKG_VERSION"), "Worker started.");

	worker::run(worker::WorkerState::new(service), shutdown).await;

	tracing::info!("Worker stopped.");

	Ok(())
}

fn init_tracing(log_level: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for Ctrl-C.");

		return;
	}

	tracing::info!("Shutdown requested.");

	shutdown.cancel();
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}
