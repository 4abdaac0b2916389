use clap::Parser;

use vox_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	vox_worker::run(Args::parse()).await
}
