// crates.io
use clap::Parser;
use jwks_mesh::cli::{self, Cli};

#[tokio::main]
async fn main() -> jwks_mesh::Result<()> {
	cli::run(Cli::parse()).await
}
