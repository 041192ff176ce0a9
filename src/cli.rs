//! Command-line entry points for the `jwks-mesh` binary.

// std
use std::{future::Future, net::SocketAddr};
// crates.io
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use crate::{
	_prelude::*,
	config::{DEFAULT_JWKS_ADDR, ServeConfig},
	keys::PrivateSigningKey,
	manager::KeyManager,
	server, telemetry,
};

/// JWKS aggregation and discovery service.
#[derive(Debug, Parser)]
#[command(name = "jwks-mesh", version, about)]
pub struct Cli {
	/// Default log filter when `RUST_LOG` is unset.
	#[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
	pub log_level: String,
	#[allow(missing_docs)]
	#[command(subcommand)]
	pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Aggregate key sources and serve the merged key set.
	Serve(ServeArgs),
	/// Print a new base64-encoded Ed25519 private key.
	GeneratePrivateKey,
}

/// Arguments for `serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
	/// Listen address for the discovery server.
	#[arg(long, env = "JWKS_ADDR", default_value = DEFAULT_JWKS_ADDR)]
	pub jwks_addr: SocketAddr,
	/// Base64-encoded private JWK whose public half is published.
	#[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
	pub private_key: Option<String>,
	/// Comma-separated upstream JWKS URLs.
	#[arg(long, env = "UPSTREAM_JWKS", value_delimiter = ',')]
	pub upstream_jwks: Vec<Url>,
}
impl From<ServeArgs> for ServeConfig {
	fn from(args: ServeArgs) -> Self {
		Self {
			jwks_addr: args.jwks_addr,
			private_key: args.private_key,
			upstream_jwks: args.upstream_jwks,
		}
	}
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
	telemetry::init_tracing(&cli.log_level);

	match cli.command {
		Command::Serve(args) => serve(args.into()).await,
		Command::GeneratePrivateKey => {
			println!("{}", PrivateSigningKey::generate().to_base64()?);

			Ok(())
		},
	}
}

/// Run the manager and discovery server for `config` until Ctrl-C or a fatal error.
pub async fn serve(config: ServeConfig) -> Result<()> {
	config.validate()?;
	#[cfg(feature = "prometheus")]
	crate::metrics::install_default_exporter()?;

	let manager = KeyManager::new()?;

	manager.add_source_urls(&config.upstream_jwks)?;

	if let Some(encoded) = config.private_key.as_deref().filter(|key| !key.trim().is_empty()) {
		let key = PrivateSigningKey::from_base64(encoded)?;

		tracing::info!(kid = key.kid(), "publishing local signing key");
		manager.add_public_keys([key.public_jwk()?])?;
	}

	let cancel = CancellationToken::new();

	tokio::spawn({
		let cancel = cancel.clone();

		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("shutdown requested");
			}

			cancel.cancel();
		}
	});

	let refresh = cancel_on_exit(manager.run(cancel.clone()), cancel.clone());
	let serve = cancel_on_exit(
		server::serve_jwks(manager.clone(), config.jwks_addr, cancel.clone()),
		cancel.clone(),
	);
	let (refreshed, served) = tokio::join!(refresh, serve);

	match (refreshed, served) {
		(Err(err), _) => Err(err),
		(Ok(()), Err(Error::Cancelled)) => Ok(()),
		(Ok(()), served) => served,
	}
}

async fn cancel_on_exit<F>(task: F, cancel: CancellationToken) -> Result<()>
where
	F: Future<Output = Result<()>>,
{
	let result = task.await;

	cancel.cancel();

	result
}
