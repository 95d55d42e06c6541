use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ingress_core::telemetry;
use ingress_filter::config::{self, RawConfig};
use ingress_filter::filter::IngressFilterFactory;
use ingress_filter::rlf_client::RlfClient;
use ingress_filter::stats::Stats;
use prometheus_client::registry::Registry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
#[command(disable_version_flag = true)]
struct Args {
	/// Use config from bytes
	#[arg(short, long, value_name = "config")]
	config: Option<String>,

	/// Use config from file
	#[arg(short, long, value_name = "file")]
	file: Option<PathBuf>,

	/// Parse and compile the configuration, then exit without starting.
	#[arg(long, value_name = "validate-only")]
	validate_only: bool,

	/// Print version
	#[arg(short = 'V', long = "version")]
	version: bool,

	/// Scope prefix used to derive the `nf_instance` stats label (spec §4.4).
	#[arg(long, value_name = "scope-prefix", default_value = "n8e.unknown.ingress")]
	scope_prefix: String,
}

fn main() -> anyhow::Result<()> {
	let _log_flush = telemetry::setup_logging();

	let args = Args::parse();
	let Args {
		config,
		file,
		validate_only,
		version,
		scope_prefix,
	} = args;

	if version {
		println!("ingress-filter {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.unwrap()
		.block_on(async move {
			let (contents, filename) = match (config, file) {
				(Some(_), Some(_)) => anyhow::bail!("only one of --config or --file"),
				(Some(config), None) => (config, None),
				(None, Some(file)) => {
					let contents = fs_err::tokio::read_to_string(&file).await?;
					(contents, Some(file))
				},
				(None, None) => anyhow::bail!("one of --config or --file is required"),
			};

			let source = filename.as_ref().map(|f| f.display().to_string()).unwrap_or_else(|| "<inline>".to_string());
			let raw: RawConfig =
				serde_yaml::from_str(&contents).map_err(|e| anyhow::anyhow!("failed to parse {source}: {e}"))?;
			let compiled = config::compile(raw)?;

			if validate_only {
				println!("Configuration is valid!");
				return Ok(());
			}

			run(compiled, scope_prefix).await
		})
}

async fn run(cfg: config::Config, scope_prefix: String) -> anyhow::Result<()> {
	info!(namespace = ?cfg.namespace, limits = cfg.limits.len(), "loaded ingress rate-limit filter config");

	let networks = cfg.network_name.clone().into_iter();
	let rps: Vec<_> = cfg.rp_bucket_action.keys().cloned().collect();
	let mut registry = Registry::default();
	let stats = Arc::new(Stats::new(&mut registry, &scope_prefix, networks, rps));
	let rlf_client = Arc::new(RlfClient::new(cfg.rlf_service.cluster_name.clone()));
	let _factory = IngressFilterFactory::new(Arc::new(cfg), stats, rlf_client);

	info!("ingress rate-limit filter factory ready");
	Ok(())
}
