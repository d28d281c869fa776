use crate::{
    api::{self, transport::TransportPolicy, Backend},
    cli::telemetry,
    gate::{Gate, GateConfig},
};
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub gate: GateConfig,
    pub backend: Backend,
    pub policy: TransportPolicy,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the gate cannot be configured or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let gate = Gate::new(args.gate).context("Could not configure the password gate")?;

    let result = api::new(args.port, gate, args.backend, args.policy).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let backend = match &args.backend {
        Backend::Upstream(url) => format!("upstream {url}"),
        Backend::Directory(root) => format!("directory {}", root.display()),
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("backend", backend),
        ("password", "REDACTED".to_string()),
        (
            "login_html_path",
            args.gate.login_html_path().display().to_string(),
        ),
        ("title", args.gate.title().to_string()),
        ("missing_template", args.gate.missing_template().to_string()),
        (
            "trust_forwarded_proto",
            args.policy.trust_forwarded_proto.to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", passgate_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn passgate_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    PASSGATE_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const PASSGATE_BANNER: &str = r"
  +-----+
  |  _  |
  | | | |
  +-+-+-+   P A S S G A T E {VERSION}
  |  o  |
  |  |  |
  +-----+";
