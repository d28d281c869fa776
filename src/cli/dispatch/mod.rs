use crate::{
    api::{transport::TransportPolicy, Backend},
    cli::{
        actions::{server::Args, Action},
        commands::{self, backend, gate},
    },
    gate::{GateConfig, MissingTemplate},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let password = matches
        .get_one::<String>(gate::ARG_PASSWORD)
        .cloned()
        .context("missing required argument: --password")?;

    let missing_template = matches
        .get_one::<String>(gate::ARG_MISSING_TEMPLATE)
        .map_or(Ok(MissingTemplate::default()), |value| {
            value.parse::<MissingTemplate>()
        })
        .map_err(|e| anyhow!(e))?;

    let mut gate_config =
        GateConfig::new(SecretString::from(password)).with_missing_template(missing_template);
    if let Some(path) = matches.get_one::<String>(gate::ARG_LOGIN_HTML_PATH) {
        gate_config = gate_config.with_login_html_path(path);
    }
    if let Some(title) = matches.get_one::<String>(gate::ARG_TITLE) {
        gate_config = gate_config.with_title(title);
    }

    let backend = if let Some(upstream) = matches.get_one::<String>(backend::ARG_UPSTREAM) {
        Backend::upstream(upstream)?
    } else {
        let root = matches
            .get_one::<String>(backend::ARG_ROOT)
            .context("missing required argument: --upstream or --root")?;
        Backend::Directory(PathBuf::from(root))
    };

    let policy = TransportPolicy {
        trust_forwarded_proto: matches.get_flag(gate::ARG_TRUST_FORWARDED_PROTO),
    };

    Ok(Action::Server(Args {
        port,
        gate: gate_config,
        backend,
        policy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn matches(args: &[&str]) -> clap::ArgMatches {
        let vars: Vec<(&str, Option<&str>)> = [
            "PASSGATE_PASSWORD",
            "PASSGATE_LOGIN_HTML_PATH",
            "PASSGATE_TITLE",
            "PASSGATE_MISSING_TEMPLATE",
            "PASSGATE_TRUST_FORWARDED_PROTO",
            "PASSGATE_UPSTREAM",
            "PASSGATE_ROOT",
            "PASSGATE_PORT",
        ]
        .into_iter()
        .map(|key| (key, None))
        .collect();
        temp_env::with_vars(vars, || {
            commands::new().get_matches_from(std::iter::once("passgate").chain(args.iter().copied()))
        })
    }

    #[test]
    fn builds_server_action_for_upstream() -> Result<()> {
        let matches = matches(&[
            "--password",
            "s3cret",
            "--upstream",
            "http://127.0.0.1:3000",
            "--missing-template",
            "deny",
            "--login-html-path",
            "/srv/login.html",
            "--trust-forwarded-proto",
        ]);

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 8080);
        assert_eq!(args.gate.missing_template(), MissingTemplate::Deny);
        assert_eq!(args.gate.login_html_path(), Path::new("/srv/login.html"));
        assert_eq!(args.gate.title(), "Password Protected");
        assert!(matches!(args.backend, Backend::Upstream(_)));
        assert!(args.policy.trust_forwarded_proto);
        Ok(())
    }

    #[test]
    fn builds_server_action_for_directory() -> Result<()> {
        let matches = matches(&["--password", "s3cret", "--root", "/srv/www", "-p", "9000"]);

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 9000);
        assert_eq!(args.backend, Backend::Directory(PathBuf::from("/srv/www")));
        assert_eq!(args.gate.missing_template(), MissingTemplate::Allow);
        assert!(!args.policy.trust_forwarded_proto);
        Ok(())
    }

    #[test]
    fn rejects_https_upstream() {
        let matches = matches(&["--password", "s3cret", "--upstream", "https://example.com"]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn password_is_kept_secret() -> Result<()> {
        let matches = matches(&["--password", "s3cret", "--root", "/srv/www"]);
        let Action::Server(args) = handler(&matches)?;
        assert!(!format!("{args:?}").contains("s3cret"));
        Ok(())
    }
}
