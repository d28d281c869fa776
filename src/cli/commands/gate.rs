use crate::gate::{DEFAULT_LOGIN_HTML_PATH, DEFAULT_TITLE};
use clap::{builder::PossibleValuesParser, Arg, ArgAction, Command};

pub const ARG_PASSWORD: &str = "password";
pub const ARG_LOGIN_HTML_PATH: &str = "login-html-path";
pub const ARG_TITLE: &str = "title";
pub const ARG_MISSING_TEMPLATE: &str = "missing-template";
pub const ARG_TRUST_FORWARDED_PROTO: &str = "trust-forwarded-proto";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Shared password; also the key that signs session cookies")
                .env("PASSGATE_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_LOGIN_HTML_PATH)
                .long(ARG_LOGIN_HTML_PATH)
                .help("Login page template")
                .env("PASSGATE_LOGIN_HTML_PATH")
                .default_value(DEFAULT_LOGIN_HTML_PATH),
        )
        .arg(
            Arg::new(ARG_TITLE)
                .long(ARG_TITLE)
                .help("Title rendered into the login page")
                .env("PASSGATE_TITLE")
                .default_value(DEFAULT_TITLE),
        )
        .arg(
            Arg::new(ARG_MISSING_TEMPLATE)
                .long(ARG_MISSING_TEMPLATE)
                .help("When the login template cannot be read: allow (serve unprotected) or deny (refuse to start)")
                .env("PASSGATE_MISSING_TEMPLATE")
                .value_parser(PossibleValuesParser::new(["allow", "deny"]))
                .default_value("allow"),
        )
        .arg(
            Arg::new(ARG_TRUST_FORWARDED_PROTO)
                .long(ARG_TRUST_FORWARDED_PROTO)
                .help("Trust X-Forwarded-Proto to decide whether session cookies are Secure")
                .env("PASSGATE_TRUST_FORWARDED_PROTO")
                .action(ArgAction::SetTrue),
        )
}
