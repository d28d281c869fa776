use clap::{Arg, ArgGroup, Command};

pub const ARG_UPSTREAM: &str = "upstream";
pub const ARG_ROOT: &str = "root";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UPSTREAM)
                .long(ARG_UPSTREAM)
                .help("Protected HTTP service to proxy to, example: http://127.0.0.1:3000")
                .env("PASSGATE_UPSTREAM"),
        )
        .arg(
            Arg::new(ARG_ROOT)
                .long(ARG_ROOT)
                .help("Protected directory of static files to serve")
                .env("PASSGATE_ROOT"),
        )
        .group(
            ArgGroup::new("backend")
                .args([ARG_UPSTREAM, ARG_ROOT])
                .required(true),
        )
}
