use std::path::PathBuf;
use thiserror::Error;

/// Construction-time failures. Per-request conditions never surface as errors.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("error reading login HTML file from {}: {source}", path.display())]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing login template {}: {source}", path.display())]
    ParseTemplate {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is not valid UTF-8")]
    Encoding,
    #[error("unclosed action starting at byte {0}")]
    UnclosedAction(usize),
    #[error("empty action at byte {0}")]
    EmptyAction(usize),
    #[error("unknown field {0:?}, expected .Title or .Message")]
    UnknownField(String),
    #[error("unsupported action {0:?}")]
    UnsupportedAction(String),
    #[error("unexpected {{{{{0}}}}} without matching {{{{if}}}}")]
    Unexpected(&'static str),
    #[error("{{{{if}}}} is missing its {{{{end}}}}")]
    UnclosedIf,
}
