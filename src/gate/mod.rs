//! The password gate.
//!
//! Every request is classified into one of three outcomes:
//!
//! 1. A valid `spp-session` cookie: forwarded to the protected service untouched.
//! 2. A form `POST` carrying `ssp-password`: on a match a signed session cookie
//!    is issued with a `303 See Other` back to the same URL, otherwise the login
//!    page is shown again with an error message.
//! 3. Anything else: the login page, `401 Unauthorized`.
//!
//! When the login page template cannot be read the gate is *unconfigured*
//! and, unless [`MissingTemplate::Deny`] is set, forwards everything.

pub mod cookie;
pub mod error;
pub mod template;
pub mod token;

pub use self::cookie::SESSION_COOKIE_NAME;
pub use self::error::{GateError, TemplateError};
pub use self::template::{LoginPage, LoginTemplate, DEFAULT_TITLE, INVALID_PASSWORD_MESSAGE};
pub use self::token::{new_session_id, SessionCodec};

use axum::{
    body::to_bytes,
    extract::{OriginalUri, Request, State},
    http::{
        header::{CONTENT_TYPE, LOCATION, SET_COOKIE},
        uri::Scheme,
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info};

pub const DEFAULT_LOGIN_HTML_PATH: &str = "/login.html";
pub const PASSWORD_FIELD: &str = "ssp-password";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_FORM_BYTES: usize = 64 * 1024;

/// What to do when the login page template cannot be read at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingTemplate {
    /// Run unprotected and warn on every request.
    #[default]
    Allow,
    /// Refuse to build the gate.
    Deny,
}

impl FromStr for MissingTemplate {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(format!("invalid missing-template policy: {value}")),
        }
    }
}

impl fmt::Display for MissingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// Whether the request reached the host over an encrypted connection.
///
/// Inserted as a request extension by the host; when absent the request URI
/// scheme is consulted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub encrypted: bool,
}

#[derive(Clone, Debug)]
pub struct GateConfig {
    password: SecretString,
    login_html_path: PathBuf,
    title: String,
    missing_template: MissingTemplate,
}

impl GateConfig {
    #[must_use]
    pub fn new(password: SecretString) -> Self {
        Self {
            password,
            login_html_path: PathBuf::from(DEFAULT_LOGIN_HTML_PATH),
            title: DEFAULT_TITLE.to_string(),
            missing_template: MissingTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_login_html_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.login_html_path = path.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_missing_template(mut self, policy: MissingTemplate) -> Self {
        self.missing_template = policy;
        self
    }

    #[must_use]
    pub fn login_html_path(&self) -> &Path {
        &self.login_html_path
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn missing_template(&self) -> MissingTemplate {
        self.missing_template
    }
}

#[derive(Debug)]
enum Mode {
    Configured(LoginTemplate),
    Unconfigured,
}

/// Immutable after construction; share it behind an [`Arc`].
#[derive(Debug)]
pub struct Gate {
    password: SecretString,
    codec: SessionCodec,
    login_html_path: PathBuf,
    title: String,
    mode: Mode,
}

impl Gate {
    /// Load the login page and key the session codec.
    ///
    /// # Errors
    /// Fails when the password is empty, when the template exists but does not
    /// parse, or when it cannot be read and the policy is [`MissingTemplate::Deny`].
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        let codec = SessionCodec::new(&config.password)?;
        let path = config.login_html_path;

        let mode = match std::fs::read(&path) {
            Ok(bytes) => {
                let template = LoginTemplate::from_bytes(&bytes).map_err(|source| {
                    GateError::ParseTemplate {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!(path = %path.display(), "login page template loaded");
                Mode::Configured(template)
            }
            Err(source) => match config.missing_template {
                MissingTemplate::Allow => {
                    error!(
                        path = %path.display(),
                        "login page template unavailable ({source}), requests will not be authenticated"
                    );
                    Mode::Unconfigured
                }
                MissingTemplate::Deny => return Err(GateError::ReadTemplate { path, source }),
            },
        };

        Ok(Self {
            password: config.password,
            codec,
            login_html_path: path,
            title: config.title,
            mode,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self.mode, Mode::Configured(_))
    }

    /// Decide the outcome for one request, delegating to `next` when allowed through.
    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let Mode::Configured(template) = &self.mode else {
            error!(
                path = %self.login_html_path.display(),
                "login page template not loaded, forwarding request without authentication"
            );
            return next.run(request).await;
        };

        let session = cookie::extract_session_token(request.headers())
            .map(|token| self.codec.verify(token));
        match session {
            Some(true) => {
                debug!("valid session cookie, forwarding");
                return next.run(request).await;
            }
            Some(false) => debug!("invalid session cookie"),
            None => {}
        }

        if request.method() == Method::POST {
            let secure = is_encrypted(&request);
            let target = redirect_target(&request);

            if let Some(submitted) = submitted_password(request).await {
                if self.password_matches(&submitted) {
                    return self.issue_session(&target, secure);
                }
                info!("invalid password submitted");
                return self.challenge(template, INVALID_PASSWORD_MESSAGE);
            }
            debug!("no password in submitted form");
        }

        self.challenge(template, "")
    }

    fn password_matches(&self, submitted: &SecretString) -> bool {
        self.password
            .expose_secret()
            .as_bytes()
            .ct_eq(submitted.expose_secret().as_bytes())
            .into()
    }

    fn issue_session(&self, target: &str, secure: bool) -> Response {
        let token = self.codec.mint(&new_session_id());

        let headers = cookie::session_cookie(&token, secure)
            .and_then(|cookie| Ok((cookie, HeaderValue::from_str(target)?)));
        match headers {
            Ok((cookie, location)) => {
                info!(secure, "password accepted, session issued");
                (
                    StatusCode::SEE_OTHER,
                    [(SET_COOKIE, cookie), (LOCATION, location)],
                )
                    .into_response()
            }
            Err(err) => {
                error!("Failed to build session response: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    fn challenge(&self, template: &LoginTemplate, message: &str) -> Response {
        let page = LoginPage::new(self.title.as_str()).with_message(message);
        (
            StatusCode::UNAUTHORIZED,
            [(CONTENT_TYPE, HeaderValue::from_static("text/html"))],
            template.render(&page),
        )
            .into_response()
    }
}

/// axum middleware entry point, wire with
/// `axum::middleware::from_fn_with_state(gate, passgate::gate::protect)`.
pub async fn protect(State(gate): State<Arc<Gate>>, request: Request, next: Next) -> Response {
    gate.handle(request, next).await
}

fn is_encrypted(request: &Request) -> bool {
    match request.extensions().get::<Transport>() {
        Some(transport) => transport.encrypted,
        None => request.uri().scheme() == Some(&Scheme::HTTPS),
    }
}

// Nested routers rewrite the URI; redirect to what the client actually asked for.
fn redirect_target(request: &Request) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().to_string(), |original| original.0.to_string())
}

/// Password from a url-encoded form body. Any other body, an unreadable or
/// oversized one, or a form without the field counts as no submission.
async fn submitted_password(request: Request) -> Option<SecretString> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE));
    if !is_form {
        return None;
    }

    let body = match to_bytes(request.into_body(), MAX_FORM_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            debug!("Failed to read form body: {err}");
            return None;
        }
    };

    url::form_urlencoded::parse(&body)
        .find(|(name, _)| name == PASSWORD_FIELD)
        .map(|(_, value)| SecretString::from(value.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, middleware, routing::get, Router};
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    const TEMPLATE: &str = "<h1>{{.Title}}</h1>{{if .Message}}<p>{{.Message}}</p>{{end}}";

    fn template_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn config(path: &Path) -> GateConfig {
        GateConfig::new(SecretString::from("s3cret".to_string())).with_login_html_path(path)
    }

    fn app(gate: Gate) -> Router {
        Router::new()
            .route("/", get(|| async { "protected" }).post(|| async { "protected" }))
            .layer(middleware::from_fn_with_state(Arc::new(gate), protect))
    }

    fn login(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/?page=2")
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = GateConfig::new(SecretString::from("pw".to_string()));
        assert_eq!(config.login_html_path(), Path::new("/login.html"));
        assert_eq!(config.title(), "Password Protected");
        assert_eq!(config.missing_template(), MissingTemplate::Allow);
    }

    #[test]
    fn missing_template_policy_parses() {
        assert_eq!("allow".parse(), Ok(MissingTemplate::Allow));
        assert_eq!("DENY".parse(), Ok(MissingTemplate::Deny));
        assert!("maybe".parse::<MissingTemplate>().is_err());
        assert_eq!(MissingTemplate::Deny.to_string(), "deny");
    }

    #[test]
    fn construction_states() {
        let file = template_file(TEMPLATE.as_bytes());
        assert!(Gate::new(config(file.path())).unwrap().is_configured());

        let missing = file.path().with_extension("missing");
        assert!(!Gate::new(config(&missing)).unwrap().is_configured());
    }

    #[test]
    fn deny_policy_rejects_missing_template() {
        let file = template_file(TEMPLATE.as_bytes());
        let missing = file.path().with_extension("missing");
        let result = Gate::new(config(&missing).with_missing_template(MissingTemplate::Deny));
        assert!(matches!(result, Err(GateError::ReadTemplate { .. })));
    }

    #[test]
    fn malformed_template_is_fatal() {
        let file = template_file(b"<h1>{{.Title</h1>");
        let result = Gate::new(config(file.path()));
        assert!(matches!(
            result,
            Err(GateError::ParseTemplate {
                source: TemplateError::UnclosedAction(4),
                ..
            })
        ));

        let file = template_file(b"\xff\xfe");
        assert!(matches!(
            Gate::new(config(file.path())),
            Err(GateError::ParseTemplate {
                source: TemplateError::Encoding,
                ..
            })
        ));
    }

    #[test]
    fn empty_password_is_fatal() {
        let file = template_file(TEMPLATE.as_bytes());
        let config =
            GateConfig::new(SecretString::from(String::new())).with_login_html_path(file.path());
        assert!(matches!(Gate::new(config), Err(GateError::EmptyPassword)));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut lines) = self.0.lock() {
                lines.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn unconfigured_gate_logs_every_forwarded_request() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let file = template_file(TEMPLATE.as_bytes());
        let missing = file.path().with_extension("missing");
        let gate = Gate::new(config(&missing)).unwrap();
        let startup = captured.text();
        assert!(startup.contains("login page template unavailable"));
        assert!(startup.contains(&missing.display().to_string()));

        let app = app(gate);
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let output = captured.text();
        assert_eq!(output.matches("login page template not loaded").count(), 2);
        assert_eq!(
            output.matches(&missing.display().to_string()).count(),
            3
        );
    }

    #[tokio::test]
    async fn secure_flag_follows_transport() {
        let file = template_file(TEMPLATE.as_bytes());

        let mut request = login("ssp-password=s3cret");
        request.extensions_mut().insert(Transport { encrypted: true });
        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(request)
            .await
            .unwrap();
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.ends_with("; HttpOnly; Secure"));

        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(login("ssp-password=s3cret"))
            .await
            .unwrap();
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.ends_with("; HttpOnly"));
    }

    #[tokio::test]
    async fn redirect_keeps_path_and_query() {
        let file = template_file(TEMPLATE.as_bytes());
        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(login("other=1&ssp-password=s3cret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/?page=2");
    }

    #[tokio::test]
    async fn form_without_password_gets_plain_challenge() {
        let file = template_file(TEMPLATE.as_bytes());
        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(login("username=admin"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Password Protected</h1>");
    }

    #[tokio::test]
    async fn non_form_post_gets_plain_challenge() {
        let file = template_file(TEMPLATE.as_bytes());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"ssp-password":"s3cret"}"#))
            .unwrap();
        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn oversized_form_gets_plain_challenge() {
        let file = template_file(TEMPLATE.as_bytes());
        let body = format!("ssp-password=s3cret&pad={}", "x".repeat(MAX_FORM_BYTES));
        let response = app(Gate::new(config(file.path())).unwrap())
            .oneshot(login(&body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn custom_title_is_rendered() {
        let file = template_file(TEMPLATE.as_bytes());
        let gate = Gate::new(config(file.path()).with_title("Staging <internal>")).unwrap();
        let response = app(gate)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/html");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Staging &lt;internal&gt;</h1>");
    }
}
