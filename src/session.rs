use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::AuthError;

const LOGOUT_MARKER: &str = "logout";

/// Outcome of a login attempt as judged from the response page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Authenticated,
    Rejected,
}

impl AuthResult {
    /// The site offers no structured confirmation; a logged-in page carries a
    /// logout link, so its presence is taken as success.
    pub fn from_body(body: &str) -> Self {
        if body.to_lowercase().contains(LOGOUT_MARKER) {
            AuthResult::Authenticated
        } else {
            AuthResult::Rejected
        }
    }
}

/// A logged-in HTTP client. Cookies from the login exchange ride along on
/// every later request.
pub struct AuthSession {
    client: Client,
}

impl AuthSession {
    pub async fn login(settings: &Settings) -> Result<Self, AuthError> {
        let client = build_client(settings)?;

        info!("Getting landing page {}", settings.base_url);
        let landing = client.get(&settings.base_url).send().await?;
        info!("Landing page status: {}", landing.status());

        let form = [
            ("login", settings.login.as_str()),
            ("passw", settings.password.as_str()),
            ("auth_mode", "login"),
        ];
        info!("Submitting login form");
        let response = client.post(&settings.base_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!("Login returned HTTP {}", status);
            return Err(AuthError::Status(status));
        }

        let body = response.text().await?;
        match AuthResult::from_body(&body) {
            AuthResult::Authenticated => {
                info!("Login successful");
                Ok(AuthSession { client })
            }
            AuthResult::Rejected => {
                error!("Login failed, check credentials");
                Err(AuthError::Rejected)
            }
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn build_client(settings: &Settings) -> Result<Client, AuthError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| AuthError::Header {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| AuthError::Header {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }

    // The source serves a certificate that does not validate.
    Client::builder()
        .cookie_store(true)
        .danger_accept_invalid_certs(true)
        .default_headers(headers)
        .timeout(settings.request_timeout())
        .build()
        .map_err(AuthError::Client)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ModuleSource;

    use axum::extract::Form;
    use axum::http::{header, HeaderMap as AxumHeaders, StatusCode};
    use axum::response::{Html, IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    const COOKIE: &str = "sid=abc123";

    async fn landing() -> Response {
        (
            [(header::SET_COOKIE, "pre=1; Path=/")],
            Html("<a href=\"/login\">Вход</a>"),
        )
            .into_response()
    }

    async fn submit(Form(form): Form<HashMap<String, String>>) -> Response {
        let ok = form.get("login").map(String::as_str) == Some("tester")
            && form.get("passw").map(String::as_str) == Some("secret")
            && form.get("auth_mode").map(String::as_str) == Some("login");
        if ok {
            (
                [(header::SET_COOKIE, format!("{COOKIE}; Path=/"))],
                Html("<a href=\"/?auth_mode=LogOut\">Выход</a>"),
            )
                .into_response()
        } else {
            Html("<form>Неверный логин</form>").into_response()
        }
    }

    async fn schedule(headers: AxumHeaders) -> Response {
        let authed = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|c| c.contains(COOKIE));
        if authed {
            Html(include_str!("../tests/fixtures/module_page.html")).into_response()
        } else {
            StatusCode::FORBIDDEN.into_response()
        }
    }

    /// Serve a stand-in for the source site on an ephemeral port and return
    /// its base URL.
    pub(crate) async fn spawn_site() -> String {
        let app = Router::new()
            .route("/", get(landing).post(submit))
            .route("/plan/good/", get(schedule))
            .route("/plan/broken/", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn site_settings(base: &str, login: &str) -> Settings {
        Settings {
            base_url: format!("{base}/"),
            login: login.to_string(),
            password: "secret".to_string(),
            request_delay_ms: 0,
            modules: vec![ModuleSource {
                name: "Good".to_string(),
                url: format!("{base}/plan/good/"),
            }],
            ..Settings::default()
        }
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert_eq!(
            AuthResult::from_body("<a href='?auth_mode=LOGOUT'>x</a>"),
            AuthResult::Authenticated
        );
        assert_eq!(AuthResult::from_body("LogOut"), AuthResult::Authenticated);
        assert_eq!(AuthResult::from_body("<form>login</form>"), AuthResult::Rejected);
        assert_eq!(AuthResult::from_body(""), AuthResult::Rejected);
    }

    #[test]
    fn bad_header_is_reported() {
        let mut settings = Settings::default();
        settings.headers.insert("Bad Header".to_string(), "x".to_string());
        assert!(matches!(
            build_client(&settings),
            Err(AuthError::Header { .. })
        ));
    }

    #[tokio::test]
    async fn login_succeeds_with_valid_credentials() {
        let base = spawn_site().await;
        let session = AuthSession::login(&site_settings(&base, "tester")).await;
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn login_without_marker_is_rejected() {
        let base = spawn_site().await;
        let err = AuthSession::login(&site_settings(&base, "intruder"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Rejected));
    }

    #[tokio::test]
    async fn unreachable_site_is_transport_error() {
        let settings = Settings {
            base_url: "http://127.0.0.1:1/".to_string(),
            request_timeout_secs: 2,
            ..Settings::default()
        };
        let err = AuthSession::login(&settings).await.err().unwrap();
        assert!(matches!(err, AuthError::Transport(_)));
    }
}
