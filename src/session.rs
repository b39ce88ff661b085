use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::models::Credentials;
use crate::parser;
use crate::transport::{HttpTransport, RequestOptions, Transport};
use tracing::{debug, error, info};

pub const SESSION_COOKIE: &str = "PHPSESSID";
pub const CSRF_COOKIE: &str = "YII_CSRF_TOKEN";
pub const CSRF_FIELD: &str = "YII_CSRF_TOKEN";

/// Login state against the portal. Holds the transport (and with it the
/// cookie jar) so every device operation shares one session.
pub struct Session<T: Transport> {
    transport: T,
    config: PortalConfig,
    credentials: Credentials,
    token: Option<String>,
    logged_in: bool,
}

impl Session<HttpTransport> {
    pub fn connect(config: PortalConfig, credentials: Credentials) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Session::new(transport, config, credentials))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: PortalConfig, credentials: Credentials) -> Self {
        Self {
            transport,
            config,
            credentials,
            token: None,
            logged_in: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Latest CSRF token. The portal may rotate the cookie between requests,
    /// so the jar wins over the value captured at login.
    pub fn token(&self) -> Option<String> {
        self.transport
            .cookie(CSRF_COOKIE)
            .and_then(|raw| parser::csrf_token_from_cookie(&raw))
            .or_else(|| self.token.clone())
    }

    /// Log in with the stored credentials. Success needs a 200 response and
    /// a session cookie that differs from the one handed out before login.
    pub fn login(&mut self) -> Result<()> {
        let login_url = self.config.login_url();

        let page = self
            .transport
            .get(&login_url, &RequestOptions::document())
            .inspect_err(|e| error!("Error occurred while requesting login page: {}", e))?;
        if !page.is_ok() {
            return Err(PortalError::UnexpectedStatus {
                url: login_url,
                status: page.status,
            });
        }

        let pre_login_session = self.transport.cookie(SESSION_COOKIE);
        debug!(session = ?pre_login_session, "session id before login");

        let token = self
            .transport
            .cookie(CSRF_COOKIE)
            .and_then(|raw| parser::csrf_token_from_cookie(&raw))
            .ok_or_else(|| PortalError::Authentication("login page did not provide a CSRF token".to_string()))?;

        let fields = vec![
            (CSRF_FIELD.to_string(), token.clone()),
            ("UserLogin[username]".to_string(), self.credentials.username.clone()),
            ("UserLogin[password]".to_string(), self.credentials.password.clone()),
        ];
        let options = RequestOptions::form(login_url.clone(), self.config.base_url.clone());
        let response = self
            .transport
            .post_form(&login_url, &fields, &options)
            .inspect_err(|e| error!("Error occurred while logging in: {}", e))?;

        let post_login_session = self.transport.cookie(SESSION_COOKIE);
        debug!(session = ?post_login_session, "session id after login");

        if response.is_ok() && post_login_session.is_some() && post_login_session != pre_login_session {
            self.token = Some(token);
            self.logged_in = true;
            info!(username = %self.credentials.username, "logged in");
            Ok(())
        } else {
            error!("Error occurred while logging in. Status code {}", response.status);
            Err(PortalError::Authentication(format!(
                "unable to login with username {}, please check your credentials",
                self.credentials.username
            )))
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        if !self.logged_in {
            error!("Cannot log out because this session is not logged in.");
            return Err(PortalError::NotLoggedIn);
        }
        self.transport
            .get(&self.config.logout_url(), &RequestOptions::document())
            .inspect_err(|e| error!("Error occurred while logging out: {}", e))?;
        self.logged_in = false;
        self.token = None;
        info!("logged out");
        Ok(())
    }

    /// Log in unless already logged in.
    pub fn ensure_logged_in(&mut self) -> Result<()> {
        if self.logged_in {
            return Ok(());
        }
        self.login()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::fake::{FakeTransport, Method, Reply};

    pub const TOKEN_COOKIE: &str = "abc%3A40%3A%22tok123%22%3B";
    pub const LOGIN: &str = "https://gates.eldesalarms.com/en/user/login.html";
    pub const LOGOUT: &str = "https://gates.eldesalarms.com/user/logout";

    pub fn login_page() -> Reply {
        Reply::ok("<html><form></form></html>")
            .with_cookie(SESSION_COOKIE, "before")
            .with_cookie(CSRF_COOKIE, TOKEN_COOKIE)
    }

    pub fn session_with(transport: FakeTransport) -> Session<FakeTransport> {
        Session::new(transport, PortalConfig::default(), Credentials::new("test_user", "test_pass"))
    }

    /// A session that has already gone through a successful login.
    pub fn logged_in(transport: FakeTransport) -> Session<FakeTransport> {
        logged_in_with(transport, PortalConfig::default())
    }

    pub fn logged_in_with(transport: FakeTransport, config: PortalConfig) -> Session<FakeTransport> {
        let transport = transport
            .on_get(LOGIN, vec![login_page()])
            .on_post(LOGIN, vec![Reply::ok("welcome").with_cookie(SESSION_COOKIE, "after")])
            .on_get(LOGOUT, vec![Reply::ok("bye")]);
        let mut session = Session::new(transport, config, Credentials::new("test_user", "test_pass"));
        session.login().unwrap();
        session
    }

    #[test]
    fn login_succeeds_with_200_and_new_session_cookie() {
        let session = logged_in(FakeTransport::new());
        assert!(session.is_logged_in());
        assert_eq!(session.token().as_deref(), Some("tok123"));

        let requests = session.transport().requests.borrow();
        let post = requests.iter().find(|r| r.method == Method::Post).unwrap();
        assert!(post.fields.contains(&(CSRF_FIELD.to_string(), "tok123".to_string())));
        assert!(post
            .fields
            .contains(&("UserLogin[username]".to_string(), "test_user".to_string())));
        assert!(post
            .fields
            .contains(&("UserLogin[password]".to_string(), "test_pass".to_string())));
    }

    #[test]
    fn login_fails_when_session_cookie_unchanged() {
        let transport = FakeTransport::new()
            .on_get(LOGIN, vec![login_page()])
            .on_post(LOGIN, vec![Reply::ok("login form again")]);
        let mut session = session_with(transport);
        assert!(matches!(session.login(), Err(PortalError::Authentication(_))));
        assert!(!session.is_logged_in());
    }

    #[test]
    fn login_fails_on_non_200_even_with_new_cookie() {
        let transport = FakeTransport::new()
            .on_get(LOGIN, vec![login_page()])
            .on_post(LOGIN, vec![Reply::status(403, "denied").with_cookie(SESSION_COOKIE, "after")]);
        let mut session = session_with(transport);
        assert!(matches!(session.login(), Err(PortalError::Authentication(_))));
        assert!(!session.is_logged_in());
    }

    #[test]
    fn login_fails_when_login_page_is_unavailable() {
        let transport = FakeTransport::new().on_get(LOGIN, vec![Reply::status(404, "not found")]);
        let mut session = session_with(transport);
        assert!(matches!(
            session.login(),
            Err(PortalError::UnexpectedStatus { status: 404, .. })
        ));
        assert_eq!(session.transport().count(Method::Post, LOGIN), 0);
    }

    #[test]
    fn login_fails_without_csrf_cookie() {
        let transport = FakeTransport::new()
            .on_get(LOGIN, vec![Reply::ok("<html><form></form></html>").with_cookie(SESSION_COOKIE, "before")])
            .on_post(LOGIN, vec![Reply::ok("welcome").with_cookie(SESSION_COOKIE, "after")]);
        let mut session = session_with(transport);
        assert!(matches!(session.login(), Err(PortalError::Authentication(_))));
        assert!(!session.is_logged_in());
        assert_eq!(session.transport().count(Method::Post, LOGIN), 0);
    }

    #[test]
    fn login_reports_network_failure() {
        let transport = FakeTransport::new().on_get(LOGIN, vec![Reply::Fail("connection refused".to_string())]);
        let mut session = session_with(transport);
        assert!(matches!(session.login(), Err(PortalError::Transport { .. })));
    }

    #[test]
    fn logout_requires_login() {
        let mut session = session_with(FakeTransport::new());
        assert!(matches!(session.logout(), Err(PortalError::NotLoggedIn)));

        let mut session = logged_in(FakeTransport::new());
        session.logout().unwrap();
        assert!(!session.is_logged_in());
        assert!(matches!(session.logout(), Err(PortalError::NotLoggedIn)));
    }

    #[test]
    fn token_follows_rotated_cookie() {
        let session = logged_in(FakeTransport::new());
        session
            .transport()
            .set_cookie(CSRF_COOKIE, "abc%3A40%3A%22rotated%22%3B");
        assert_eq!(session.token().as_deref(), Some("rotated"));
    }
}
