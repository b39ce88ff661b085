use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::session::Session;
use crate::transport::{PortalResponse, RequestOptions, Transport};

/// Operations on one gate device, scoped to a logged-in session.
pub struct DeviceApi<T: Transport> {
    session: Session<T>,
    device_id: u64,
}

impl<T: Transport> DeviceApi<T> {
    /// Logs the session in first if needed; a session that cannot log in
    /// cannot be used for device operations.
    pub fn new(mut session: Session<T>, device_id: u64) -> Result<Self> {
        session.ensure_logged_in()?;
        Ok(Self { session, device_id })
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    pub(crate) fn config(&self) -> &PortalConfig {
        self.session.config()
    }

    pub(crate) fn transport(&self) -> &T {
        self.session.transport()
    }

    pub(crate) fn require_login(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(PortalError::NotLoggedIn)
        }
    }

    pub(crate) fn referer(&self) -> String {
        self.config().device_url(self.device_id)
    }

    pub(crate) fn ajax_options(&self) -> RequestOptions {
        RequestOptions::ajax(self.referer())
    }

    pub(crate) fn form_options(&self) -> RequestOptions {
        RequestOptions::form(self.referer(), self.config().base_url.clone())
    }

    /// GET that insists on a 200 answer.
    pub(crate) fn fetch(&self, url: &str, options: &RequestOptions) -> Result<PortalResponse> {
        let response = self.transport().get(url, options)?;
        if !response.is_ok() {
            return Err(PortalError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}
