use chrono::{NaiveDate, Utc};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://gates.eldesalarms.com";

const API_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub sync_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            sync_timeout: Duration::from_secs(180),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PortalConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn login_url(&self) -> String {
        format!("{}/en/user/login.html", self.base())
    }

    pub fn logout_url(&self) -> String {
        format!("{}/user/logout", self.base())
    }

    pub fn device_url(&self, device_id: u64) -> String {
        format!("{}/gatesconfig/settings/configuration/device_id/{}", self.base(), device_id)
    }

    pub fn users_page_url(&self, device_id: u64, page: usize) -> String {
        if page <= 1 {
            return self.device_url(device_id);
        }
        format!(
            "{}/en/gatesconfig/settings/configuration/ajax/gatesconfig-device-usersdatabase-grid/device_id/{}/GatesconfigDeviceUsersdatabase_page/{}.html?ajax=gatesconfig-device-usersdatabase-grid",
            self.base(),
            device_id,
            page
        )
    }

    pub fn add_user_form_url(&self, device_id: u64) -> String {
        format!(
            "{}/en/gatesconfig/settings/users/ajax/1/device_id/{}/tab/1.html?_={}",
            self.base(),
            device_id,
            cache_buster()
        )
    }

    pub fn log_file_url(&self, device_id: u64, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/en/gatesconfig/settings/getlog/ajax/1/device_id/{}.html?_={}&logstart={}&logend={}",
            self.base(),
            device_id,
            cache_buster(),
            start.format(API_DATE_FORMAT),
            end.format(API_DATE_FORMAT)
        )
    }

    pub fn sync_url(&self, device_id: u64) -> String {
        format!("{}/en/gatesconfig/settings/start/devId/{}.html", self.base(), device_id)
    }

    pub fn sync_progress_url(&self, device_id: u64) -> String {
        format!("{}/gatesconfig/settings/check?devId={}", self.base(), device_id)
    }

    /// Resolve a link scraped from a portal page.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", self.base(), href.trim_start_matches('/'))
        }
    }
}

fn cache_buster() -> i64 {
    Utc::now().timestamp()
}
