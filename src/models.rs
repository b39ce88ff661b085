use chrono::NaiveDateTime;
use serde::Deserialize;

/// Number of trailing phone digits dropped to form the app password.
const APP_PASSWORD_STRIP: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A user registered on the intercom. The portal is authoritative for identity,
/// so nothing here enforces uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub phone: String,
    pub output: String,
    pub app_access: bool,
}

impl User {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            output: output.into(),
            app_access: true,
        }
    }

    /// The app password is the phone number minus its last six characters.
    pub fn app_password(&self) -> String {
        let chars: Vec<char> = self.phone.chars().collect();
        let keep = chars.len().saturating_sub(APP_PASSWORD_STRIP);
        chars[..keep].iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub when: NaiveDateTime,
    pub who: Option<String>,
    pub phone: Option<String>,
    pub apt_no: Option<u32>,
}

/// Body of the sync progress endpoint, e.g.
/// `{"percentage":0,"stop":1,"state_string":"Downloading data"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncStatus {
    pub percentage: u32,
    #[serde(default)]
    pub stop: i64,
    #[serde(default)]
    pub state_string: String,
}

impl SyncStatus {
    pub fn is_complete(&self) -> bool {
        self.percentage >= 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_password_strips_last_six_characters() {
        let user = User::new("TestUser", "1234567890", "Gate");
        assert_eq!(user.app_password(), "1234");
    }

    #[test]
    fn app_password_of_short_phone_is_empty() {
        let user = User::new("TestUser", "12345", "Gate");
        assert_eq!(user.app_password(), "");
    }

    #[test]
    fn sync_status_parses_portal_json() {
        let status: SyncStatus =
            serde_json::from_str(r#"{"percentage":40,"stop":1,"state_string":"Downloading data"}"#).unwrap();
        assert_eq!(status.percentage, 40);
        assert_eq!(status.state_string, "Downloading data");
        assert!(!status.is_complete());
    }
}
