use crate::device::DeviceApi;
use crate::error::{PortalError, Result};
use crate::models::User;
use crate::parser;
use crate::session::CSRF_FIELD;
use crate::transport::Transport;
use tracing::{debug, error, info};

const FIELD_PREFIX: &str = "GatesconfigDeviceUsersdatabase";

fn field(name: &str) -> String {
    format!("{}[{}]", FIELD_PREFIX, name)
}

/// Outcome of a batch upload. Failures carry the error message for reporting.
#[derive(Debug, Default)]
pub struct EnrollmentReport {
    pub added: Vec<User>,
    pub failed: Vec<(User, String)>,
}

impl<T: Transport> DeviceApi<T> {
    /// Register one user. The add-user form is fetched first to learn where to
    /// post and which output channels exist.
    pub fn add_user(&self, user: &User) -> Result<()> {
        self.require_login()?;

        let form_url = self.config().add_user_form_url(self.device_id());
        let page = self.fetch(&form_url, &self.ajax_options())?;

        let action = parser::form_action(&page.body)?;
        debug!("URL to create a new user {}", action);

        let options = parser::output_options(&page.body);
        let output_value = options
            .iter()
            .find(|(label, _)| *label == user.output)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| PortalError::InvalidOutput {
                output: user.output.clone(),
                valid: options.iter().map(|(label, _)| label.clone()).collect(),
            })?;

        let token = self
            .session()
            .token()
            .ok_or_else(|| PortalError::Authentication("no CSRF token in session".to_string()))?;

        let fields = vec![
            (CSRF_FIELD.to_string(), token),
            (field("phone"), user.phone.clone()),
            (field("user_name"), user.name.clone()),
            (field("app"), if user.app_access { "1" } else { "0" }.to_string()),
            (field("app_password"), user.app_password()),
            (field("output"), output_value),
            (field("schedulerList"), String::new()),
            (field("validuntildate"), String::new()),
            (field("ring_counter"), String::new()),
        ];

        let url = self.config().resolve(&action);
        let response = self.transport().post_form(&url, &fields, &self.form_options())?;
        if !response.is_ok() {
            return Err(PortalError::UnexpectedStatus {
                url,
                status: response.status,
            });
        }

        info!(name = %user.name, "added user");
        Ok(())
    }

    /// Register each user independently; one failure does not stop the batch.
    pub fn add_users<'u, I>(&self, users: I) -> EnrollmentReport
    where
        I: IntoIterator<Item = &'u User>,
    {
        let mut report = EnrollmentReport::default();
        for user in users {
            match self.add_user(user) {
                Ok(()) => report.added.push(user.clone()),
                Err(e) => {
                    error!("Error occurred while adding user {}: {}", user.name, e);
                    report.failed.push((user.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::api_with;
    use crate::transport::fake::{FakeTransport, Method, Reply};

    const FORM_PAGE: &str = "https://gates.eldesalarms.com/en/gatesconfig/settings/users/ajax/1/device_id/1/tab/1.html";
    const SUBMIT: &str = "https://gates.eldesalarms.com/en/gatesconfig/settings/users/ajax/1/device_id/1/number/385.html";

    fn form_page() -> Reply {
        Reply::ok(
            r#"<html><body><form action="/en/gatesconfig/settings/users/ajax/1/device_id/1/number/385.html" method="post">
            <select id="GatesconfigDeviceUsersdatabase_output" name="GatesconfigDeviceUsersdatabase[output]">
              <option value="">Select</option>
              <option value="3">Main gate</option>
              <option value="4">Side door</option>
            </select></form></body></html>"#,
        )
    }

    #[test]
    fn submits_form_with_derived_fields() {
        let transport = FakeTransport::new()
            .on_get(FORM_PAGE, vec![form_page()])
            .on_post(SUBMIT, vec![Reply::ok("saved")]);
        let api = api_with(transport);

        api.add_user(&User::new("TestUser", "1234567890", "Main gate")).unwrap();

        let requests = api.transport().requests.borrow();
        let post = requests.iter().rev().find(|r| r.method == Method::Post).unwrap();
        assert_eq!(post.url, SUBMIT);
        let value = |name: &str| {
            post.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(value(CSRF_FIELD), Some("tok123"));
        assert_eq!(value("GatesconfigDeviceUsersdatabase[phone]"), Some("1234567890"));
        assert_eq!(value("GatesconfigDeviceUsersdatabase[user_name]"), Some("TestUser"));
        assert_eq!(value("GatesconfigDeviceUsersdatabase[app]"), Some("1"));
        assert_eq!(value("GatesconfigDeviceUsersdatabase[app_password]"), Some("1234"));
        assert_eq!(value("GatesconfigDeviceUsersdatabase[output]"), Some("3"));
        assert_eq!(post.options.referer.as_deref(), Some("https://gates.eldesalarms.com/gatesconfig/settings/configuration/device_id/1"));
    }

    #[test]
    fn unknown_output_fails_without_submitting() {
        let transport = FakeTransport::new()
            .on_get(FORM_PAGE, vec![form_page()])
            .on_post(SUBMIT, vec![Reply::ok("saved")]);
        let api = api_with(transport);

        let err = api.add_user(&User::new("TestUser", "1234567890", "Garage")).unwrap_err();
        match err {
            PortalError::InvalidOutput { output, valid } => {
                assert_eq!(output, "Garage");
                assert_eq!(valid, vec!["Select", "Main gate", "Side door"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(api.transport().count(Method::Post, SUBMIT), 0);
    }

    #[test]
    fn non_200_submission_fails() {
        let transport = FakeTransport::new()
            .on_get(FORM_PAGE, vec![form_page()])
            .on_post(SUBMIT, vec![Reply::status(400, "bad request")]);
        let api = api_with(transport);
        assert!(matches!(
            api.add_user(&User::new("TestUser", "1234567890", "Main gate")),
            Err(PortalError::UnexpectedStatus { status: 400, .. })
        ));
    }

    #[test]
    fn batch_keeps_going_past_failures() {
        let transport = FakeTransport::new()
            .on_get(FORM_PAGE, vec![form_page()])
            .on_post(SUBMIT, vec![Reply::ok("saved"), Reply::status(500, "boom"), Reply::ok("saved")]);
        let api = api_with(transport);

        let users = vec![
            User::new("One", "0871111111", "Main gate"),
            User::new("Two", "0872222222", "Side door"),
            User::new("Three", "0873333333", "Nowhere"),
            User::new("Four", "0874444444", "Side door"),
        ];
        let report = api.add_users(&users);

        let added: Vec<&str> = report.added.iter().map(|u| u.name.as_str()).collect();
        let failed: Vec<&str> = report.failed.iter().map(|(u, _)| u.name.as_str()).collect();
        assert_eq!(added, vec!["One", "Four"]);
        assert_eq!(failed, vec!["Two", "Three"]);
        assert_eq!(api.transport().count(Method::Post, SUBMIT), 3);
    }
}
