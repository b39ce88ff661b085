use crate::device::DeviceApi;
use crate::error::{PortalError, Result};
use crate::models::LogEntry;
use crate::parser;
use crate::transport::Transport;
use chrono::NaiveDate;
use tracing::{debug, info};

impl<T: Transport> DeviceApi<T> {
    /// Gate log entries between `start` and `end`, both inclusive.
    pub fn get_logs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<LogEntry>> {
        self.require_login()?;
        if start > end {
            return Err(PortalError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        info!("Getting gate logs from {} to {} inclusive.", start, end);

        let options = self.ajax_options();
        let request_url = self.config().log_file_url(self.device_id(), start, end);
        let page = self.fetch(&request_url, &options)?;

        let download_url = self.config().resolve(&parser::download_link(&page.body)?);
        debug!(url = %download_url, "downloading log file");
        let log = self.fetch(&download_url, &options)?;

        parse_log_text(&log.body)
    }
}

pub fn parse_log_text(text: &str) -> Result<Vec<LogEntry>> {
    parser::join_wrapped_lines(text)?
        .iter()
        .map(|line| parser::parse_log_line(line))
        .collect()
}
