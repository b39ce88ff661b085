use crate::config::{PortalConfig, DEFAULT_BASE_URL};
use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, CommandFactory, Parser};
use std::time::Duration;

pub const CLI_DATE_FORMAT: &str = "%Y%m%d";

#[derive(Parser, Debug)]
#[command(author, version, about = "gates.eldesalarms.com data management utility")]
#[command(group(ArgGroup::new("action").args(["download", "upload", "logs", "sync"])))]
pub struct Args {
    /// Username of the account used to log into the portal
    pub username: String,

    /// Password of the account used to log into the portal
    pub password: String,

    /// ID of the device to perform the operations on
    pub device: u64,

    /// Download all user details to FILE. Use "-" for stdout
    #[arg(long, value_name = "FILE")]
    pub download: Option<String>,

    /// Upload user details from FILE. Use "-" for stdin
    #[arg(long, value_name = "FILE")]
    pub upload: Option<String>,

    /// Don't synchronize the device after uploading
    #[arg(long, requires = "upload", conflicts_with_all = ["download", "logs", "sync"])]
    pub nosync: bool,

    /// Download log entries between START and END (inclusive, YYYYMMDD) to FILE. Use "-" for stdout
    #[arg(long, num_args = 3, value_names = ["FILE", "START", "END"])]
    pub logs: Option<Vec<String>>,

    /// Synchronize data to the device
    #[arg(long)]
    pub sync: bool,

    /// Increase verbosity. Can be specified multiple times
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Base URL of the portal
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub portal_url: String,

    /// Seconds between sync progress checks
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Seconds to wait for a sync before giving up
    #[arg(long, default_value_t = 180)]
    pub sync_timeout: u64,

    /// Seconds before a single portal request times out
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Download(String),
    Upload { file: String, sync: bool },
    Logs { file: String, start: NaiveDate, end: NaiveDate },
    Sync,
    /// Only check that the credentials work.
    LoginOnly,
}

fn parse_date(value: &str, which: &str) -> Result<NaiveDate, clap::Error> {
    NaiveDate::parse_from_str(value, CLI_DATE_FORMAT).map_err(|_| {
        Args::command().error(
            ErrorKind::ValueValidation,
            format!("Unable to parse {} date '{}'. Format should be YYYYMMDD.", which, value),
        )
    })
}

impl Args {
    pub fn action(&self) -> Result<Action, clap::Error> {
        if let Some(file) = &self.download {
            return Ok(Action::Download(file.clone()));
        }
        if let Some(file) = &self.upload {
            return Ok(Action::Upload {
                file: file.clone(),
                sync: !self.nosync,
            });
        }
        if let Some(values) = &self.logs {
            let [file, start, end] = values.as_slice() else {
                return Err(Args::command().error(
                    ErrorKind::WrongNumberOfValues,
                    "--logs takes FILE START END",
                ));
            };
            return Ok(Action::Logs {
                file: file.clone(),
                start: parse_date(start, "start")?,
                end: parse_date(end, "end")?,
            });
        }
        if self.sync {
            return Ok(Action::Sync);
        }
        Ok(Action::LoginOnly)
    }

    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig {
            base_url: self.portal_url.clone(),
            poll_interval: Duration::from_secs(self.poll_interval),
            sync_timeout: Duration::from_secs(self.sync_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["gatecontrol", "user", "pass", "50550"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn upload_syncs_unless_nosync() {
        let args = parse(&["--upload", "users.csv"]).unwrap();
        assert_eq!(
            args.action().unwrap(),
            Action::Upload {
                file: "users.csv".to_string(),
                sync: true
            }
        );

        let args = parse(&["--upload", "-", "--nosync"]).unwrap();
        assert_eq!(
            args.action().unwrap(),
            Action::Upload {
                file: "-".to_string(),
                sync: false
            }
        );
    }

    #[test]
    fn nosync_requires_upload() {
        assert!(parse(&["--nosync"]).is_err());
        assert!(parse(&["--download", "out.csv", "--nosync"]).is_err());
        assert!(parse(&["--sync", "--nosync"]).is_err());
        assert!(parse(&["--logs", "-", "20230901", "20230930", "--nosync"]).is_err());
    }

    #[test]
    fn actions_are_mutually_exclusive() {
        assert!(parse(&["--download", "out.csv", "--sync"]).is_err());
        assert!(parse(&["--upload", "in.csv", "--logs", "-", "20230901", "20230930"]).is_err());
    }

    #[test]
    fn logs_dates_are_compact_iso() {
        let args = parse(&["--logs", "-", "20230901", "20230930", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(
            args.action().unwrap(),
            Action::Logs {
                file: "-".to_string(),
                start: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
            }
        );

        let args = parse(&["--logs", "-", "2023-09-01", "20230930"]).unwrap();
        assert!(args.action().is_err());
    }

    #[test]
    fn config_follows_flags() {
        let args = parse(&["--sync", "--portal-url", "http://localhost:8080", "--sync-timeout", "60"]).unwrap();
        assert_eq!(args.action().unwrap(), Action::Sync);
        let config = args.portal_config();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.sync_timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn no_action_only_logs_in() {
        assert_eq!(parse(&[]).unwrap().action().unwrap(), Action::LoginOnly);
    }
}
