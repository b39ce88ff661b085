use crate::error::PortalError;
use crate::models::{LogEntry, User};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

pub const STDIO: &str = "-";

const USER_HEADER: [&str; 5] = ["name", "phone", "output", "app_access", "password"];
const LOG_HEADER: [&str; 4] = ["when", "who", "phone", "apt_no"];
const LOG_EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Open `path` for reading, `-` meaning stdin. The file must already exist.
pub fn open_input(path: &str) -> Result<Box<dyn Read>> {
    if path == STDIO {
        return Ok(Box::new(io::stdin()));
    }
    if !Path::new(path).is_file() {
        bail!("File {} does not exist or is not accessible.", path);
    }
    let file = File::open(path).context(format!("Error opening file {}", path))?;
    Ok(Box::new(file))
}

/// Open `path` for writing, `-` meaning stdout. Existing files are never overwritten.
pub fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == STDIO {
        return Ok(Box::new(io::stdout()));
    }
    if Path::new(path).exists() {
        bail!("File {} already exists, refusing to overwrite it.", path);
    }
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .context(format!("Error opening file {}", path))?;
    Ok(Box::new(file))
}

#[derive(Debug, Deserialize)]
struct UserRow {
    name: String,
    phone: String,
    output: String,
    // The password column is ignored; it is always derived from the phone.
    app_access: String,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Write users as CSV, stopping at the first scraping error. Returns the
/// number of users written.
pub fn write_users<W, I>(writer: W, users: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = std::result::Result<User, PortalError>>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(USER_HEADER)?;

    let mut count = 0;
    for user in users {
        let user = user.context("Failed to read users from the portal")?;
        writer.write_record([
            user.name.as_str(),
            user.phone.as_str(),
            user.output.as_str(),
            if user.app_access { "true" } else { "false" },
            user.app_password().as_str(),
        ])?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

pub fn read_users<R: Read>(reader: R) -> Result<Vec<User>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut users = Vec::new();

    for (index, result) in reader.deserialize::<UserRow>().enumerate() {
        let row = result.context(format!("Failed to parse user record {}", index + 1))?;
        let app_access = match parse_bool(&row.app_access) {
            Some(value) => value,
            None => bail!(
                "Invalid app_access '{}' for user {}, expected true or false",
                row.app_access,
                row.name
            ),
        };
        users.push(User {
            name: row.name,
            phone: row.phone,
            output: row.output,
            app_access,
        });
    }

    Ok(users)
}

pub fn write_logs<W: Write>(writer: W, entries: &[LogEntry]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(LOG_HEADER)?;

    for entry in entries {
        writer.write_record([
            entry.when.format(LOG_EXPORT_FORMAT).to_string(),
            entry.who.clone().unwrap_or_default(),
            entry.phone.clone().unwrap_or_default(),
            entry.apt_no.map(|n| n.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
