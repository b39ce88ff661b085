use anyhow::{Context, Result};
use clap::Parser;
use gatecontrol::cli::{Action, Args};
use gatecontrol::transport::Transport;
use gatecontrol::tui::{ConsoleReport, SyncProgress};
use gatecontrol::{logging, utils, Credentials, DeviceApi, Session};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);
    let action = args.action().unwrap_or_else(|e| e.exit());

    let credentials = Credentials::new(&args.username, &args.password);
    let session = Session::connect(args.portal_config(), credentials)?;
    let mut api = DeviceApi::new(session, args.device)
        .context("Unable to login to Eldes Alarms. Please check your credentials")?;

    let outcome = run_action(&api, action);
    let logout = api.session_mut().logout();
    outcome?;
    logout.context("Error occurred while logging out")?;
    Ok(())
}

fn run_action<T: Transport>(api: &DeviceApi<T>, action: Action) -> Result<()> {
    match action {
        Action::Download(file) => {
            ConsoleReport::heading("Downloading Users")?;
            let output = utils::open_output(&file)?;
            let count = utils::write_users(output, api.users())?;
            ConsoleReport::done(&format!("Downloaded {} Users", count))?;
        }
        Action::Upload { file, sync } => {
            ConsoleReport::heading("Uploading Users")?;
            let users = utils::read_users(utils::open_input(&file)?)?;
            let report = api.add_users(&users);

            for user in &report.added {
                ConsoleReport::added(user)?;
            }
            for (user, reason) in &report.failed {
                ConsoleReport::failed(user, reason)?;
            }
            ConsoleReport::done(&format!("Added {} of {} Users", report.added.len(), users.len()))?;

            if sync {
                if report.added.is_empty() {
                    ConsoleReport::warning("No users were added, skipping synchronization")?;
                } else {
                    synchronize(api)?;
                }
            }
        }
        Action::Logs { file, start, end } => {
            ConsoleReport::heading(&format!("Downloading logs from {} to {}", start, end))?;
            let entries = api.get_logs(start, end)?;
            utils::write_logs(utils::open_output(&file)?, &entries)?;
            ConsoleReport::done(&format!("Downloaded {} log entries", entries.len()))?;
        }
        Action::Sync => synchronize(api)?,
        Action::LoginOnly => {
            ConsoleReport::done(&format!("Logged in as {}", api.session().username()))?;
        }
    }
    Ok(())
}

fn synchronize<T: Transport>(api: &DeviceApi<T>) -> Result<()> {
    let progress = SyncProgress::new();
    match api.synchronize_with(|state| progress.update(state)) {
        Ok(()) => {
            ConsoleReport::done("Synchronization complete")?;
            Ok(())
        }
        Err(e) if e.is_timeout() => {
            ConsoleReport::warning(&e.to_string())?;
            Err(e.into())
        }
        Err(e) => Err(e).context("Error occurred while synchronizing"),
    }
}
