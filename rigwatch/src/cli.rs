//! Command-line surface of the rigwatch binary.

use clap::{ArgAction, Args, Parser, Subcommand};

use rigwatch::{ThresholdError, ThresholdKind, Thresholds};

/// Headless dashboard for a device-telemetry registry.
///
/// Polls the registry for every device of the logged-in user, keeps sticky
/// peak values per device and warns when a peak crosses its limit.
#[derive(Parser, Debug)]
#[command(name = "rigwatch", author, version, about)]
pub struct Cli {
    /// Backend base URL, e.g. https://host:7117/api/
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Named backend profile (created on first use with --api-url)
    #[arg(long, short = 'P', global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Overwrite an existing profile without asking
    #[arg(long, global = true)]
    pub save: bool,

    /// Spawn the bundled demo backend and log in as the demo user
    #[arg(long, global = true)]
    pub demo: bool,

    /// Resolve (and save) the profile, print the backend URL and exit
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// One-shot listing of all devices with their current readings
    Devices {
        #[command(flatten)]
        limits: ThresholdArgs,
    },
    AddDevice {
        device_id: String,
    },
    DeleteDevice {
        device_id: String,
    },
    /// Poll the registry and report warnings as peaks cross their limits
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
        #[command(flatten)]
        limits: ThresholdArgs,
    },
    /// Per-device support messages
    #[command(subcommand)]
    Messages(MessagesCommand),
    /// Per-device notes
    #[command(subcommand)]
    Notes(NotesCommand),
}

#[derive(Subcommand, Debug)]
pub enum MessagesCommand {
    /// Devices with their unread counts, unread first
    List,
    /// Print a device's thread and mark it read
    Read { device_id: String },
    Send { device_id: String, text: String },
    /// Delete a device's whole thread
    Clear { device_id: String },
}

#[derive(Subcommand, Debug)]
pub enum NotesCommand {
    Show { device_id: String },
    Save { device_id: String, text: String },
}

/// Limit overrides; anything not given keeps its default.
#[derive(Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    #[arg(long, value_name = "CELSIUS")]
    pub cpu_temp: Option<f64>,
    #[arg(long, value_name = "PERCENT")]
    pub cpu_usage: Option<f64>,
    #[arg(long, value_name = "CELSIUS")]
    pub gpu_temp: Option<f64>,
    #[arg(long, value_name = "PERCENT")]
    pub gpu_usage: Option<f64>,
    #[arg(long, value_name = "PERCENT")]
    pub ram_usage: Option<f64>,
    #[arg(long, value_name = "PERCENT")]
    pub disk_usage: Option<f64>,
}

impl ThresholdArgs {
    pub fn thresholds(&self) -> Result<Thresholds, ThresholdError> {
        let mut t = Thresholds::default();
        let overrides = [
            (ThresholdKind::CpuTemp, self.cpu_temp),
            (ThresholdKind::CpuUsage, self.cpu_usage),
            (ThresholdKind::GpuTemp, self.gpu_temp),
            (ThresholdKind::GpuUsage, self.gpu_usage),
            (ThresholdKind::RamUsage, self.ram_usage),
            (ThresholdKind::DiskUsage, self.disk_usage),
        ];
        for (kind, value) in overrides {
            if let Some(v) = value {
                t.set(kind, v)?;
            }
        }
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rigwatch", "watch", "-i", "5", "--cpu-temp", "70", "-P", "lab", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.profile.as_deref(), Some("lab"));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Watch { interval, limits } => {
                assert_eq!(interval, 5);
                let t = limits.thresholds().unwrap();
                assert_eq!(t.get(ThresholdKind::CpuTemp), 70.0);
                assert_eq!(t.get(ThresholdKind::DiskUsage), 85.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(Cli::try_parse_from(["rigwatch", "watch", "--interval", "0"]).is_err());
    }

    #[test]
    fn out_of_range_limit_is_an_error() {
        let args = ThresholdArgs {
            ram_usage: Some(140.0),
            ..Default::default()
        };
        assert!(matches!(
            args.thresholds(),
            Err(ThresholdError::OutOfRange {
                kind: ThresholdKind::RamUsage,
                ..
            })
        ));
    }

    #[test]
    fn messages_subcommands() {
        let cli = Cli::try_parse_from(["rigwatch", "messages", "send", "dev1", "reboot please"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Messages(MessagesCommand::Send { ref device_id, ref text })
                if device_id == "dev1" && text == "reboot please"
        ));
    }
}
