use std::path::PathBuf;
use std::time::Duration;

use clap::{arg, value_parser, ArgMatches, Command};

use crate::coordinator::DEFAULT_ADMISSION_TIMEOUT;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address of the WebSocket endpoint
    pub bind_addr: String,
    /// Address of the line protocol listener, if any
    pub legacy_bind_addr: Option<String>,
    pub admission_timeout: Duration,
    pub snapshot_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            legacy_bind_addr: None,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

pub fn command() -> Command {
    Command::new("whiteboard-server")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .about("Shared whiteboard session server")
        .arg(arg!(--"bind" <addr> "Address of the WebSocket endpoint").default_value("127.0.0.1:8080"))
        .arg(arg!(--"legacy-bind" <addr> "Also serve the line protocol on this address"))
        .arg(
            arg!(--"admission-timeout-secs" <secs> "How long a join waits for the admin")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("60"),
        )
        .arg(arg!(--"snapshot-dir" <dir> "Directory of saved snapshots").default_value("."))
}

impl ServerConfig {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let default = Self::default();
        Self {
            bind_addr: matches
                .get_one::<String>("bind")
                .cloned()
                .unwrap_or(default.bind_addr),
            legacy_bind_addr: matches.get_one::<String>("legacy-bind").cloned(),
            admission_timeout: matches
                .get_one::<u64>("admission-timeout-secs")
                .map_or(default.admission_timeout, |secs| Duration::from_secs(*secs)),
            snapshot_dir: matches
                .get_one::<String>("snapshot-dir")
                .map_or(default.snapshot_dir, PathBuf::from),
        }
    }

    pub fn from_args() -> Self {
        Self::from_matches(&command().get_matches())
    }
}
