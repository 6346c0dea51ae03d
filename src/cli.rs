//! CLI arguments for send-sysinfo-influx.
//!
//! Every setting that can also come from a config file is an `Option` (or a
//! switch that can only turn something on), so [`crate::config::resolve_config`]
//! can tell "not given" apart from an explicit value.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "send-sysinfo-influx",
    about = "Collect host and container stats and send them to InfluxDB",
    long_about = "Collect host and container stats and send them to InfluxDB.\n\n\
                  Samples load, CPU, memory, swap, disk and network I/O, fan speeds \
                  and optionally docker container usage, turns cumulative counters into \
                  per-interval deltas and writes one batch per tick.",
    version
)]
pub struct Args {
    /// Log progress and print every batch as JSON
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log debug output
    #[arg(long)]
    pub debug: bool,

    /// Print nothing, not even errors
    #[arg(long, conflicts_with_all = ["verbose", "debug"])]
    pub silent: bool,

    /// Collect but do not send
    #[arg(short = 'n', long)]
    pub no_send: bool,

    /// InfluxDB host
    #[arg(long)]
    pub host: Option<String>,

    /// InfluxDB port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Connect over HTTPS
    #[arg(short = 's', long)]
    pub ssl: bool,

    /// Do not verify the server certificate
    #[arg(long)]
    pub insecure: bool,

    /// Destination database
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// Create the database on the first send
    #[arg(long)]
    pub create_database: bool,

    /// InfluxDB user
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// InfluxDB password
    #[arg(long, conflicts_with = "ask_password")]
    pub password: Option<String>,

    /// Prompt for the password
    #[arg(short = 'a', long)]
    pub ask_password: bool,

    /// Tags added to every point, as a JSON object (replaces the default hostname tag)
    #[arg(short = 'e', long, value_name = "JSON")]
    pub extra_tags: Option<String>,

    /// Repeat every SECONDS instead of sending once
    #[arg(short = 'l', long = "loop", value_name = "SECONDS")]
    pub loop_seconds: Option<f64>,

    /// Keep looping after a failed tick, pausing 10 seconds
    #[arg(long)]
    pub ignore_errors: bool,

    /// Stop after N ticks
    #[arg(long, value_name = "N")]
    pub count: Option<u64>,

    /// Include docker container stats
    #[arg(long)]
    pub docker: bool,

    /// Include docker container stats plus container state tags (one inspect call per container)
    #[arg(long)]
    pub docker_extra: bool,

    /// Path to the docker binary
    #[arg(long)]
    pub docker_binary: Option<PathBuf>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_loop_flags() {
        let args = Args::try_parse_from([
            "send-sysinfo-influx",
            "-l",
            "5",
            "--ignore-errors",
            "-d",
            "metrics",
            "--docker-extra",
        ])
        .unwrap();
        assert_eq!(args.loop_seconds, Some(5.0));
        assert!(args.ignore_errors);
        assert_eq!(args.database.as_deref(), Some("metrics"));
        assert!(args.docker_extra);
        assert!(!args.docker);
    }

    #[test]
    fn test_password_conflicts_with_prompt() {
        let result = Args::try_parse_from([
            "send-sysinfo-influx",
            "--password",
            "secret",
            "--ask-password",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_silent_conflicts_with_verbose_and_debug() {
        assert!(Args::try_parse_from(["send-sysinfo-influx", "--silent", "-v"]).is_err());
        assert!(Args::try_parse_from(["send-sysinfo-influx", "--silent", "--debug"]).is_err());
        assert!(Args::try_parse_from(["send-sysinfo-influx", "--verbose", "--debug"]).is_ok());
    }
}
