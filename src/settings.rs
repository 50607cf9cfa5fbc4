use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, Environment, File};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_with::{serde_as, CommaSeparator, DurationSecondsWithFrac, PickFirst, StringWithSeparator};
use thiserror::Error;
use url::Url;

use crate::{alert::Status, log::LogSettings};

/// name of the subcommand that generates and sends alerts
pub const SEND_ALERTS: &str = "send-alerts";

pub const DEFAULT_URL: &str = "http://localhost:9093/api/v2/alerts";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// prefix of environment variables overriding config file values
const ENV_PREFIX: &str = "ALERT_SENDER";

/// Everything needed for one invocation. Built once from defaults, the
/// optional config file, the environment and the command line, then only
/// passed around by reference.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub num: usize,
    pub static_labels: IndexMap<String, String>,
    /// a list in config files, comma separated in the environment
    #[serde_as(as = "PickFirst<(_, StringWithSeparator<CommaSeparator, String>)>")]
    pub vary_labels: Vec<String>,
    pub status: Status,
    pub annotations: IndexMap<String, String>,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let url = Url::parse(DEFAULT_URL).expect("default url is valid");

        Self {
            url,
            headers: IndexMap::new(),
            num: 1,
            static_labels: IndexMap::new(),
            vary_labels: Vec::new(),
            status: Status::default(),
            annotations: IndexMap::new(),
            timeout: DEFAULT_TIMEOUT,
            log: LogSettings::default(),
        }
    }
}

/// A `KEY=VALUE` entry of a map flag could not be split
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyValueError {
    #[error("expected KEY=VALUE, got {0:?}")]
    MissingSeparator(String),
    #[error("empty key in {0:?}")]
    EmptyKey(String),
}

/// Splits `entry` at the first `=`, the value may contain further `=`.
pub fn parse_key_value(entry: &str) -> Result<(String, String), KeyValueError> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| KeyValueError::MissingSeparator(entry.to_string()))?;

    if key.is_empty() {
        return Err(KeyValueError::EmptyKey(entry.to_string()));
    }

    Ok((key.to_string(), value.to_string()))
}

/// a repeatable `KEY=VALUE` flag, several entries may be joined with `;`
fn key_value_arg(name: &'static str, help: &'static str) -> Arg<'static> {
    Arg::new(name)
        .help(help)
        .long(name)
        .value_name("KEY=VALUE")
        .takes_value(true)
        .multiple_occurrences(true)
        .use_value_delimiter(true)
        .value_delimiter(';')
        .validator(parse_key_value)
}

/// the command line interface
pub fn command() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .author(clap::crate_authors!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args([
            Arg::new("config")
                .help("path of config file")
                .takes_value(true)
                .short('c')
                .long("config")
                .global(true),
            Arg::new("level")
                .help("log level")
                .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                .ignore_case(true)
                .takes_value(true)
                .long("log")
                .global(true),
        ])
        .subcommand(
            Command::new(SEND_ALERTS)
                .alias("send-alert")
                .about("Send test alerts")
                .args([
                    Arg::new("url")
                        .help("the alertmanager endpoint to post the alerts to")
                        .long("url")
                        .value_name("URL")
                        .takes_value(true),
                    key_value_arg("headers", "extra http headers to send"),
                    Arg::new("num")
                        .help("the number of alerts to send")
                        .long("num")
                        .takes_value(true)
                        .validator(|num| num.parse::<usize>()),
                    key_value_arg("static-labels", "the static labels to set in the alert"),
                    Arg::new("vary-labels")
                        .help("the label names to vary the values of")
                        .long("vary-labels")
                        .value_name("NAME")
                        .takes_value(true)
                        .multiple_occurrences(true)
                        .use_value_delimiter(true)
                        .forbid_empty_values(true),
                    Arg::new("status")
                        .help("the status of the alerts")
                        .long("status")
                        .takes_value(true)
                        .possible_values(Status::NAMES),
                    key_value_arg("annotations", "the annotations to add to the alert"),
                ]),
        )
}

impl Settings {
    /// Loads the settings for a subcommand invocation.
    ///
    /// Precedence from lowest to highest: defaults, config file given with
    /// `--config`, `ALERT_SENDER_*` environment variables, command line.
    ///
    /// # Arguments
    ///
    /// * `matches` - the matches of the subcommand, global arguments are
    ///   propagated into them by clap
    pub fn load(matches: &ArgMatches) -> Result<Self> {
        Self::load_with_env(matches, environment())
    }

    fn load_with_env(matches: &ArgMatches, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(config_path) = matches.value_of("config") {
            builder = builder.add_source(File::with_name(config_path));
        }

        let conf = builder
            .add_source(env)
            .build()
            .context("can't load config")?;

        let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

        settings.apply_args(matches)?;

        Ok(settings)
    }

    /// override values with the ones given on the command line
    fn apply_args(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(level) = matches.value_of("level") {
            self.log.level = level.to_string();
        }

        if let Some(url) = matches.value_of("url") {
            self.url = Url::parse(url).with_context(|| format!("failed to parse URL {:?}", url))?;
        }

        if matches.is_present("num") {
            self.num = matches.value_of_t("num")?;
        }

        if let Some(status) = matches.value_of("status") {
            self.status = status.parse()?;
        }

        if let Some(names) = matches.values_of("vary-labels") {
            self.vary_labels = names.map(String::from).collect();
        }

        merge_key_values(&mut self.headers, matches, "headers")?;
        merge_key_values(&mut self.static_labels, matches, "static-labels")?;
        merge_key_values(&mut self.annotations, matches, "annotations")?;

        Ok(())
    }
}

/// `ALERT_SENDER_NUM=3`, `ALERT_SENDER_STATIC_LABELS__ENV=prod`, ...
///
/// Values stay strings, label values like `007` must not turn into numbers.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// command line entries win over configured entries with the same key
fn merge_key_values(
    map: &mut IndexMap<String, String>,
    matches: &ArgMatches,
    id: &str,
) -> Result<()> {
    for entry in matches.values_of(id).into_iter().flatten() {
        let (key, value) =
            parse_key_value(entry).with_context(|| format!("invalid --{} entry", id))?;
        map.insert(key, value);
    }

    Ok(())
}
