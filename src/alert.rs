//! data structures for the synthetic alerts we send
use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::Settings;

/// how long a resolved alert was firing before it got resolved
pub const RESOLVED_ALERT_DURATION: i64 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// lifecycle state of the generated alerts, decides which timestamps are set
pub enum Status {
	#[default]
	Firing,
	Resolved,
}

impl Status {
	/// all accepted names, in the order they are listed in `--help`
	pub const NAMES: [&'static str; 2] = ["firing", "resolved"];

	/// `startsAt` and `endsAt` of an alert created at `now`
	pub fn timestamps(self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
		match self {
			Status::Firing => (Some(now), None),
			Status::Resolved => (Some(now - Duration::seconds(RESOLVED_ALERT_DURATION)), Some(now)),
		}
	}
}

/// the status string was neither `firing` nor `resolved`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown alert status {0:?}, expected one of: firing, resolved")]
pub struct UnknownStatus(String);

impl FromStr for Status {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"firing" => Ok(Status::Firing),
			"resolved" => Ok(Status::Resolved),
			other => Err(UnknownStatus(other.to_string())),
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Status::Firing => f.write_str("firing"),
			Status::Resolved => f.write_str("resolved"),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// a single alert as understood by the alertmanager `POST /api/v2/alerts`
/// endpoint
pub struct Alert {
	#[serde(default, skip_serializing_if = "Option::is_none", with = "rfc3339_seconds")]
	pub starts_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none", with = "rfc3339_seconds")]
	pub ends_at: Option<DateTime<Utc>>,
	pub annotations: IndexMap<String, String>,
	pub labels: IndexMap<String, String>,
}

/// Builds `settings.num` alerts.
///
/// Every alert carries the static labels and the annotations of `settings`.
/// Each label named in `settings.vary_labels` is set to `label-{i}` for the
/// `i`th alert, replacing a static label of the same name.
///
/// # Arguments
///
/// * `settings` - what to generate
///
/// * `now` - the point in time the alerts are created at
pub fn generate(settings: &Settings, now: DateTime<Utc>) -> Vec<Alert> {
	let (starts_at, ends_at) = settings.status.timestamps(now);

	(0..settings.num)
		.map(|i| {
			let mut labels = settings.static_labels.clone();
			for name in settings.vary_labels.iter() {
				labels.insert(name.clone(), format!("label-{}", i));
			}

			Alert { starts_at, ends_at, annotations: settings.annotations.clone(), labels }
		})
		.collect()
}

/// RFC3339 timestamps in UTC with second precision, e.g. `2022-05-30T12:00:00Z`
mod rfc3339_seconds {
	use chrono::{DateTime, SecondsFormat, Utc};
	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match ts {
			Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<String>::deserialize(deserializer)? {
			Some(ts) if !ts.is_empty() => DateTime::parse_from_rfc3339(&ts)
				.map(|ts| Some(ts.with_timezone(&Utc)))
				.map_err(D::Error::custom),
			_ => Ok(None),
		}
	}
}
