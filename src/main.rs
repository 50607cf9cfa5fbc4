//! sends synthetic alerts to a prometheus alertmanager (or anything speaking
//! its `POST /api/v2/alerts` api) to test receivers, routing and templates
//!
//! Features:
//! - any number of alerts per invocation, firing or resolved
//! - static labels shared by all alerts and labels varied per alert
//! - extra http headers, e.g. for authentication or multi tenancy
//! - defaults from an optional config file

use anyhow::{bail, Context, Result};
use settings::Settings;

mod alert;
mod alert_sender;
mod log;
mod settings;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program, every error ends up as a non zero exit
/// status
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let matches = settings::command().get_matches();

	match matches.subcommand() {
		Some((settings::SEND_ALERTS, args)) => {
			let settings = Settings::load(args)
				.context("failed to load config and command line arguments")?;

			log::setup_logging(&settings.log).context("could not setup logging")?;
			// header values may carry credentials, only their names are logged
			tracing::debug!(
				url = %settings.url,
				num = settings.num,
				status = %settings.status,
				headers = ?settings.headers.keys().collect::<Vec<_>>(),
				static_labels = ?settings.static_labels,
				vary_labels = ?settings.vary_labels,
				annotations = ?settings.annotations,
				timeout = ?settings.timeout,
				"settings loaded"
			);

			let mut stdout = std::io::stdout().lock();
			alert_sender::send_alerts(&settings, &mut stdout)
				.await
				.context("failed to send alerts")
		}
		Some((command, _)) => bail!("BUG: unhandled command: {}", command),
		None => bail!("no command given"),
	}
}
