use clap::ArgMatches;
use log::error;
use std::path::PathBuf;
use zerodce::logging::{self, LogConfig, LogFormat};
use zerodce::{cli, commands};

fn main() {
	let app_m = cli::build_cli();

	let guard = match build_log_config(&app_m).map(logging::init_logging) {
		Ok(Ok(guard)) => guard,
		Ok(Err(e)) => {
			eprintln!("Could not initialise logging: {}", e);
			None
		}
		Err(e) => {
			eprintln!("Error: {}", e);
			std::process::exit(1);
		}
	};

	let result = match app_m.subcommand() {
		("evaluate", Some(sub_m)) => commands::evaluate(sub_m),
		("enhance", Some(sub_m)) => commands::enhance(sub_m),
		("generate-config", Some(sub_m)) => commands::generate_config(sub_m),
		_ => commands::train(&app_m),
	};

	if let Err(err) = result {
		error!("Error: {}", err);
		drop(guard);
		std::process::exit(1);
	}
}

/// Logging flags are global, so they may sit on the subcommand.
fn global_value<'a>(app_m: &'a ArgMatches<'static>, name: &str) -> Option<&'a str> {
	app_m
		.value_of(name)
		.or_else(|| app_m.subcommand().1.and_then(|sub| sub.value_of(name)))
}

fn build_log_config(app_m: &ArgMatches<'static>) -> zerodce::error::Result<LogConfig> {
	let mut config = LogConfig::default();
	if let Some(level) = global_value(app_m, "LOG_LEVEL") {
		config.level = logging::parse_level(level)?;
	}
	if let Some(format) = global_value(app_m, "LOG_FORMAT") {
		config.format = LogFormat::from_str(format)?;
	}
	config.log_directory = global_value(app_m, "LOG_FILE").map(PathBuf::from);
	Ok(config)
}
