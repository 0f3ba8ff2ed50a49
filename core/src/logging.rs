use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::ParseError, fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// Filter directives used when `RUST_LOG` is not set, e.g. `info` or `forge_core=debug`.
	pub level: String,
	/// Whether log lines carry the source file and line.
	pub with_file: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			with_file: false,
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("invalid log filter '{directives}': {source}")]
pub struct LoggingError {
	directives: String,
	#[source]
	source: ParseError,
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init(config: &LoggingConfig) -> Result<bool, LoggingError> {
	let filter = match EnvFilter::try_from_default_env() {
		Ok(filter) => filter,
		Err(_) => EnvFilter::try_new(&config.level).map_err(|source| LoggingError {
			directives: config.level.clone(),
			source,
		})?,
	};

	Ok(tracing_subscriber::registry()
		.with(filter)
		.with(
			fmt::layer()
				.with_file(config.with_file)
				.with_line_number(config.with_file),
		)
		.try_init()
		.is_ok())
}
