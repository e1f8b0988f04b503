//! Gateway configuration: connection facts plus cache, rate-limit, and pagination defaults.
//!
//! [`GatewayConfig`] deserializes from any serde source. [`GatewayConfig::from_env`] reads the
//! `GATEWAY_*` environment variables; [`GatewayConfig::from_lookup`] is the same logic over an
//! arbitrary key lookup so it can be exercised without touching the process environment.

pub mod secret;

pub use secret::*;

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*, cache::CacheSettings, error::ConfigError, pager::PagerSettings,
	rate_limit::{BucketConfig, RateLimitSettings},
};

/// Environment variable holding the remote base address.
pub const ENV_BASE_URL: &str = "GATEWAY_BASE_URL";
/// Environment variable holding the account name.
pub const ENV_USERNAME: &str = "GATEWAY_USERNAME";
/// Environment variable holding the account password.
pub const ENV_PASSWORD: &str = "GATEWAY_PASSWORD";
/// Environment variable selecting the TLS trust mode (`true`, `false`, or a CA bundle path).
pub const ENV_VERIFY_TLS: &str = "GATEWAY_VERIFY_TLS";
/// Environment variable overriding the per-page request timeout in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "GATEWAY_REQUEST_TIMEOUT_SECS";
/// Environment variable toggling the response cache.
pub const ENV_CACHE_ENABLED: &str = "GATEWAY_CACHE_ENABLED";
/// Environment variable overriding the cache TTL in seconds.
pub const ENV_CACHE_TTL_SECS: &str = "GATEWAY_CACHE_TTL_SECS";
/// Environment variable toggling the rate governor.
pub const ENV_RATE_LIMIT_ENABLED: &str = "GATEWAY_RATE_LIMIT_ENABLED";
/// Environment variable overriding the global requests-per-second budget.
pub const ENV_GLOBAL_RATE_LIMIT: &str = "GATEWAY_GLOBAL_RATE_LIMIT";

/// How the transport validates the remote certificate chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
	/// Validate against the platform trust roots.
	#[default]
	Verify,
	/// Accept any certificate. Only for lab deployments.
	Skip,
	/// Validate against an additional PEM bundle.
	CaBundle(PathBuf),
}
impl FromStr for TlsMode {
	type Err = ConfigError;

	/// `true`/`false` (any case) select verification; any other non-empty value is a bundle path.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let raw = s.trim();

		match raw.to_ascii_lowercase().as_str() {
			"" | "true" => Ok(Self::Verify),
			"false" => Ok(Self::Skip),
			_ => Ok(Self::CaBundle(PathBuf::from(raw))),
		}
	}
}

/// Complete gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Remote base address every operation path is appended to.
	pub base_url: Url,
	/// Basic-auth credentials.
	pub credentials: Credentials,
	/// Certificate validation policy.
	#[serde(default)]
	pub tls: TlsMode,
	/// Per-page transport timeout in seconds.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
	/// Response cache defaults.
	#[serde(default)]
	pub cache: CacheSettings,
	/// Rate governor defaults.
	#[serde(default)]
	pub rate_limit: RateLimitSettings,
	/// Pagination defaults.
	#[serde(default)]
	pub pagination: PagerSettings,
}
impl GatewayConfig {
	/// Default per-page timeout.
	pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

	/// Creates a configuration with default policies.
	pub fn new(base_url: Url, credentials: Credentials) -> Self {
		Self {
			base_url,
			credentials,
			tls: TlsMode::default(),
			request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
			cache: CacheSettings::default(),
			rate_limit: RateLimitSettings::default(),
			pagination: PagerSettings::default(),
		}
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`, which maps a setting name to its raw value.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());
		let require =
			|name: &'static str| read(name).ok_or(ConfigError::MissingSetting { name });
		let raw_base = require(ENV_BASE_URL)?;
		let base_url = Url::parse(raw_base.trim()).map_err(|e| ConfigError::InvalidSetting {
			name: ENV_BASE_URL,
			value: raw_base.clone(),
			reason: e.to_string(),
		})?;
		let credentials = Credentials::new(require(ENV_USERNAME)?, require(ENV_PASSWORD)?);
		let mut config = Self::new(base_url, credentials);

		if let Some(raw) = read(ENV_VERIFY_TLS) {
			config.tls = raw.parse()?;
		}
		if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
			config.request_timeout_secs = parse_positive(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
		}
		if let Some(raw) = read(ENV_CACHE_ENABLED) {
			config.cache.enabled = parse_flag(ENV_CACHE_ENABLED, &raw)?;
		}
		if let Some(raw) = read(ENV_CACHE_TTL_SECS) {
			config.cache.ttl_secs = parse_positive(ENV_CACHE_TTL_SECS, &raw)?;
		}
		if let Some(raw) = read(ENV_RATE_LIMIT_ENABLED) {
			config.rate_limit.enabled = parse_flag(ENV_RATE_LIMIT_ENABLED, &raw)?;
		}
		if let Some(raw) = read(ENV_GLOBAL_RATE_LIMIT) {
			let rate = parse_positive(ENV_GLOBAL_RATE_LIMIT, &raw)?;

			config.rate_limit.global =
				BucketConfig::per_second(u32::try_from(rate).unwrap_or(u32::MAX));
		}

		Ok(config)
	}

	/// Sets the TLS mode.
	pub fn with_tls(mut self, tls: TlsMode) -> Self {
		self.tls = tls;

		self
	}

	/// Sets the per-page timeout.
	pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
		self.request_timeout_secs = secs;

		self
	}

	/// Per-page timeout as a duration.
	pub fn request_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.request_timeout_secs)
	}
}

fn default_request_timeout_secs() -> u64 {
	GatewayConfig::DEFAULT_REQUEST_TIMEOUT_SECS
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidSetting {
			name,
			value: raw.to_owned(),
			reason: "expected a boolean".into(),
		}),
	}
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
	match raw.trim().parse::<u64>() {
		Ok(value) if value > 0 => Ok(value),
		Ok(_) => Err(ConfigError::InvalidSetting {
			name,
			value: raw.to_owned(),
			reason: "must be greater than zero".into(),
		}),
		Err(e) => Err(ConfigError::InvalidSetting {
			name,
			value: raw.to_owned(),
			reason: e.to_string(),
		}),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	const REQUIRED: [(&str, &str); 3] = [
		(ENV_BASE_URL, "https://ise.example.com"),
		(ENV_USERNAME, "admin"),
		(ENV_PASSWORD, "secret"),
	];

	#[test]
	fn required_settings_produce_defaults() {
		let config = GatewayConfig::from_lookup(lookup_from(&REQUIRED))
			.expect("Required settings should be sufficient.");

		assert_eq!(config.base_url.as_str(), "https://ise.example.com/");
		assert_eq!(config.credentials.username, "admin");
		assert_eq!(config.credentials.password.expose(), "secret");
		assert_eq!(config.tls, TlsMode::Verify);
		assert_eq!(config.request_timeout(), StdDuration::from_secs(15));
		assert!(config.cache.enabled);
		assert_eq!(config.cache.ttl_secs, 300);
		assert!(config.rate_limit.enabled);
	}

	#[test]
	fn missing_credentials_are_fatal() {
		let err = GatewayConfig::from_lookup(lookup_from(&[
			(ENV_BASE_URL, "https://ise.example.com"),
			(ENV_USERNAME, "admin"),
		]))
		.expect_err("Missing password should fail.");

		assert!(matches!(err, ConfigError::MissingSetting { name } if name == ENV_PASSWORD));

		let err = GatewayConfig::from_lookup(lookup_from(&[(ENV_BASE_URL, "  ")]))
			.expect_err("Blank base URL should count as missing.");

		assert!(matches!(err, ConfigError::MissingSetting { name } if name == ENV_BASE_URL));
	}

	#[test]
	fn optional_settings_override_defaults() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			(ENV_VERIFY_TLS, "/etc/ssl/ise.pem"),
			(ENV_REQUEST_TIMEOUT_SECS, "5"),
			(ENV_CACHE_ENABLED, "false"),
			(ENV_CACHE_TTL_SECS, "60"),
			(ENV_RATE_LIMIT_ENABLED, "off"),
			(ENV_GLOBAL_RATE_LIMIT, "12"),
		]);

		let config = GatewayConfig::from_lookup(lookup_from(&pairs))
			.expect("Override fixture should parse.");

		assert_eq!(config.tls, TlsMode::CaBundle(PathBuf::from("/etc/ssl/ise.pem")));
		assert_eq!(config.request_timeout_secs, 5);
		assert!(!config.cache.enabled);
		assert_eq!(config.cache.ttl_secs, 60);
		assert!(!config.rate_limit.enabled);
		assert_eq!(config.rate_limit.global.capacity, 12);
	}

	#[test]
	fn invalid_values_name_the_setting() {
		let mut pairs = REQUIRED.to_vec();

		pairs.push((ENV_CACHE_TTL_SECS, "forever"));

		let err = GatewayConfig::from_lookup(lookup_from(&pairs))
			.expect_err("Non-numeric TTL should fail.");

		assert!(
			matches!(err, ConfigError::InvalidSetting { name, .. } if name == ENV_CACHE_TTL_SECS)
		);

		let err = GatewayConfig::from_lookup(lookup_from(&[
			(ENV_BASE_URL, "not a url"),
			(ENV_USERNAME, "admin"),
			(ENV_PASSWORD, "secret"),
		]))
		.expect_err("Malformed base URL should fail.");

		assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == ENV_BASE_URL));
	}

	#[test]
	fn tls_mode_parses_flags_and_paths() {
		assert_eq!("TRUE".parse::<TlsMode>().expect("Flag should parse."), TlsMode::Verify);
		assert_eq!("false".parse::<TlsMode>().expect("Flag should parse."), TlsMode::Skip);
		assert_eq!(
			"certs/ca.pem".parse::<TlsMode>().expect("Path should parse."),
			TlsMode::CaBundle(PathBuf::from("certs/ca.pem"))
		);
	}

	#[test]
	fn config_deserializes_with_section_defaults() {
		let config: GatewayConfig = serde_json::from_value(serde_json::json!({
			"base_url": "https://ise.example.com",
			"credentials": { "username": "admin", "password": "secret" },
			"tls": { "ca_bundle": "/etc/ssl/ise.pem" },
			"cache": { "ttl_secs": 30 }
		}))
		.expect("Config JSON should deserialize.");

		assert_eq!(config.tls, TlsMode::CaBundle(PathBuf::from("/etc/ssl/ise.pem")));
		assert_eq!(config.cache.ttl_secs, 30);
		assert!(config.cache.enabled);
		assert_eq!(config.request_timeout_secs, GatewayConfig::DEFAULT_REQUEST_TIMEOUT_SECS);
		assert_eq!(config.pagination.default_page_size, 100);
	}
}
