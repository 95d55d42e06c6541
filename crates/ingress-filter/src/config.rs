//! Rate-Limit Config (spec §3, §4.3).
//!
//! Compiles the user-facing YAML schema (`RawConfig`) into an immutable
//! `Config` snapshot: every DN pattern regex-compiled, the RLF URL path
//! precomputed, the network name extracted, and the RP→bucket index
//! built — the same raw→compiled split `config::parse_config` uses for
//! the teacher's `crate::Config`, just via `serde_yaml` directly rather
//! than env-var overlays (this filter has no XDS/env config surface).

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::dnmatch::{self, DomainNameMatcher};
use crate::error::ConfigError;
use ingress_core::strng::Strng;

const DEFAULT_TIMEOUT_MS: u64 = 20;
const DEFAULT_PRIORITY: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Namespace {
	Scp,
	Sepp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyFormat {
	Json,
	PlainText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryAfterMode {
	Disabled,
	Seconds,
	HttpDate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionProfile {
	Pass,
	Reject {
		status: u16,
		title: Strng,
		detail: Option<Strng>,
		cause: Option<Strng>,
		body_format: BodyFormat,
		retry_after_header: RetryAfterMode,
	},
	Drop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketActionPair {
	pub bucket_name: Strng,
	pub over_limit_action: ActionProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
	Network,
	Rp,
}

#[derive(Debug, Clone)]
pub struct RpEntry {
	pub rp_name: Strng,
	pub bucket_action_pair: Option<BucketActionPair>,
}

#[derive(Debug, Clone)]
pub enum Limit {
	Network(BucketActionPair),
	RoamingPartner {
		rp_bucket_action_table: Vec<(Strng, RpEntry)>,
		rp_not_found_action: ActionProfile,
	},
}

#[derive(Debug, Clone)]
pub struct RlfService {
	pub cluster_name: Strng,
	pub timeout: Duration,
	pub service_error_action: ActionProfile,
}

/// The immutable, frozen configuration snapshot. Shared read-only
/// across worker threads via `Arc` (spec §5).
#[derive(Debug, Clone)]
pub struct Config {
	pub namespace: Namespace,
	pub rlf_service: RlfService,
	pub limits: Vec<Limit>,
	pub watermarks: [f64; 32],
	pub dn_to_rp: BTreeMap<Strng, Strng>,
	pub dn_matcher: DomainNameMatcher,
	pub rp_bucket_action: BTreeMap<Strng, BucketActionPair>,
	pub network_name: Option<Strng>,
	pub rlf_path: Strng,
}

impl Config {
	/// Watermark for the given 3GPP message priority (0..31), defaulting
	/// to index 24 for anything out of range — mirrors
	/// [`parse_priority`]'s default.
	pub fn watermark_for_priority(&self, priority: u8) -> f64 {
		self.watermarks[priority.min(31) as usize]
	}
}

/// Parse `3gpp-sbi-message-priority` into a watermark index, defaulting
/// to 24 when the header is absent, non-integer, or out of `0..=31`.
pub fn parse_priority(value: Option<&str>) -> u8 {
	match value.and_then(|v| v.parse::<u32>().ok()) {
		Some(p) if p <= 31 => p as u8,
		_ => DEFAULT_PRIORITY,
	}
}

// ---- Raw (deserializable) schema, per spec.md §6 "Configuration shape" ----

#[derive(Debug, Deserialize)]
pub struct RawConfig {
	pub namespace: Namespace,
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	pub rate_limit_service: RawRlfService,
	pub limits: Vec<RawLimit>,
	pub watermarks: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RawRlfService {
	pub service_cluster_name: String,
	pub service_error_action: RawActionProfile,
}

#[derive(Debug, Deserialize)]
pub struct RawActionProfile {
	#[serde(default)]
	pub action_pass_message: Option<bool>,
	#[serde(default)]
	pub action_drop_message: Option<bool>,
	#[serde(default)]
	pub action_reject_message: Option<RawReject>,
}

#[derive(Debug, Deserialize)]
pub struct RawReject {
	pub status: u16,
	pub title: String,
	#[serde(default)]
	pub detail: Option<String>,
	#[serde(default)]
	pub cause: Option<String>,
	#[serde(default = "default_body_format")]
	pub message_format: BodyFormat,
	#[serde(default = "default_retry_after_mode")]
	pub retry_after_header: RetryAfterMode,
}

fn default_body_format() -> BodyFormat {
	BodyFormat::Json
}

fn default_retry_after_mode() -> RetryAfterMode {
	RetryAfterMode::Disabled
}

#[derive(Debug, Deserialize)]
pub struct RawBucketAction {
	pub bucket_name: String,
	pub over_limit_action: RawActionProfile,
}

#[derive(Debug, Deserialize)]
pub struct RawRpEntry {
	pub rp_name: String,
	#[serde(default)]
	pub bucket_action_pair: Option<RawBucketAction>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawLimit {
	Network {
		bucket_action: RawBucketAction,
	},
	RoamingPartner {
		rp_bucket_action_table: BTreeMap<String, RawRpEntry>,
		rp_not_found_action: RawActionProfile,
	},
}

fn compile_action(raw: RawActionProfile) -> Result<ActionProfile, ConfigError> {
	let set_count = raw.action_pass_message.unwrap_or(false) as u8
		+ raw.action_drop_message.unwrap_or(false) as u8
		+ raw.action_reject_message.is_some() as u8;
	if set_count != 1 {
		return Err(ConfigError::UnknownActionProfile(format!(
			"exactly one of action_pass_message/action_drop_message/action_reject_message must be set, got {set_count}"
		)));
	}
	if raw.action_pass_message.unwrap_or(false) {
		return Ok(ActionProfile::Pass);
	}
	if raw.action_drop_message.unwrap_or(false) {
		return Ok(ActionProfile::Drop);
	}
	let reject = raw.action_reject_message.expect("checked above");
	Ok(ActionProfile::Reject {
		status: reject.status,
		title: Strng::from(reject.title),
		detail: reject.detail.map(Strng::from),
		cause: reject.cause.map(Strng::from),
		body_format: reject.message_format,
		retry_after_header: reject.retry_after_header,
	})
}

fn compile_bucket_action(raw: RawBucketAction) -> Result<BucketActionPair, ConfigError> {
	Ok(BucketActionPair {
		bucket_name: Strng::from(raw.bucket_name),
		over_limit_action: compile_action(raw.over_limit_action)?,
	})
}

/// Compile a [`RawConfig`] into a frozen [`Config`], validating the
/// invariants from spec.md §3: exactly 32 watermarks, every DN pattern
/// compiles, and a network bucket name (if present) contains `=`.
pub fn compile(raw: RawConfig) -> Result<Config, ConfigError> {
	if raw.watermarks.len() != 32 {
		return Err(ConfigError::WatermarkTableWrongSize(raw.watermarks.len()));
	}
	let mut watermarks = [0.0f64; 32];
	watermarks.copy_from_slice(&raw.watermarks);

	let namespace = raw.namespace;
	let rlf_path = Strng::from(format!(
		"/nrlf-ratelimiting/v0/tokens/{}",
		match namespace {
			Namespace::Scp => "scp",
			Namespace::Sepp => "sepp",
		}
	));

	let rlf_service = RlfService {
		cluster_name: Strng::from(raw.rate_limit_service.service_cluster_name),
		timeout: Duration::from_millis(raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
		service_error_action: compile_action(raw.rate_limit_service.service_error_action)?,
	};

	let mut limits = Vec::with_capacity(raw.limits.len());
	let mut dn_to_rp = BTreeMap::new();
	let mut dn_regex_entries: Vec<(Strng, Regex, Strng)> = Vec::new();
	let mut rp_bucket_action = BTreeMap::new();
	let mut network_name = None;

	for raw_limit in raw.limits {
		match raw_limit {
			RawLimit::Network { bucket_action } => {
				let pair = compile_bucket_action(bucket_action)?;
				let eq_pos = pair
					.bucket_name
					.rfind('=')
					.ok_or_else(|| ConfigError::NetworkBucketNameMissingEquals(pair.bucket_name.to_string()))?;
				network_name = Some(Strng::from(&pair.bucket_name[eq_pos + 1..]));
				limits.push(Limit::Network(pair));
			},
			RawLimit::RoamingPartner {
				rp_bucket_action_table,
				rp_not_found_action,
			} => {
				let mut table = Vec::with_capacity(rp_bucket_action_table.len());
				for (pattern, raw_entry) in rp_bucket_action_table {
					let pattern = Strng::from(pattern);
					let rp_name = Strng::from(raw_entry.rp_name);
					let regex = dnmatch::compile_pattern(&pattern)?;
					dn_regex_entries.push((pattern.clone(), regex, rp_name.clone()));
					dn_to_rp.insert(pattern.clone(), rp_name.clone());
					let bucket_action_pair = raw_entry.bucket_action_pair.map(compile_bucket_action).transpose()?;
					if let Some(pair) = &bucket_action_pair {
						rp_bucket_action.insert(rp_name.clone(), pair.clone());
					}
					table.push((pattern, RpEntry { rp_name, bucket_action_pair }));
				}
				limits.push(Limit::RoamingPartner {
					rp_bucket_action_table: table,
					rp_not_found_action: compile_action(rp_not_found_action)?,
				});
			},
		}
	}

	Ok(Config {
		namespace,
		rlf_service,
		limits,
		watermarks,
		dn_to_rp,
		dn_matcher: DomainNameMatcher::new(dn_regex_entries),
		rp_bucket_action,
		network_name,
		rlf_path,
	})
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	fn sample_yaml() -> &'static str {
		r#"
namespace: SEPP
rate_limit_service:
  service_cluster_name: eric-sc-rlf
  service_error_action:
    action_pass_message: true
limits:
  - kind: network
    bucket_action:
      bucket_name: ingress_net=n1
      over_limit_action:
        action_drop_message: true
  - kind: roaming_partner
    rp_bucket_action_table:
      "*.operator-a.example.com":
        rp_name: operator-a
        bucket_action_pair:
          bucket_name: rp_operator_a
          over_limit_action:
            action_reject_message:
              status: 429
              title: Too Many Requests
              retry_after_header: SECONDS
    rp_not_found_action:
      action_pass_message: true
watermarks: [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7, 1.8, 1.9, 2.0, 2.1, 2.2, 2.3, 2.4, 2.5, 2.6, 2.7, 2.8, 2.9, 3.0, 3.1]
"#
	}

	#[test]
	fn compiles_a_well_formed_config() {
		let raw: RawConfig = serde_yaml::from_str(sample_yaml()).unwrap();
		let cfg = compile(raw).unwrap();
		assert_eq!(cfg.network_name.as_deref(), Some("n1"));
		assert_eq!(cfg.rlf_path.as_str(), "/nrlf-ratelimiting/v0/tokens/sepp");
		assert_eq!(cfg.rp_bucket_action.len(), 1);
		assert!(cfg.rp_bucket_action.contains_key("operator-a"));
	}

	#[test]
	fn rejects_wrong_watermark_count() {
		let mut raw: RawConfig = serde_yaml::from_str(sample_yaml()).unwrap();
		raw.watermarks.pop();
		assert_matches!(compile(raw), Err(ConfigError::WatermarkTableWrongSize(31)));
	}

	#[test]
	fn rejects_network_bucket_name_without_equals() {
		let mut raw: RawConfig = serde_yaml::from_str(sample_yaml()).unwrap();
		if let RawLimit::Network { bucket_action } = &mut raw.limits[0] {
			bucket_action.bucket_name = "no-equals-sign".to_string();
		}
		assert!(compile(raw).is_err());
	}

	#[test]
	fn default_timeout_and_priority() {
		let raw: RawConfig = serde_yaml::from_str(sample_yaml()).unwrap();
		let cfg = compile(raw).unwrap();
		assert_eq!(cfg.rlf_service.timeout, Duration::from_millis(20));
		assert_eq!(parse_priority(None), 24);
		assert_eq!(parse_priority(Some("not-a-number")), 24);
		assert_eq!(parse_priority(Some("5")), 5);
		assert_eq!(parse_priority(Some("99")), 24);
	}
}
