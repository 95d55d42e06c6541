//! Error types for the ingress rate-limit filter, one `thiserror::Error`
//! enum per module boundary, in the style of the proxy crate this one
//! is derived from (`http/filters.rs::Error`, `ratelimit::Error`).

use thiserror::Error;

/// Failures from the [`crate::tfqdn`] codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfqdnError {
	#[error("tfqdn input ends in an escape introducer with no follower byte")]
	TruncatedEscape,
	#[error("tfqdn escape follower byte has no table entry")]
	InvalidEscape,
}

/// Failures compiling a [`crate::config::Config`] from its raw schema.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("watermark table must have exactly 32 entries, got {0}")]
	WatermarkTableWrongSize(usize),
	#[error("action profile {0:?} referenced by a bucket but not defined")]
	UnknownActionProfile(String),
	#[error("invalid domain-name pattern {0:?}: {1}")]
	InvalidDomainPattern(String, #[source] regex::Error),
	#[error("network bucket name {0:?} does not contain '='")]
	NetworkBucketNameMissingEquals(String),
}

/// Failures calling out to the external rate-limit decider.
#[derive(Error, Debug)]
pub enum RlfClientError {
	#[error("rlf request failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("rlf response body was not valid json: {0}")]
	MalformedResponse(#[from] serde_json::Error),
	#[error("rlf response body was not a json array")]
	NotAnArray,
	#[error("rlf response array was empty")]
	EmptyArray,
	#[error("rlf decider did not respond within the configured timeout")]
	Timeout,
}

/// Failures from the routing pre-processor (spec §4.7), which is the
/// only module that needs to surface an error to its caller rather
/// than folding it into a filter action.
#[derive(Error, Debug)]
pub enum FilterError {
	#[error("invalid header value: {0}")]
	InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
	#[error("invalid header name: {0}")]
	InvalidHeaderName(#[from] http::header::InvalidHeaderName),
	#[error("invalid uri component: {0}")]
	InvalidUri(#[from] http::uri::InvalidUri),
	#[error("failed to rebuild request uri after routing rewrite")]
	UriBuildFailed,
}
