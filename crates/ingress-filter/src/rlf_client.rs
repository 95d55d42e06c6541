//! RLF client — outbound HTTP/POST to the external rate-limit decider
//! (spec §4.6.2, §6).
//!
//! Grounded on the teacher's `reqwest`-based outbound calls in `llm/*`
//! (e.g. `llm/anthropic.rs`'s `serde_json::from_slice` response-parsing
//! idiom) rather than `remoteratelimit.rs`'s gRPC client, since spec §6
//! defines the RLF wire protocol as plain HTTP/JSON.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::error::RlfClientError;
use ingress_core::strng::Strng;

/// The fixed `:authority`/Host the decider expects on every request
/// (spec §4.6.2, §6). `RlfClient::new`'s `cluster_authority` argument
/// never changes this — it is a connect-to override, not a Host
/// override; Envoy's own cluster manager keeps the same split between
/// the cluster name that selects an upstream and the `:authority` sent
/// on the wire, and this client mirrors that split.
const RLF_AUTHORITY: &str = "eric-sc-rlf";

#[derive(Debug, Serialize)]
pub struct BucketRequestEntry<'a> {
	pub name: &'a str,
	pub watermark: f64,
	pub amount: u32,
}

/// Build the JSON request body: one object per bucket, in the order
/// the buckets were classified (spec §4.6.2).
pub fn build_body(entries: &[BucketRequestEntry<'_>]) -> Vec<u8> {
	serde_json::to_vec(entries).expect("BucketRequestEntry serialization cannot fail")
}

#[derive(Debug, Clone, Copy)]
pub struct RlfHttpResponse {
	pub status: u16,
	pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedElement {
	/// `None` when the `rc` field was missing or not an integer —
	/// treated as a service-error outcome per spec §4.6.3's
	/// "other / missing / wrong type" row.
	pub rc: Option<i64>,
	pub ra: Option<i64>,
}

/// Parse the RLF response body into one [`ParsedElement`] per bucket,
/// in order. Any parse failure, a non-array top level, or an empty
/// array is reported as an error — the caller (see
/// [`crate::filter`]) treats all three identically: synthesize a
/// `Pass` action and bump `rlf_lookup_failure` (spec §4.6.3).
pub fn parse_response_elements(body: &[u8]) -> Result<Vec<ParsedElement>, RlfClientError> {
	let value: serde_json::Value = serde_json::from_slice(body)?;
	let arr = value.as_array().ok_or(RlfClientError::NotAnArray)?;
	if arr.is_empty() {
		return Err(RlfClientError::EmptyArray);
	}
	Ok(
		arr
			.iter()
			.map(|elem| ParsedElement {
				rc: elem.get("rc").and_then(|v| v.as_i64()),
				ra: elem.get("ra").and_then(|v| v.as_i64()),
			})
			.collect(),
	)
}

/// A thin HTTP/1.1-or-2 client for the single RLF round trip per
/// request. One instance is shared (via `Arc`) across all streams,
/// mirroring the teacher's pooled `reqwest::Client` usage.
#[derive(Debug, Clone)]
pub struct RlfClient {
	http: reqwest::Client,
}

impl RlfClient {
	/// `cluster_authority` is the configured `service_cluster_name` — in
	/// Envoy this only selects the upstream cluster via the cluster
	/// manager, it is never the `:authority` placed on the wire (spec
	/// §4.6.2 hardcodes that to `eric-sc-rlf`). When it parses as a
	/// socket address this pins connections for the `eric-sc-rlf`
	/// authority to that address instead of doing normal DNS resolution
	/// — used by tests to point at a local mock server without changing
	/// what the decider sees as `:authority`. A non-address value (the
	/// common case in production, where `eric-sc-rlf` resolves through
	/// ordinary service discovery) is accepted and simply ignored.
	pub fn new(cluster_authority: Strng) -> Self {
		let mut builder = reqwest::Client::builder();
		if let Ok(addr) = cluster_authority.parse::<SocketAddr>() {
			builder = builder.resolve(RLF_AUTHORITY, addr);
		}
		Self {
			http: builder.build().expect("rlf http client configuration is static and always valid"),
		}
	}

	/// Issue the single POST described in spec §4.6.2. `path` is the
	/// config's precomputed `rlf_path`; the authority is always the
	/// fixed `eric-sc-rlf`, never the configured cluster name.
	pub async fn send(&self, path: &str, body: Vec<u8>, timeout: Duration) -> Result<RlfHttpResponse, RlfClientError> {
		let url = format!("https://{RLF_AUTHORITY}{path}");
		let resp = self
			.http
			.post(url)
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.body(body)
			.timeout(timeout)
			.send()
			.await
			.map_err(|e| if e.is_timeout() { RlfClientError::Timeout } else { RlfClientError::Transport(e) })?;
		let status = resp.status().as_u16();
		let body = resp.bytes().await?;
		Ok(RlfHttpResponse { status, body })
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[test]
	fn builds_json_body_in_order() {
		let entries = vec![
			BucketRequestEntry { name: "net", watermark: 0.5, amount: 1 },
			BucketRequestEntry { name: "rp-a", watermark: 0.9, amount: 1 },
		];
		let body = build_body(&entries);
		let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
		let arr = value.as_array().unwrap();
		assert_eq!(arr.len(), 2);
		assert_eq!(arr[0]["name"], "net");
		assert_eq!(arr[1]["name"], "rp-a");
	}

	#[test]
	fn parses_rc_and_ra() {
		let body = br#"[{"rc":200},{"rc":429,"ra":12345}]"#;
		let parsed = parse_response_elements(body).unwrap();
		assert_eq!(parsed[0], ParsedElement { rc: Some(200), ra: None });
		assert_eq!(parsed[1], ParsedElement { rc: Some(429), ra: Some(12345) });
	}

	#[test]
	fn missing_or_wrong_type_rc_becomes_none() {
		let body = br#"[{"rc":"oops"},{}]"#;
		let parsed = parse_response_elements(body).unwrap();
		assert_eq!(parsed[0].rc, None);
		assert_eq!(parsed[1].rc, None);
	}

	#[test]
	fn rejects_non_array_body() {
		assert_matches!(parse_response_elements(br#"{}"#), Err(RlfClientError::NotAnArray));
	}

	#[test]
	fn rejects_empty_array() {
		assert_matches!(parse_response_elements(br#"[]"#), Err(RlfClientError::EmptyArray));
	}

	#[test]
	fn rejects_malformed_json() {
		assert_matches!(parse_response_elements(b"not json"), Err(RlfClientError::MalformedResponse(_)));
	}
}
