//! SCP Response Decorator (spec §4.8).
//!
//! On the response path, conditionally attaches a
//! `3gpp-sbi-producer-id` header identifying which NF instance actually
//! served the request. Grounded on the teacher's `http/filters.rs`
//! header-construction style (build a `HeaderValue`, `insert` it).
//!
//! Implements the corrected `status != 307 && status != 308` condition
//! per spec §9's REDESIGN FLAG — the source's `!= "307" || != "308"` is
//! a tautology (always true) and is not reproduced here.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

const HDR_PRODUCER_ID: &str = "3gpp-sbi-producer-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingBehaviour {
	RoundRobin,
	Preferred,
	Strict,
}

/// Everything the decorator needs to know about how this response was
/// produced; assembled by the caller from dynamic/encoder-filter
/// metadata (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct ScpDecoratorInput<'a> {
	pub upstream_is_direct: bool,
	pub routing_behaviour: Option<RoutingBehaviour>,
	pub nf_inst_id: Option<&'a str>,
	pub nf_serv_inst: Option<&'a str>,
	pub nf_set: Option<&'a str>,
	pub nf_service_set: Option<&'a str>,
	/// Only meaningful for `Preferred`: true when the host actually
	/// selected differs from the one originally chosen.
	pub reselected: bool,
}

impl Default for RoutingBehaviour {
	fn default() -> Self {
		RoutingBehaviour::Strict
	}
}

/// Apply the decoration rules to `headers` in place. A no-op whenever
/// any of the preconditions in spec §4.8 aren't met.
pub fn decorate(headers: &mut HeaderMap, status: StatusCode, input: &ScpDecoratorInput<'_>) {
	if !input.upstream_is_direct {
		return;
	}
	if status == StatusCode::TEMPORARY_REDIRECT || status == StatusCode::PERMANENT_REDIRECT {
		return;
	}
	let Some(behaviour) = input.routing_behaviour else {
		return;
	};
	if behaviour == RoutingBehaviour::Strict {
		return;
	}
	let Some(id) = input.nf_inst_id else {
		return;
	};
	let attach = match behaviour {
		RoutingBehaviour::RoundRobin => true,
		RoutingBehaviour::Preferred => input.reselected,
		RoutingBehaviour::Strict => false,
	};
	if !attach {
		return;
	}

	let mut value = format!("nfinst={id}");
	if let Some(x) = input.nf_serv_inst {
		value.push_str(&format!("; nfservinst={x}"));
	}
	if let Some(y) = input.nf_set {
		value.push_str(&format!("; nfset={y}"));
	}
	if let Some(z) = input.nf_service_set {
		value.push_str(&format!("; nfserviceset={z}"));
	}
	if let Ok(hv) = HeaderValue::from_str(&value) {
		headers.insert(HeaderName::from_static(HDR_PRODUCER_ID), hv);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_input() -> ScpDecoratorInput<'static> {
		ScpDecoratorInput {
			upstream_is_direct: true,
			routing_behaviour: Some(RoutingBehaviour::RoundRobin),
			nf_inst_id: Some("inst-1"),
			nf_serv_inst: None,
			nf_set: None,
			nf_service_set: None,
			reselected: false,
		}
	}

	#[test]
	fn round_robin_always_attaches() {
		let mut headers = HeaderMap::new();
		decorate(&mut headers, StatusCode::OK, &base_input());
		assert_eq!(headers.get(HDR_PRODUCER_ID).unwrap(), "nfinst=inst-1");
	}

	#[test]
	fn preferred_attaches_only_on_reselection() {
		let mut headers = HeaderMap::new();
		let mut input = base_input();
		input.routing_behaviour = Some(RoutingBehaviour::Preferred);
		input.reselected = false;
		decorate(&mut headers, StatusCode::OK, &input);
		assert!(!headers.contains_key(HDR_PRODUCER_ID));

		input.reselected = true;
		decorate(&mut headers, StatusCode::OK, &input);
		assert!(headers.contains_key(HDR_PRODUCER_ID));
	}

	#[test]
	fn strict_never_attaches() {
		let mut headers = HeaderMap::new();
		let mut input = base_input();
		input.routing_behaviour = Some(RoutingBehaviour::Strict);
		decorate(&mut headers, StatusCode::OK, &input);
		assert!(!headers.contains_key(HDR_PRODUCER_ID));
	}

	#[test]
	fn redirect_statuses_are_skipped() {
		let mut headers = HeaderMap::new();
		decorate(&mut headers, StatusCode::TEMPORARY_REDIRECT, &base_input());
		assert!(!headers.contains_key(HDR_PRODUCER_ID));
		decorate(&mut headers, StatusCode::PERMANENT_REDIRECT, &base_input());
		assert!(!headers.contains_key(HDR_PRODUCER_ID));
	}

	#[test]
	fn non_direct_upstream_is_skipped() {
		let mut headers = HeaderMap::new();
		let mut input = base_input();
		input.upstream_is_direct = false;
		decorate(&mut headers, StatusCode::OK, &input);
		assert!(!headers.contains_key(HDR_PRODUCER_ID));
	}

	#[test]
	fn missing_nf_inst_id_is_skipped() {
		let mut headers = HeaderMap::new();
		let mut input = base_input();
		input.nf_inst_id = None;
		decorate(&mut headers, StatusCode::OK, &input);
		assert!(!headers.contains_key(HDR_PRODUCER_ID));
	}

	#[test]
	fn full_value_includes_all_optional_segments() {
		let mut headers = HeaderMap::new();
		let mut input = base_input();
		input.nf_serv_inst = Some("servinst-1");
		input.nf_set = Some("set-1");
		input.nf_service_set = Some("svcset-1");
		decorate(&mut headers, StatusCode::OK, &input);
		assert_eq!(
			headers.get(HDR_PRODUCER_ID).unwrap(),
			"nfinst=inst-1; nfservinst=servinst-1; nfset=set-1; nfserviceset=svcset-1"
		);
	}
}
