//! Stats Registry (spec §4.4).
//!
//! Publishes counters under `http.eirl.n8e.<nf_instance>.g3p.ingress….`
//! Per-entity counters (one per configured network/roaming-partner) are
//! pre-created at construction time, from the config's enumerated
//! network and RP names, so a scrape sees them at `0` before any
//! traffic arrives — the same "register up front" pattern the teacher's
//! `telemetry::metrics::Metrics::new` uses, generalized from a single
//! labeled `Family<L, Counter>` to individually-named counters per
//! entity, because spec §4.4 bakes the entity into the metric *name*,
//! not into a label dimension.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;
use regex::Regex;

use ingress_core::strng::Strng;

static NF_INSTANCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"n8e\.(.+?)\.").unwrap());

/// Pull `<nf_instance>` out of a scope prefix via the anchored pattern
/// `n8e\.(.+?)\.`; the literal string `"null"` stands in for "absent",
/// matching what the source filter emits when the instance id can't be
/// determined.
pub fn extract_nf_instance(scope_prefix: &str) -> Strng {
	match NF_INSTANCE_RE.captures(scope_prefix) {
		Some(caps) => Strng::from(caps.get(1).unwrap().as_str()),
		None => Strng::from("null"),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Accepted,
	Rejected,
	Dropped,
}

#[derive(Debug, Default)]
struct Triplet {
	accepted: Counter,
	rejected: Counter,
	dropped: Counter,
}

impl Triplet {
	fn record(&self, outcome: Outcome) {
		match outcome {
			Outcome::Accepted => self.accepted.inc(),
			Outcome::Rejected => self.rejected.inc(),
			Outcome::Dropped => self.dropped.inc(),
		};
	}
}

#[derive(Debug)]
pub struct Stats {
	prefix: Strng,
	global: Triplet,
	rlf_lookup_failure: Counter,
	per_network: BTreeMap<Strng, Triplet>,
	per_rp: BTreeMap<Strng, Triplet>,
}

impl Stats {
	/// Build the registry, pre-creating one triplet of counters for
	/// every `network` and every `rp` name given, under a name prefix
	/// derived from `scope_prefix` (the listener/filter-chain scope the
	/// host assigns; `nf_instance` is extracted from it per §4.4).
	pub fn new(
		registry: &mut Registry,
		scope_prefix: &str,
		networks: impl IntoIterator<Item = Strng>,
		rps: impl IntoIterator<Item = Strng>,
	) -> Self {
		let nf_instance = extract_nf_instance(scope_prefix);
		let prefix = Strng::from(format!("http.eirl.n8e.{nf_instance}.g3p.ingress"));

		let mut register = |name: String| {
			let c = Counter::default();
			registry.register(name, "global rate limit counter", c.clone());
			c
		};

		let global = Triplet {
			accepted: register(format!("{prefix}.global_rate_limit_accepted")),
			rejected: register(format!("{prefix}.global_rate_limit_rejected")),
			dropped: register(format!("{prefix}.global_rate_limit_dropped")),
		};
		let rlf_lookup_failure = register(format!("{prefix}.rlf_lookup_failure"));

		let per_network = networks
			.into_iter()
			.map(|network| {
				let triplet = Triplet {
					accepted: register(format!("{prefix}.n5k.{network}.global_rate_limit_accepted_per_network")),
					rejected: register(format!("{prefix}.n5k.{network}.global_rate_limit_rejected_per_network")),
					dropped: register(format!("{prefix}.n5k.{network}.global_rate_limit_dropped_per_network")),
				};
				(network, triplet)
			})
			.collect();

		let per_rp = rps
			.into_iter()
			.map(|rp| {
				let triplet = Triplet {
					accepted: register(format!(
						"{prefix}.r12r.{rp}.global_rate_limit_accepted_per_roaming_partner"
					)),
					rejected: register(format!(
						"{prefix}.r12r.{rp}.global_rate_limit_rejected_per_roaming_partner"
					)),
					dropped: register(format!(
						"{prefix}.r12r.{rp}.global_rate_limit_dropped_per_roaming_partner"
					)),
				};
				(rp, triplet)
			})
			.collect();

		Stats {
			prefix,
			global,
			rlf_lookup_failure,
			per_network,
			per_rp,
		}
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn record_global(&self, outcome: Outcome) {
		self.global.record(outcome);
	}

	pub fn record_network(&self, network: &str, outcome: Outcome) {
		if let Some(t) = self.per_network.get(network) {
			t.record(outcome);
		}
	}

	pub fn record_rp(&self, rp: &str, outcome: Outcome) {
		if let Some(t) = self.per_rp.get(rp) {
			t.record(outcome);
		}
	}

	pub fn record_rlf_lookup_failure(&self) {
		self.rlf_lookup_failure.inc();
	}

	#[cfg(test)]
	pub fn global_count(&self, outcome: Outcome) -> u64 {
		match outcome {
			Outcome::Accepted => self.global.accepted.get(),
			Outcome::Rejected => self.global.rejected.get(),
			Outcome::Dropped => self.global.dropped.get(),
		}
	}

	#[cfg(test)]
	pub fn network_count(&self, network: &str, outcome: Outcome) -> u64 {
		let t = &self.per_network[network];
		match outcome {
			Outcome::Accepted => t.accepted.get(),
			Outcome::Rejected => t.rejected.get(),
			Outcome::Dropped => t.dropped.get(),
		}
	}

	#[cfg(test)]
	pub fn rp_count(&self, rp: &str, outcome: Outcome) -> u64 {
		let t = &self.per_rp[rp];
		match outcome {
			Outcome::Accepted => t.accepted.get(),
			Outcome::Rejected => t.rejected.get(),
			Outcome::Dropped => t.dropped.get(),
		}
	}

	#[cfg(test)]
	pub fn rlf_lookup_failure_count(&self) -> u64 {
		self.rlf_lookup_failure.get()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_nf_instance_from_scope_prefix() {
		assert_eq!(extract_nf_instance("n8e.sepp-worker-1.foo"), "sepp-worker-1");
		assert_eq!(extract_nf_instance("no-marker-here"), "null");
	}

	#[test]
	fn counters_are_preregistered_at_zero() {
		let mut registry = Registry::default();
		let stats = Stats::new(
			&mut registry,
			"n8e.instance1.scope",
			[Strng::from("net-a")],
			[Strng::from("rp-a")],
		);
		assert_eq!(stats.global_count(Outcome::Accepted), 0);
		assert_eq!(stats.network_count("net-a", Outcome::Accepted), 0);
		assert_eq!(stats.rp_count("rp-a", Outcome::Dropped), 0);
		assert!(stats.prefix().contains("instance1"));
	}

	#[test]
	fn records_increment_the_right_counter() {
		let mut registry = Registry::default();
		let stats = Stats::new(&mut registry, "n8e.i.x", [Strng::from("net-a")], [Strng::from("rp-a")]);
		stats.record_global(Outcome::Accepted);
		stats.record_network("net-a", Outcome::Dropped);
		stats.record_rp("rp-a", Outcome::Rejected);
		stats.record_rlf_lookup_failure();
		assert_eq!(stats.global_count(Outcome::Accepted), 1);
		assert_eq!(stats.network_count("net-a", Outcome::Dropped), 1);
		assert_eq!(stats.rp_count("rp-a", Outcome::Rejected), 1);
		assert_eq!(stats.rlf_lookup_failure_count(), 1);
	}

	#[test]
	fn recording_unknown_entity_is_a_noop() {
		let mut registry = Registry::default();
		let stats = Stats::new(&mut registry, "n8e.i.x", [], []);
		stats.record_network("unknown", Outcome::Accepted);
		stats.record_rp("unknown", Outcome::Accepted);
	}
}
