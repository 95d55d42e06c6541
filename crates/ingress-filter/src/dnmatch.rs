//! Domain-Name Matcher (spec §4.2).
//!
//! Resolves a TLS peer's presented name to a roaming-partner identifier
//! using a set of configured DN patterns, each a dot-separated label
//! sequence where at most one label may be the literal `*` wildcard.
//! Patterns are compiled to anchored regexes once, at config load, and
//! matched in declaration order at request time — the same
//! precompile-once-reuse-per-request shape the teacher's `http/jwt.rs`
//! and `http/authorization.rs` use for their own matchers.

use regex::Regex;

use crate::error::ConfigError;
use ingress_core::strng::Strng;

/// Compile one DN pattern into its anchored, case-insensitive regex.
///
/// A wildcard label at the start of the pattern (`*.example.com`) only
/// ever matches a single non-empty, dot-free label (`[^.]+`); a
/// wildcard anywhere else (`foo.*.com`) is compiled to `[^.]*` per
/// spec §4.2. Non-wildcard labels are matched literally (escaped).
///
/// Only the first `*` label found (scanning left to right) is
/// substituted; the source matcher's `precompileRegexforDn` locates a
/// single `\*` occurrence in the fully quoted pattern and replaces just
/// that one, so a second `*` label is left as a literal, effectively
/// unmatchable character rather than rejected — there is no
/// multiple-wildcard validation error in the pattern this mirrors, and
/// none is introduced here.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
	let labels: Vec<&str> = pattern.split('.').collect();
	let mut re = String::from("(?i)^");
	let mut wildcard_substituted = false;
	for (i, label) in labels.iter().enumerate() {
		if i > 0 {
			re.push_str("\\.");
		}
		if *label == "*" && !wildcard_substituted {
			wildcard_substituted = true;
			re.push_str(if i == 0 { "[^.]+" } else { "[^.]*" });
		} else {
			re.push_str(&regex::escape(label));
		}
	}
	re.push('$');
	Regex::new(&re).map_err(|e| ConfigError::InvalidDomainPattern(pattern.to_string(), e))
}

/// A compiled set of DN-pattern → roaming-partner mappings, matched in
/// declaration order. Compilation happens once at config load; runtime
/// match is `O(patterns)`.
#[derive(Debug, Clone)]
pub struct DomainNameMatcher {
	entries: Vec<(Strng, Regex, Strng)>,
}

impl DomainNameMatcher {
	pub fn new(entries: Vec<(Strng, Regex, Strng)>) -> Self {
		Self { entries }
	}

	/// Resolve `presented_name` (the TLS peer's SAN/CN) to the first
	/// matching roaming-partner name, in declaration order.
	pub fn resolve(&self, presented_name: &str) -> Option<Strng> {
		self
			.entries
			.iter()
			.find(|(_, re, _)| re.is_match(presented_name))
			.map(|(_, _, rp)| rp.clone())
	}

	pub fn patterns(&self) -> impl Iterator<Item = &Strng> {
		self.entries.iter().map(|(pattern, _, _)| pattern)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	fn matcher(pairs: &[(&str, &str)]) -> DomainNameMatcher {
		let entries = pairs
			.iter()
			.map(|(pattern, rp)| {
				let re = compile_pattern(pattern).unwrap();
				(Strng::from(*pattern), re, Strng::from(*rp))
			})
			.collect();
		DomainNameMatcher::new(entries)
	}

	#[test]
	fn wildcard_at_start_matches_one_label() {
		let m = matcher(&[("*.example.com", "rp1")]);
		assert_eq!(m.resolve("foo.example.com").as_deref(), Some("rp1"));
		assert_eq!(m.resolve("foo.bar.example.com"), None);
		assert_eq!(m.resolve("example.com"), None);
	}

	#[test]
	fn wildcard_in_middle_matches_one_label() {
		let m = matcher(&[("foo.*.com", "rp2")]);
		assert_eq!(m.resolve("foo.bar.com").as_deref(), Some("rp2"));
		assert_eq!(m.resolve("foo.bar.baz.com"), None);
	}

	#[test]
	fn wildcard_elsewhere_also_matches_an_empty_label() {
		// `[^.]*` (zero-or-more), not `[^.]+`, for a non-leading wildcard —
		// carried over from the source matcher's regex construction.
		let m = matcher(&[("foo.*.com", "rp2")]);
		assert_eq!(m.resolve("foo..com").as_deref(), Some("rp2"));
	}

	#[test]
	fn exact_pattern_is_case_insensitive() {
		let m = matcher(&[("partner.example.org", "rp3")]);
		assert_eq!(m.resolve("PARTNER.EXAMPLE.ORG").as_deref(), Some("rp3"));
	}

	#[test]
	fn first_match_in_declaration_order_wins() {
		let m = matcher(&[("*.example.com", "rp-wild"), ("foo.example.com", "rp-exact")]);
		assert_eq!(m.resolve("foo.example.com").as_deref(), Some("rp-wild"));
	}

	#[test]
	fn only_the_first_wildcard_label_is_substituted() {
		// Mirrors precompileRegexforDn's single `.replace()`: the first `*`
		// label becomes a real wildcard, any later one is left as a literal
		// '*' character that a real presented identity never contains.
		let re = compile_pattern("*.foo.*").unwrap();
		assert!(re.is_match("bar.foo.*"));
		assert!(!re.is_match("bar.foo.baz"));
	}

	#[test]
	fn no_match_returns_none() {
		let m = matcher(&[("partner.example.org", "rp3")]);
		assert_eq!(m.resolve("unknown.example.org"), None);
	}
}
