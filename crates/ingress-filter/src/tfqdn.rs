//! Telescopic-FQDN (TFQDN) codec.
//!
//! Encodes an arbitrary FQDN or URL-ish byte string drawn from a fixed
//! alphabet into a single legal DNS label (`[a-z0-9-]`, case-insensitive)
//! and decodes it back losslessly. Used by the routing pre-processor
//! (see [`crate::routing`]) to carry an external-facing name through a
//! DNS-label-shaped internal representation.
//!
//! Three encodings are layered, tried in this order at every input
//! position:
//!
//! - **Direct**: the character passes through unchanged (most letters,
//!   digits, `-`).
//! - **`q`-escape**: a closed set of multi-byte 5G-core domain tokens
//!   (`amf`, `.mcc`, `https://`, ...) collapse to `q` followed by one
//!   letter. Matching is longest-prefix-first so `pcrf` is preferred
//!   over `pcf`, `https://` over `http://`, etc.
//! - **`z`-escape**: every other punctuation byte, plus the letters
//!   `j q v z` that would otherwise collide with the replacement
//!   singles below, becomes `z` followed by one letter.
//!
//! Two single-character replacements (`.` to `v`, `:` to `j`) free up
//! `v` and `j` for use as DNS-label characters; `q` and `z` are never
//! emitted standalone since they always start an escape.
//!
//! The table values themselves (which letter follows `q`/`z` for which
//! input) are not a design choice made here; they are carried over
//! unchanged from the filter this crate generalizes, character for
//! character.

use crate::error::TfqdnError;
use ingress_core::strng::Strng;

/// Multi-byte tokens recognised by the `q`-escape, longest literal
/// first within any shared prefix. Order here does not matter for
/// correctness (matching always picks the longest applicable token)
/// but groups related tokens for readability.
const Q_TOKENS: &[(&str, u8)] = &[
	(".3gppnetwork.org", b'3'),
	(".5gc.mnc", b'5'),
	(".mcc", b'm'),
	("https://", b's'),
	("http://", b'h'),
	("ipups", b'i'),
	("ausf", b'9'),
	("nssf", b'k'),
	("pcrf", b'1'),
	("secf", b'd'),
	("sepp", b'e'),
	("smsf", b'x'),
	("udsf", b'z'),
	("amf", b'a'),
	("bsf", b'b'),
	("dra", b'r'),
	("hss", b'l'),
	("mme", b'o'),
	("nef", b'8'),
	("nrf", b'n'),
	("pcf", b'p'),
	("pgw", b't'),
	("scp", b'w'),
	("sgw", b'g'),
	("smf", b'f'),
	("udm", b'u'),
	("udr", b'y'),
	("upf", b'0'),
];

/// Punctuation bytes that can only be represented via a `z`-escape.
const Z_PUNCT: &[(u8, u8)] = &[
	(b'%', b'a'),
	(b'_', b'b'),
	(b'!', b'c'),
	(b'$', b'd'),
	(b'\'', b'e'),
	(b'(', b'f'),
	(b')', b'g'),
	(b'*', b'h'),
	(b',', b'i'),
	(b';', b'k'),
	(b'=', b'l'),
	(b'[', b'm'),
	(b']', b'n'),
	(b'/', b'o'),
];

fn find_q_token(rest: &[u8]) -> Option<(usize, u8)> {
	Q_TOKENS
		.iter()
		.filter(|(tok, _)| rest.len() >= tok.len() && &rest[..tok.len()] == tok.as_bytes())
		.max_by_key(|(tok, _)| tok.len())
		.map(|(tok, esc)| (tok.len(), *esc))
}

fn z_punct_escape(c: u8) -> Option<u8> {
	Z_PUNCT.iter().find(|(byte, _)| *byte == c).map(|(_, esc)| *esc)
}

/// Encode `input` into a TFQDN. Infallible: bytes outside the declared
/// alphabet pass through unescaped rather than erroring, matching the
/// source codec's behaviour for unexpected input.
pub fn encode(input: &str) -> Strng {
	let lower = input.to_ascii_lowercase();
	let bytes = lower.as_bytes();
	let mut out = String::with_capacity(bytes.len() + 8);
	let mut pos = 0;
	while pos < bytes.len() {
		let c = bytes[pos];
		if let Some((consumed, esc)) = find_q_token(&bytes[pos..]) {
			out.push('q');
			out.push(esc as char);
			pos += consumed;
			continue;
		}
		match c {
			b'-' | b'0'..=b'9' => {
				out.push(c as char);
				pos += 1;
			}
			b'.' => {
				out.push('v');
				pos += 1;
			}
			b':' => {
				out.push('j');
				pos += 1;
			}
			b'j' | b'q' | b'v' | b'z' => {
				out.push('z');
				out.push(c as char);
				pos += 1;
			}
			_ => {
				if let Some(esc) = z_punct_escape(c) {
					out.push('z');
					out.push(esc as char);
				} else {
					// Unknown byte: no escape defined, pass through.
					out.push(c as char);
				}
				pos += 1;
			}
		}
	}
	Strng::from(out)
}

fn direct_decode(c: u8) -> Option<u8> {
	match c {
		b'-' => Some(b'-'),
		b'0'..=b'9' => Some(c),
		b'j' => Some(b':'),
		b'v' => Some(b'.'),
		b'q' | b'z' => None,
		b'a'..=b'i' | b'k' | b'l' | b'm' | b'n' | b'o' | b'p' | b'r' | b's' | b't' | b'u' | b'w' | b'x' | b'y' => {
			Some(c)
		}
		_ => None,
	}
}

fn esc_q_decode(c: u8) -> Option<&'static str> {
	match c {
		b'0' => Some("upf"),
		b'1' => Some("pcrf"),
		b'3' => Some(".3gppnetwork.org"),
		b'5' => Some(".5gc.mnc"),
		b'8' => Some("nef"),
		b'9' => Some("ausf"),
		b'a' => Some("amf"),
		b'b' => Some("bsf"),
		b'd' => Some("secf"),
		b'e' => Some("sepp"),
		b'f' => Some("smf"),
		b'g' => Some("sgw"),
		b'h' => Some("http://"),
		b'i' => Some("ipups"),
		b'j' => Some("j"),
		b'k' => Some("nssf"),
		b'l' => Some("hss"),
		b'm' => Some(".mcc"),
		b'n' => Some("nrf"),
		b'o' => Some("mme"),
		b'p' => Some("pcf"),
		b'q' => Some("q"),
		b'r' => Some("dra"),
		b's' => Some("https://"),
		b't' => Some("pgw"),
		b'u' => Some("udm"),
		b'v' => Some("v"),
		b'w' => Some("scp"),
		b'x' => Some("smsf"),
		b'y' => Some("udr"),
		b'z' => Some("udsf"),
		_ => None,
	}
}

fn esc_z_decode(c: u8) -> Option<u8> {
	match c {
		b'a' => Some(b'%'),
		b'b' => Some(b'_'),
		b'c' => Some(b'!'),
		b'd' => Some(b'$'),
		b'e' => Some(b'\''),
		b'f' => Some(b'('),
		b'g' => Some(b')'),
		b'h' => Some(b'*'),
		b'i' => Some(b','),
		b'j' => Some(b'j'),
		b'k' => Some(b';'),
		b'l' => Some(b'='),
		b'm' => Some(b'['),
		b'n' => Some(b']'),
		b'o' => Some(b'/'),
		b'q' => Some(b'q'),
		b'v' => Some(b'v'),
		b'z' => Some(b'z'),
		_ => None,
	}
}

/// Decode a TFQDN back into its original form, lower-cased. Fails if
/// the input ends mid-escape, or any escape/direct byte has no table
/// entry.
pub fn decode(input: &str) -> Result<Strng, TfqdnError> {
	let lower = input.to_ascii_lowercase();
	let bytes = lower.as_bytes();
	let mut out = String::with_capacity(bytes.len());
	let mut pos = 0;
	while pos < bytes.len() {
		let c = bytes[pos];
		match c {
			b'q' => {
				let c2 = *bytes.get(pos + 1).ok_or(TfqdnError::TruncatedEscape)?;
				let tok = esc_q_decode(c2).ok_or(TfqdnError::InvalidEscape)?;
				out.push_str(tok);
				pos += 2;
			}
			b'z' => {
				let c2 = *bytes.get(pos + 1).ok_or(TfqdnError::TruncatedEscape)?;
				let ch = esc_z_decode(c2).ok_or(TfqdnError::InvalidEscape)?;
				out.push(ch as char);
				pos += 2;
			}
			_ => {
				let ch = direct_decode(c).ok_or(TfqdnError::InvalidEscape)?;
				out.push(ch as char);
				pos += 1;
			}
		}
	}
	Ok(Strng::from(out))
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	fn roundtrip(s: &str) {
		let encoded = encode(s);
		assert!(
			encoded.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'),
			"encoded form {encoded:?} escaped outside [a-z0-9-]"
		);
		let decoded = decode(&encoded).unwrap();
		assert_eq!(decoded.as_str(), s.to_ascii_lowercase());
		let decoded_upper = decode(&encoded.to_ascii_uppercase()).unwrap();
		assert_eq!(decoded_upper.as_str(), s.to_ascii_lowercase());
	}

	#[test]
	fn roundtrips_core_network_fqdn() {
		roundtrip("nfudm2.mnc.123.mcc.321.ericsson.se:15713");
	}

	#[test]
	fn roundtrips_ipv6_url_with_percent_escape() {
		roundtrip("http://[fe80::1ff:fe23:4567:890a%25eth0]/");
	}

	#[test]
	fn roundtrips_full_punctuation_alphabet() {
		roundtrip("abcdefghijklmnopqrsrtuvwxyz0123456789-:.%_!$'()*,;=[]");
	}

	#[test]
	fn encode_prefers_longest_token_match() {
		// "pcrf" must win over the "pcf" prefix, "smsf" over "smf", etc.
		assert_eq!(encode("pcrf"), "q1");
		assert_eq!(encode("pcf"), "qp");
		assert_eq!(encode("smsf"), "qx");
		assert_eq!(encode("smf"), "qf");
		assert_eq!(encode("udsf"), "qz");
		assert_eq!(encode("https://"), "qs");
		assert_eq!(encode("http://"), "qh");
	}

	#[test]
	fn decode_rejects_truncated_q_escape() {
		assert_matches!(decode("amfq"), Err(TfqdnError::TruncatedEscape));
	}

	#[test]
	fn decode_rejects_truncated_z_escape() {
		assert_matches!(decode("amfz"), Err(TfqdnError::TruncatedEscape));
	}

	#[test]
	fn decode_rejects_undefined_escape_follower() {
		// 'c' after 'q' has no esc_q_decode entry (only defined for
		// a subset of letters/digits).
		assert_matches!(decode("qc"), Err(TfqdnError::InvalidEscape));
	}

	#[test]
	fn decode_is_case_insensitive() {
		assert_eq!(decode("QAmf").unwrap().as_str(), "amf");
	}

	#[test]
	fn collision_letters_round_trip_through_z_escape() {
		roundtrip("jqvz");
	}
}
