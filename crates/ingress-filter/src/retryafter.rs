//! Retry-After formatter (spec §4.5).
//!
//! Converts a millisecond delay returned by the external decider (field
//! `ra` in the RLF response, see [`crate::rlf_client`]) into either an
//! integer-seconds string or an HTTP-date string. The weekday/month
//! abbreviations are a fixed table, not locale data, and every numeric
//! field is zero-padded to two digits.
//!
//! The HTTP-date branch intentionally prepends `"Date: "` to the
//! formatted value. That is not the conventional shape of a
//! `Retry-After` header (RFC 7231 calls for the date-value alone) but
//! it is what the filter this module generalizes emits, and spec.md §9
//! keeps the behaviour rather than silently fixing it.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
	"Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Ceiling-divide a millisecond delay into whole seconds. `0ms` still
/// rounds up to `0s`; any positive remainder rounds up to the next
/// second (`ra=40` → `1`, matching spec.md §8).
fn seconds_ceil(delay_ms: i64) -> i64 {
	let delay_ms = delay_ms.max(0);
	(delay_ms + 999) / 1000
}

/// Format the delay as a bare integer-seconds string, e.g. `"13"`.
pub fn format_seconds(delay_ms: i64) -> String {
	seconds_ceil(delay_ms).to_string()
}

/// Format `now + ceil(delay_ms / 1000)` as `Date: Wdy, DD Mon YYYY
/// HH:MM:SS GMT`, per spec.md §4.5.
pub fn format_http_date(delay_ms: i64, now: DateTime<Utc>) -> String {
	let target = now + ChronoDuration::seconds(seconds_ceil(delay_ms));
	let weekday = WEEKDAYS[target.weekday().num_days_from_sunday() as usize];
	let month = MONTHS[target.month0() as usize];
	format!(
		"Date: {weekday}, {:02} {month} {:04} {:02}:{:02}:{:02} GMT",
		target.day(),
		target.year(),
		target.hour(),
		target.minute(),
		target.second()
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn seconds_round_up() {
		assert_eq!(format_seconds(1000), "1");
		assert_eq!(format_seconds(1001), "2");
		assert_eq!(format_seconds(40), "1");
		assert_eq!(format_seconds(31_536_000_000), "31536000");
		assert_eq!(format_seconds(12345), "13");
	}

	#[test]
	fn http_date_uses_fixed_table_and_zero_padding() {
		// 2024-01-01 00:00:05 UTC is a Monday.
		let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();
		let formatted = format_http_date(1000, now);
		assert_eq!(formatted, "Date: Mon, 01 Jan 2024 00:00:06 GMT");
	}

	#[test]
	fn http_date_rolls_over_month_and_year_boundaries() {
		let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
		let formatted = format_http_date(2000, now);
		assert_eq!(formatted, "Date: Mon, 01 Jan 2024 00:00:01 GMT");
	}
}
