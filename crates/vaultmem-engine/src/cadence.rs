//! Cadence dueness rule for `getDueMemories` (spec §4.H read path).
//!
//! Evaluated against an explicit `DateTime<Utc>` rather than the host's
//! local clock, so a given `(cadence_type, cadence_value, as_of)` triple is
//! always deterministic (spec §9 design note).

use chrono::{DateTime, Datelike, Utc, Weekday};

use vaultmem_core::record::CadenceType;

/// Whether a memory with the given cadence is due as of `as_of`. A
/// malformed `cadence_value` (non-integer, or out of range) is treated as
/// never due rather than panicking.
pub fn is_due(cadence_type: CadenceType, cadence_value: Option<&str>, as_of: DateTime<Utc>) -> bool {
    match cadence_type {
        CadenceType::Daily => true,
        CadenceType::Weekly => as_of.weekday() == Weekday::Sun,
        CadenceType::Monthly => as_of.day() == 1,
        CadenceType::DayOfWeek => cadence_value
            .and_then(|v| v.parse::<u32>().ok())
            .is_some_and(|want| as_of.weekday().num_days_from_sunday() == want),
        CadenceType::DayOfMonth => cadence_value
            .and_then(|v| v.parse::<u32>().ok())
            .is_some_and(|want| as_of.day() == want),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn daily_is_always_due() {
        assert!(is_due(CadenceType::Daily, None, at(2026, 7, 27)));
    }

    #[test]
    fn weekly_due_only_on_sunday() {
        // 2026-07-26 is a Sunday.
        assert!(is_due(CadenceType::Weekly, None, at(2026, 7, 26)));
        assert!(!is_due(CadenceType::Weekly, None, at(2026, 7, 27)));
    }

    #[test]
    fn monthly_due_only_on_first() {
        assert!(is_due(CadenceType::Monthly, None, at(2026, 7, 1)));
        assert!(!is_due(CadenceType::Monthly, None, at(2026, 7, 2)));
    }

    #[test]
    fn day_of_week_matches_configured_value() {
        // Sunday == 0.
        assert!(is_due(CadenceType::DayOfWeek, Some("0"), at(2026, 7, 26)));
        assert!(!is_due(CadenceType::DayOfWeek, Some("0"), at(2026, 7, 27)));
    }

    #[test]
    fn day_of_month_matches_configured_value() {
        assert!(is_due(CadenceType::DayOfMonth, Some("15"), at(2026, 7, 15)));
        assert!(!is_due(CadenceType::DayOfMonth, Some("15"), at(2026, 7, 16)));
    }

    #[test]
    fn malformed_cadence_value_is_never_due() {
        assert!(!is_due(CadenceType::DayOfMonth, Some("not-a-number"), at(2026, 7, 15)));
        assert!(!is_due(CadenceType::DayOfWeek, None, at(2026, 7, 26)));
    }
}
