use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Converts a local-zone calendar date into the half-open `[start, end)` UTC instant range that
/// covers that full local day, per the curated read API's date-filter convention:
/// "date filters interpreted as full local-zone days converted to UTC instants, with end-date
/// inclusive by `<end+1day` half-open comparison". Exposed from `core` so a future read-side
/// collaborator does not have to re-derive this rule.
pub fn local_day_bounds_utc(
    date: NaiveDate,
    zone_offset_hours: i32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = FixedOffset::east_opt(zone_offset_hours * 3600)?;
    let start_local = offset.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()?;
    let end_local = offset
        .from_local_datetime(&(date + chrono::Duration::days(1)).and_hms_opt(0, 0, 0)?)
        .single()?;
    Some((start_local.with_timezone(&Utc), end_local.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_a_full_local_day_as_half_open_utc_range() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (start, end) = local_day_bounds_utc(date, -5).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-01-15T05:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-01-16T05:00:00+00:00");
        assert_eq!(end - start, chrono::Duration::days(1));
    }
}
