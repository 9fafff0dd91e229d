use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

use crate::config::Config;
use crate::domain::method::IngestionMethod;
use crate::error::IngestionError;

/// Pure "is now a valid moment to run `method`?" predicate plus the `windowKey(method, now)`
/// function. `validate_and_get_key` takes `now` explicitly so the whole component
/// stays deterministic and unit-testable; `Clock` just wraps `Utc::now()` for call sites that
/// want the real time.
#[derive(Debug, Clone)]
pub struct WindowPolicy {
    daily_start: NaiveTime,
    daily_end: NaiveTime,
    monthly_run_days: std::collections::BTreeSet<u32>,
    monthly_start: NaiveTime,
    zone: FixedOffset,
}

impl WindowPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            daily_start: config.daily_window_start,
            daily_end: config.daily_window_end,
            monthly_run_days: config.monthly_run_days.clone(),
            monthly_start: config.monthly_window_start,
            zone: FixedOffset::east_opt(config.time_zone_offset_hours * 3600)
                .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap()),
        }
    }

    /// Returns the stable `windowKey` for `(method, now)`, or `WindowViolation` if the call is
    /// outside the legal execution region and `force` is false.
    pub fn validate_and_get_key(
        &self,
        method: IngestionMethod,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<String, IngestionError> {
        let local = now.with_timezone(&self.zone);
        let window_key = local.format("%Y-%m-%d").to_string();

        if force {
            return Ok(window_key);
        }

        if method.is_monthly() {
            self.validate_monthly(local)?;
        } else {
            self.validate_daily(local)?;
        }

        Ok(window_key)
    }

    fn validate_daily(&self, local: DateTime<FixedOffset>) -> Result<(), IngestionError> {
        let t = local.time();
        if t >= self.daily_start && t <= self.daily_end {
            Ok(())
        } else {
            Err(IngestionError::WindowViolation(format!(
                "daily window is [{}, {}]; now is {}",
                self.daily_start, self.daily_end, t
            )))
        }
    }

    fn validate_monthly(&self, local: DateTime<FixedOffset>) -> Result<(), IngestionError> {
        let day = local.day();
        let t = local.time();

        let on_scheduled_day = self.monthly_run_days.contains(&day) && t >= self.monthly_start;
        let on_grace_day = day
            .checked_sub(1)
            .map(|prev| self.monthly_run_days.contains(&prev))
            .unwrap_or(false);

        if on_scheduled_day || on_grace_day {
            Ok(())
        } else {
            Err(IngestionError::WindowViolation(format!(
                "monthly run days are {:?} (grace day after); now is day {day} at {t}",
                self.monthly_run_days
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::method::IngestionMethod;
    use chrono::TimeZone;

    fn policy() -> WindowPolicy {
        WindowPolicy {
            daily_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            daily_end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            monthly_run_days: [5, 20].into_iter().collect(),
            monthly_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            zone: FixedOffset::east_opt(-5 * 3600).unwrap(),
        }
    }

    #[test]
    fn daily_window_accepts_in_range_time() {
        let p = policy();
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 19, 25, 0).unwrap(); // 14:25 local (-5)
        let key = p
            .validate_and_get_key(IngestionMethod::PromediosSipsaCiudad, now, false)
            .unwrap();
        assert_eq!(key, "2026-01-10");
    }

    #[test]
    fn daily_window_rejects_out_of_range_time() {
        let p = policy();
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 2, 0, 0).unwrap(); // 21:00 local prev-day (-5)
        let res = p.validate_and_get_key(IngestionMethod::PromediosSipsaCiudad, now, false);
        assert!(res.is_err());
    }

    #[test]
    fn force_always_succeeds_regardless_of_time() {
        let p = policy();
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 2, 0, 0).unwrap();
        let res = p.validate_and_get_key(IngestionMethod::PromediosSipsaCiudad, now, true);
        assert!(res.is_ok());
    }

    #[test]
    fn monthly_window_accepts_scheduled_day_after_start_time() {
        let p = policy();
        // 2026-02-05 11:30 UTC = 06:30 local (-5): scheduled day, after monthly_start.
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 11, 30, 0).unwrap();
        let res = p.validate_and_get_key(
            IngestionMethod::PromedioAbasSipsaMesMadr,
            now,
            false,
        );
        assert!(res.is_ok());
    }

    #[test]
    fn monthly_window_rejects_scheduled_day_before_start_time() {
        let p = policy();
        // 2026-02-05 10:00 UTC = 05:00 local (-5): scheduled day, before monthly_start.
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap();
        let res = p.validate_and_get_key(
            IngestionMethod::PromedioAbasSipsaMesMadr,
            now,
            false,
        );
        assert!(res.is_err());
    }

    #[test]
    fn monthly_window_accepts_full_grace_day() {
        let p = policy();
        // Grace day after day 5, any time during it: 2026-02-06 05:00 UTC = 2026-02-06 00:00 local.
        let now = Utc.with_ymd_and_hms(2026, 2, 6, 5, 0, 0).unwrap();
        let res = p.validate_and_get_key(
            IngestionMethod::PromedioAbasSipsaMesMadr,
            now,
            false,
        );
        assert!(res.is_ok());
    }

    #[test]
    fn monthly_window_rejects_two_days_after_scheduled_day() {
        let p = policy();
        // 2026-02-07 12:00 UTC = 07:00 local (-5): two days after day 5, not grace.
        let now = Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap();
        let res = p.validate_and_get_key(
            IngestionMethod::PromedioAbasSipsaMesMadr,
            now,
            false,
        );
        assert!(res.is_err());
    }

    #[test]
    fn same_now_produces_same_window_key_across_calls() {
        let p = policy();
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 11, 30, 0).unwrap();
        let k1 = p
            .validate_and_get_key(IngestionMethod::PromedioAbasSipsaMesMadr, now, true)
            .unwrap();
        let k2 = p
            .validate_and_get_key(IngestionMethod::PromedioAbasSipsaMesMadr, now, true)
            .unwrap();
        assert_eq!(k1, k2);
    }
}
