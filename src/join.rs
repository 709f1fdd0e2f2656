// Inner joins of incident and weather summaries on their time key.
//
// Only keys present on both sides survive; a period with incidents but no
// weather (or the reverse) is dropped rather than imputed. Keys are compared
// for exact equality.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{
    DailyIncidentSummary, DailyMerged, DailyWeatherSummary, MonthlyIncidentSummary,
    MonthlyMerged, MonthlyWeatherSummary,
};

/// A row that sits on a timeline at some granularity.
pub trait TimeKeyed {
    type Key: Ord + Copy;

    fn time_key(&self) -> Self::Key;
}

impl TimeKeyed for MonthlyIncidentSummary {
    type Key = (i32, u32);

    fn time_key(&self) -> Self::Key {
        (self.year, self.month)
    }
}

impl TimeKeyed for MonthlyWeatherSummary {
    type Key = (i32, u32);

    fn time_key(&self) -> Self::Key {
        (self.year, self.month)
    }
}

impl TimeKeyed for DailyIncidentSummary {
    type Key = NaiveDate;

    fn time_key(&self) -> Self::Key {
        self.date
    }
}

impl TimeKeyed for DailyWeatherSummary {
    type Key = NaiveDate;

    fn time_key(&self) -> Self::Key {
        self.date
    }
}

/// Pair every left row with every right row sharing its key.
///
/// Output follows left order, then right order within a key.
pub fn inner_join<'a, L, R>(left: &'a [L], right: &'a [R]) -> Vec<(&'a L, &'a R)>
where
    L: TimeKeyed,
    R: TimeKeyed<Key = L::Key>,
{
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }
    let mut by_key: BTreeMap<L::Key, Vec<&'a R>> = BTreeMap::new();
    for r in right {
        by_key.entry(r.time_key()).or_default().push(r);
    }
    left.iter()
        .filter_map(|l| by_key.get(&l.time_key()).map(|rs| (l, rs)))
        .flat_map(|(l, rs)| rs.iter().map(move |r| (l, *r)))
        .collect()
}

pub fn merge_monthly(
    incidents: &[MonthlyIncidentSummary],
    weather: &[MonthlyWeatherSummary],
) -> Vec<MonthlyMerged> {
    inner_join(incidents, weather)
        .into_iter()
        .map(|(i, w)| MonthlyMerged {
            year: i.year,
            month: i.month,
            incident_count: i.incident_count,
            mean_temperature_c: w.mean_temperature_c,
            mean_humidity_pct: w.mean_humidity_pct,
            total_precipitation_mm: w.total_precipitation_mm,
        })
        .collect()
}

pub fn merge_daily(
    incidents: &[DailyIncidentSummary],
    weather: &[DailyWeatherSummary],
) -> Vec<DailyMerged> {
    inner_join(incidents, weather)
        .into_iter()
        .map(|(i, w)| DailyMerged {
            date: i.date,
            incident_count: i.incident_count,
            mean_temperature_c: w.mean_temperature_c,
            mean_humidity_pct: w.mean_humidity_pct,
            total_precipitation_mm: w.total_precipitation_mm,
        })
        .collect()
}
