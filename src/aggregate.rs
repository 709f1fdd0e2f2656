// Grouped summaries over typed incident and weather records.
//
// Every summary reports exactly the groups present in its input: no row is
// produced for an absent month or day, and an empty input gives an empty
// summary. Time-keyed summaries come out in ascending key order.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::types::{
    CauseSummary, DailyIncidentSummary, DailyWeatherSummary, IncidentRecord,
    MonthlyIncidentSummary, MonthlyWeatherSummary, SubRegionSummary, WeatherRecord,
};
use crate::util::mean;

fn count_by<K: Ord, I: IntoIterator<Item = K>>(keys: I) -> BTreeMap<K, usize> {
    let mut map = BTreeMap::new();
    for k in keys {
        *map.entry(k).or_insert(0usize) += 1;
    }
    map
}

/// Count occurrences of each present key and sort by count, descending.
///
/// Ties keep the order in which keys were first seen. Missing keys are not
/// counted.
fn rank_by_count<'a, I>(keys: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for key in keys.into_iter().flatten() {
        match index.get(key) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(key, order.len());
                order.push((key.to_string(), 1));
            }
        }
    }
    // `sort_by` is stable, so equal counts stay in first-seen order.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

pub fn monthly_incidents(records: &[IncidentRecord]) -> Vec<MonthlyIncidentSummary> {
    count_by(records.iter().map(|r| (r.year, r.month)))
        .into_iter()
        .map(|((year, month), incident_count)| MonthlyIncidentSummary {
            year,
            month,
            incident_count,
        })
        .collect()
}

pub fn daily_incidents(records: &[IncidentRecord]) -> Vec<DailyIncidentSummary> {
    count_by(records.iter().map(|r| r.occurred_on))
        .into_iter()
        .map(|(date, incident_count)| DailyIncidentSummary {
            date,
            incident_count,
        })
        .collect()
}

pub fn cause_ranking(records: &[IncidentRecord]) -> Vec<CauseSummary> {
    rank_by_count(records.iter().map(|r| r.cause_category.as_deref()))
        .into_iter()
        .map(|(cause_category, incident_count)| CauseSummary {
            cause_category,
            incident_count,
        })
        .collect()
}

pub fn sub_region_ranking(records: &[IncidentRecord]) -> Vec<SubRegionSummary> {
    rank_by_count(records.iter().map(|r| r.sub_region.as_deref()))
        .into_iter()
        .map(|(sub_region, incident_count)| SubRegionSummary {
            sub_region,
            incident_count,
        })
        .collect()
}

/// Running weather totals for one group. Missing temperature or humidity
/// readings are skipped; missing precipitation adds nothing.
#[derive(Debug, Default)]
struct WeatherAcc {
    temperatures: Vec<f64>,
    humidities: Vec<f64>,
    precipitation: f64,
}

impl WeatherAcc {
    fn add(&mut self, r: &WeatherRecord) {
        if let Some(t) = r.temperature_c {
            self.temperatures.push(t);
        }
        if let Some(h) = r.humidity_pct {
            self.humidities.push(h);
        }
        self.precipitation += r.precipitation_mm.unwrap_or(0.0);
    }
}

fn weather_by<K: Ord>(
    records: &[WeatherRecord],
    key: impl Fn(&WeatherRecord) -> K,
) -> BTreeMap<K, WeatherAcc> {
    let mut map: BTreeMap<K, WeatherAcc> = BTreeMap::new();
    for r in records {
        map.entry(key(r)).or_default().add(r);
    }
    map
}

pub fn monthly_weather(records: &[WeatherRecord]) -> Vec<MonthlyWeatherSummary> {
    weather_by(records, |r| (r.year, r.month))
        .into_iter()
        .map(|((year, month), acc)| MonthlyWeatherSummary {
            year,
            month,
            mean_temperature_c: mean(&acc.temperatures),
            mean_humidity_pct: mean(&acc.humidities),
            total_precipitation_mm: acc.precipitation,
        })
        .collect()
}

/// Daily weather summary. Several observations on the same date (hourly
/// data, or duplicates) are averaged and summed rather than rejected.
pub fn daily_weather(records: &[WeatherRecord]) -> Vec<DailyWeatherSummary> {
    weather_by(records, |r| r.date)
        .into_iter()
        .map(|(date, acc): (NaiveDate, WeatherAcc)| DailyWeatherSummary {
            date,
            mean_temperature_c: mean(&acc.temperatures),
            mean_humidity_pct: mean(&acc.humidities),
            total_precipitation_mm: acc.precipitation,
        })
        .collect()
}
