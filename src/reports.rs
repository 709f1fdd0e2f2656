use crate::aggregate;
use crate::config::WeatherVariable;
use crate::pipeline::PipelineOutput;
use crate::types::{
    CauseSummary, CorrelationRow, DailyMerged, DailyVariableRow, IncidentRecord, MonthTrendRow,
    MonthlyMerged, OverviewKpis, SubRegionSummary, SummaryStats,
};
use crate::util::{linear_fit, pearson, round_to};
use std::collections::BTreeSet;

/// Selection for the overview page: one year, optionally one sub-region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewFilter {
    pub year: i32,
    pub sub_region: Option<String>,
}

impl OverviewFilter {
    /// Latest year present in `incidents`, all sub-regions.
    pub fn latest(incidents: &[IncidentRecord]) -> Option<Self> {
        incidents.iter().map(|r| r.year).max().map(|year| Self {
            year,
            sub_region: None,
        })
    }

    pub fn apply(&self, incidents: &[IncidentRecord]) -> Vec<IncidentRecord> {
        incidents
            .iter()
            .filter(|r| r.year == self.year)
            .filter(|r| match &self.sub_region {
                Some(gu) => r.sub_region.as_deref() == Some(gu.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }
}

pub fn years(incidents: &[IncidentRecord]) -> Vec<i32> {
    let set: BTreeSet<i32> = incidents.iter().map(|r| r.year).collect();
    set.into_iter().collect()
}

pub fn sub_region_options(incidents: &[IncidentRecord]) -> Vec<String> {
    let set: BTreeSet<&str> = incidents
        .iter()
        .filter_map(|r| r.sub_region.as_deref())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

pub fn kpis(records: &[IncidentRecord]) -> OverviewKpis {
    let casualties: u64 = records
        .iter()
        .map(|r| u64::from(r.death_count) + u64::from(r.injury_count))
        .sum();
    let damage: f64 = records.iter().map(|r| r.property_damage_amount).sum();
    OverviewKpis {
        incident_count: records.len(),
        casualties,
        property_damage_100m: round_to(damage / 1e8, 2),
    }
}

// Month-of-year trend over a full 1-12 cycle. Months without incidents are
// filled with zero here, on the presentation side.
fn month_trend(
    records: &[IncidentRecord],
    value: impl Fn(&IncidentRecord) -> u64,
) -> Vec<MonthTrendRow> {
    let mut totals = [0u64; 12];
    for r in records {
        let slot = (r.month as usize)
            .checked_sub(1)
            .and_then(|i| totals.get_mut(i));
        if let Some(slot) = slot {
            *slot += value(r);
        }
    }
    totals
        .iter()
        .enumerate()
        .map(|(i, v)| MonthTrendRow {
            month: i as u32 + 1,
            value: *v,
        })
        .collect()
}

pub fn monthly_incident_trend(records: &[IncidentRecord]) -> Vec<MonthTrendRow> {
    month_trend(records, |_| 1)
}

pub fn monthly_death_trend(records: &[IncidentRecord]) -> Vec<MonthTrendRow> {
    month_trend(records, |r| u64::from(r.death_count))
}

pub fn top_causes(records: &[IncidentRecord], n: usize) -> Vec<CauseSummary> {
    let mut ranking = aggregate::cause_ranking(records);
    ranking.truncate(n);
    ranking
}

/// Sub-region ranking for one year across the whole region, independent of
/// any sub-region selection.
pub fn sub_regions_for_year(incidents: &[IncidentRecord], year: i32) -> Vec<SubRegionSummary> {
    let in_year: Vec<IncidentRecord> = incidents
        .iter()
        .filter(|r| r.year == year)
        .cloned()
        .collect();
    aggregate::sub_region_ranking(&in_year)
}

/// Pairwise Pearson correlations between incident count and the monthly
/// weather means.
pub fn correlation_matrix(merged: &[MonthlyMerged]) -> Vec<CorrelationRow> {
    let columns: [(&str, Vec<Option<f64>>); 4] = [
        (
            "IncidentCount",
            merged.iter().map(|m| Some(m.incident_count as f64)).collect(),
        ),
        (
            "TemperatureC",
            merged.iter().map(|m| m.mean_temperature_c).collect(),
        ),
        ("HumidityPct", merged.iter().map(|m| m.mean_humidity_pct).collect()),
        (
            "PrecipitationMm",
            merged.iter().map(|m| Some(m.total_precipitation_mm)).collect(),
        ),
    ];
    columns
        .iter()
        .map(|(name, xs)| {
            let r = |j: usize| pearson(xs, &columns[j].1);
            CorrelationRow {
                variable: name.to_string(),
                incident_count: r(0),
                temperature_c: r(1),
                humidity_pct: r(2),
                precipitation_mm: r(3),
            }
        })
        .collect()
}

fn daily_value(day: &DailyMerged, variable: WeatherVariable) -> Option<f64> {
    match variable {
        WeatherVariable::Temperature => day.mean_temperature_c,
        WeatherVariable::Humidity => day.mean_humidity_pct,
        WeatherVariable::Precipitation => Some(day.total_precipitation_mm),
    }
}

/// The chosen weather measure next to the incident count, one row per day.
pub fn daily_variable(merged: &[DailyMerged], variable: WeatherVariable) -> Vec<DailyVariableRow> {
    merged
        .iter()
        .map(|day| DailyVariableRow {
            date: day.date,
            value: daily_value(day, variable),
            incident_count: day.incident_count,
        })
        .collect()
}

/// Least-squares line of daily incident count against `variable`, as
/// `(slope, intercept)`. Days without the measure are skipped; `None` when
/// fewer than two days remain or the measure never varies.
pub fn linear_trend(merged: &[DailyMerged], variable: WeatherVariable) -> Option<(f64, f64)> {
    let xs: Vec<Option<f64>> = merged.iter().map(|d| daily_value(d, variable)).collect();
    let ys: Vec<Option<f64>> = merged.iter().map(|d| Some(d.incident_count as f64)).collect();
    linear_fit(&xs, &ys)
}

pub fn summary_stats(output: &PipelineOutput, overview: Option<OverviewKpis>) -> SummaryStats {
    SummaryStats {
        incident_rows: output.incidents.len(),
        weather_rows: output.weather.len(),
        population_rows: output.population.len(),
        read_quality: output.read_quality.clone(),
        monthly_merged_rows: output.monthly_merged.len(),
        daily_merged_rows: output.daily_merged.len(),
        overview,
    }
}
