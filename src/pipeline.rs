// Pipeline orchestration: read, filter, aggregate, join.
//
// `run` computes everything from the three input files; `PipelineCache`
// memoizes that result for a fixed configuration so repeated requests share
// one immutable snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::aggregate;
use crate::error::{PipelineError, Result};
use crate::join;
use crate::loader::{self, IncidentColumns, WeatherColumns};
use crate::reader::{ReadOutcome, TableReader};
use crate::types::{
    CauseSummary, DailyIncidentSummary, DailyMerged, DailyWeatherSummary, IncidentRecord,
    MonthlyIncidentSummary, MonthlyMerged, MonthlyWeatherSummary, RawTable, ReadQuality,
    SubRegionSummary, WeatherRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFiles {
    pub incidents: PathBuf,
    pub weather: PathBuf,
    pub population: PathBuf,
}

/// Everything that determines a pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub inputs: InputFiles,
    /// Target region as written in the incident file.
    pub region: String,
    /// Target region as written in the weather file's station column.
    pub station: String,
    pub incident_columns: IncidentColumns,
    pub weather_columns: WeatherColumns,
}

impl PipelineConfig {
    pub fn new(inputs: InputFiles, region: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            inputs,
            region: region.into(),
            station: station.into(),
            incident_columns: IncidentColumns::default(),
            weather_columns: WeatherColumns::default(),
        }
    }
}

/// All derived tables. Built once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub incidents: Vec<IncidentRecord>,
    pub weather: Vec<WeatherRecord>,
    pub population: RawTable,
    pub read_quality: Vec<ReadQuality>,
    pub monthly_incidents: Vec<MonthlyIncidentSummary>,
    pub daily_incidents: Vec<DailyIncidentSummary>,
    pub causes: Vec<CauseSummary>,
    pub sub_regions: Vec<SubRegionSummary>,
    pub monthly_weather: Vec<MonthlyWeatherSummary>,
    pub daily_weather: Vec<DailyWeatherSummary>,
    pub monthly_merged: Vec<MonthlyMerged>,
    pub daily_merged: Vec<DailyMerged>,
}

impl PipelineOutput {
    /// Derive every table from already-read raw tables.
    pub fn from_tables(
        incident_table: &RawTable,
        weather_table: &RawTable,
        population: RawTable,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let incidents =
            loader::load_incidents(incident_table, &config.region, &config.incident_columns)?;
        let weather =
            loader::load_weather(weather_table, &config.station, &config.weather_columns)?;

        let monthly_incidents = aggregate::monthly_incidents(&incidents);
        let daily_incidents = aggregate::daily_incidents(&incidents);
        let monthly_weather = aggregate::monthly_weather(&weather);
        let daily_weather = aggregate::daily_weather(&weather);
        let monthly_merged = join::merge_monthly(&monthly_incidents, &monthly_weather);
        let daily_merged = join::merge_daily(&daily_incidents, &daily_weather);

        info!(
            monthly = monthly_merged.len(),
            daily = daily_merged.len(),
            "incident and weather summaries joined"
        );

        Ok(Self {
            causes: aggregate::cause_ranking(&incidents),
            sub_regions: aggregate::sub_region_ranking(&incidents),
            incidents,
            weather,
            population,
            read_quality: Vec::new(),
            monthly_incidents,
            daily_incidents,
            monthly_weather,
            daily_weather,
            monthly_merged,
            daily_merged,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.read_quality.iter().any(|q| q.degraded)
    }
}

fn quality(dataset: &str, outcome: &ReadOutcome) -> ReadQuality {
    ReadQuality {
        dataset: dataset.to_string(),
        encoding: outcome.encoding().label().to_string(),
        degraded: outcome.is_degraded(),
        dropped_bytes: outcome.dropped_bytes(),
    }
}

/// Read the three input files and derive every table.
///
/// Stops at the first error; there is no partial result.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let reader = TableReader::new();
    let incidents = reader.read_path(&config.inputs.incidents)?;
    let weather = reader.read_path(&config.inputs.weather)?;
    let population = reader.read_path(&config.inputs.population)?;

    let read_quality = vec![
        quality("incidents", &incidents),
        quality("weather", &weather),
        quality("population", &population),
    ];

    let mut output = PipelineOutput::from_tables(
        incidents.table(),
        weather.table(),
        population.into_table(),
        config,
    )?;
    output.read_quality = read_quality;
    Ok(output)
}

/// Memoized pipeline result for one configuration.
///
/// The first successful [`get`](Self::get) computes the result; later calls
/// return the same `Arc`. A failed computation is not cached.
#[derive(Debug)]
pub struct PipelineCache {
    config: PipelineConfig,
    cell: OnceCell<Arc<PipelineOutput>>,
}

impl PipelineCache {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Result<Arc<PipelineOutput>> {
        self.cell
            .get_or_try_init(|| run(&self.config).map(Arc::new))
            .map(Arc::clone)
    }

    /// Like [`get`](Self::get), but refuses to answer for a different configuration.
    pub fn get_for(&self, config: &PipelineConfig) -> Result<Arc<PipelineOutput>> {
        if *config != self.config {
            return Err(PipelineError::CacheMismatch);
        }
        self.get()
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}
