use crate::pipeline::{InputFiles, PipelineConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Page {
    /// Incident overview: KPIs, monthly trends, causes, sub-regions.
    Overview,
    /// Weather conditions against incident counts.
    Weather,
}

/// Daily weather measure plotted against incident counts on the weather page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeatherVariable {
    Temperature,
    Humidity,
    Precipitation,
}

impl WeatherVariable {
    pub fn label(&self) -> &'static str {
        match self {
            WeatherVariable::Temperature => "MeanTemperatureC",
            WeatherVariable::Humidity => "MeanHumidityPct",
            WeatherVariable::Precipitation => "PrecipitationMm",
        }
    }
}

/// Fire incidents against weather for a single region
#[derive(Parser, Debug, Clone)]
#[command(name = "fire_weather", version)]
pub struct Settings {
    /// Incident records file
    #[arg(long, env = "FIRE_WEATHER_INCIDENTS", default_value = "화재출동데이터_2024.csv")]
    pub incidents: PathBuf,

    /// Weather observations file
    #[arg(long, env = "FIRE_WEATHER_WEATHER", default_value = "기상데이터_2024.csv")]
    pub weather: PathBuf,

    /// Population figures file
    #[arg(long, env = "FIRE_WEATHER_POPULATION", default_value = "인구데이터_2024.csv")]
    pub population: PathBuf,

    /// Region name as written in the incident file
    #[arg(long, default_value = "서울특별시")]
    pub region: String,

    /// Region name as written in the weather station column
    #[arg(long, default_value = "서울")]
    pub station: String,

    /// Year for the overview page (latest year when omitted)
    #[arg(long)]
    pub year: Option<i32>,

    /// Sub-region for the overview page (all when omitted)
    #[arg(long)]
    pub sub_region: Option<String>,

    /// Directory for CSV and JSON exports
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Weather measure for the daily trend on the weather page
    #[arg(long, value_enum, default_value = "temperature")]
    pub variable: WeatherVariable,

    /// Show one page and exit instead of the interactive menu
    #[arg(long, value_enum)]
    pub page: Option<Page>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

impl Settings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let inputs = InputFiles {
            incidents: self.incidents.clone(),
            weather: self.weather.clone(),
            population: self.population.clone(),
        };
        PipelineConfig::new(inputs, self.region.clone(), self.station.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::try_parse_from(["fire_weather"]).unwrap();
        assert_eq!(s.region, "서울특별시");
        assert_eq!(s.station, "서울");
        assert_eq!(s.page, None);
        assert_eq!(s.variable, WeatherVariable::Temperature);
        assert_eq!(s.log_level, "INFO");
    }

    #[test]
    fn test_pipeline_config_from_flags() {
        let s = Settings::try_parse_from([
            "fire_weather",
            "--incidents",
            "a.csv",
            "--weather",
            "b.csv",
            "--population",
            "c.csv",
            "--region",
            "부산광역시",
            "--station",
            "부산",
            "--page",
            "weather",
        ])
        .unwrap();
        let config = s.pipeline_config();
        assert_eq!(config.inputs.incidents, PathBuf::from("a.csv"));
        assert_eq!(config.inputs.population, PathBuf::from("c.csv"));
        assert_eq!(config.region, "부산광역시");
        assert_eq!(config.station, "부산");
        assert_eq!(s.page, Some(Page::Weather));
    }

    #[test]
    fn test_variable_flag() {
        let s = Settings::try_parse_from(["fire_weather", "--variable", "humidity"]).unwrap();
        assert_eq!(s.variable, WeatherVariable::Humidity);
        assert!(Settings::try_parse_from(["fire_weather", "--variable", "wind"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(Settings::try_parse_from(["fire_weather", "--log-level", "LOUD"]).is_err());
    }
}
