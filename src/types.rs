use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

/// A single cell of a [`RawTable`].
///
/// Numeric cells keep the text they were read from, so checks on the
/// written form (digit counts, leading zeros) see the cell as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number { value: f64, raw: String },
    Missing,
}

static MISSING: Value = Value::Missing;

impl Value {
    /// Type a raw CSV cell: empty is missing, anything numeric is a number.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Value::Number {
                value,
                raw: cell.to_string(),
            },
            _ => Value::Text(cell.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The cell as written in the source file.
    pub fn as_text(&self) -> Option<String> {
        self.as_str().map(str::to_string)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Number { raw: s, .. } => Some(s),
            Value::Missing => None,
        }
    }
}

/// Cell `idx` of `row`, or [`Value::Missing`] past the end of a short row.
pub fn cell(row: &[Value], idx: usize) -> &Value {
    row.get(idx).unwrap_or(&MISSING)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => Ok(()),
        }
    }
}

/// Untyped table as read from a delimited file: a header row plus records
/// whose cells line up with the headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Look up a cell by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// One incident inside the target region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentRecord {
    pub year: i32,
    pub month: u32,
    pub occurred_on: NaiveDate,
    pub cause_category: Option<String>,
    pub sub_region: Option<String>,
    pub death_count: u32,
    pub injury_count: u32,
    pub property_damage_amount: f64,
}

/// One weather observation inside the target region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub precipitation_mm: Option<f64>,
}

fn display_opt(v: &Option<f64>) -> String {
    match v {
        Some(n) => format!("{:.2}", n),
        None => "-".to_string(),
    }
}

fn display_f2(v: &f64) -> String {
    format!("{:.2}", v)
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthlyIncidentSummary {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthlyWeatherSummary {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "MeanTemperatureC")]
    #[tabled(rename = "MeanTemperatureC", display_with = "display_opt")]
    pub mean_temperature_c: Option<f64>,
    #[serde(rename = "MeanHumidityPct")]
    #[tabled(rename = "MeanHumidityPct", display_with = "display_opt")]
    pub mean_humidity_pct: Option<f64>,
    #[serde(rename = "PrecipitationMm")]
    #[tabled(rename = "PrecipitationMm", display_with = "display_f2")]
    pub total_precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DailyIncidentSummary {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DailyWeatherSummary {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "MeanTemperatureC")]
    #[tabled(rename = "MeanTemperatureC", display_with = "display_opt")]
    pub mean_temperature_c: Option<f64>,
    #[serde(rename = "MeanHumidityPct")]
    #[tabled(rename = "MeanHumidityPct", display_with = "display_opt")]
    pub mean_humidity_pct: Option<f64>,
    #[serde(rename = "PrecipitationMm")]
    #[tabled(rename = "PrecipitationMm", display_with = "display_f2")]
    pub total_precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CauseSummary {
    #[serde(rename = "CauseCategory")]
    #[tabled(rename = "CauseCategory")]
    pub cause_category: String,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct SubRegionSummary {
    #[serde(rename = "SubRegion")]
    #[tabled(rename = "SubRegion")]
    pub sub_region: String,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthlyMerged {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
    #[serde(rename = "MeanTemperatureC")]
    #[tabled(rename = "MeanTemperatureC", display_with = "display_opt")]
    pub mean_temperature_c: Option<f64>,
    #[serde(rename = "MeanHumidityPct")]
    #[tabled(rename = "MeanHumidityPct", display_with = "display_opt")]
    pub mean_humidity_pct: Option<f64>,
    #[serde(rename = "PrecipitationMm")]
    #[tabled(rename = "PrecipitationMm", display_with = "display_f2")]
    pub total_precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DailyMerged {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
    #[serde(rename = "MeanTemperatureC")]
    #[tabled(rename = "MeanTemperatureC", display_with = "display_opt")]
    pub mean_temperature_c: Option<f64>,
    #[serde(rename = "MeanHumidityPct")]
    #[tabled(rename = "MeanHumidityPct", display_with = "display_opt")]
    pub mean_humidity_pct: Option<f64>,
    #[serde(rename = "PrecipitationMm")]
    #[tabled(rename = "PrecipitationMm", display_with = "display_f2")]
    pub total_precipitation_mm: f64,
}

/// One day of the weather page's variable-vs-count view.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DailyVariableRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value", display_with = "display_opt")]
    pub value: Option<f64>,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount")]
    pub incident_count: usize,
}

/// One point of a month-of-year trend (months 1-12, zero filled).
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthTrendRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: u64,
}

/// One row of the correlation matrix; `None` where a coefficient is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CorrelationRow {
    #[serde(rename = "Variable")]
    #[tabled(rename = "Variable")]
    pub variable: String,
    #[serde(rename = "IncidentCount")]
    #[tabled(rename = "IncidentCount", display_with = "display_opt")]
    pub incident_count: Option<f64>,
    #[serde(rename = "TemperatureC")]
    #[tabled(rename = "TemperatureC", display_with = "display_opt")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "HumidityPct")]
    #[tabled(rename = "HumidityPct", display_with = "display_opt")]
    pub humidity_pct: Option<f64>,
    #[serde(rename = "PrecipitationMm")]
    #[tabled(rename = "PrecipitationMm", display_with = "display_opt")]
    pub precipitation_mm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewKpis {
    pub incident_count: usize,
    pub casualties: u64,
    /// Property damage in units of 100 million, rounded to two decimals.
    pub property_damage_100m: f64,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub incident_rows: usize,
    pub weather_rows: usize,
    pub population_rows: usize,
    pub read_quality: Vec<ReadQuality>,
    pub monthly_merged_rows: usize,
    pub daily_merged_rows: usize,
    pub overview: Option<OverviewKpis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadQuality {
    pub dataset: String,
    pub encoding: String,
    pub degraded: bool,
    pub dropped_bytes: usize,
}
