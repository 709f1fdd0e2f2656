// Region filtering and calendar-field derivation.
//
// Turns the untyped tables coming out of the reader into typed records for a
// single region. Any row inside the region that cannot be placed on the
// calendar aborts the whole load; rows outside the region are never inspected.
// Row numbers in errors count data rows of the filtered table, 1-based.
use crate::error::{PipelineError, Result};
use crate::types::{cell, IncidentRecord, RawTable, Value, WeatherRecord};
use crate::util::{parse_compact_date, parse_timestamp_date};
use chrono::Datelike;
use tracing::info;

const INCIDENTS: &str = "incidents";
const WEATHER: &str = "weather";

/// Header names of the incident file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentColumns {
    pub region: String,
    pub sub_region: String,
    pub occurred_on: String,
    pub year: String,
    pub month: String,
    pub cause_category: String,
    pub deaths: String,
    pub injuries: String,
    pub property_damage: String,
}

impl Default for IncidentColumns {
    fn default() -> Self {
        Self {
            region: "GRNDS_CTPV_NM".to_string(),
            sub_region: "GRNDS_SGG_NM".to_string(),
            occurred_on: "OCRN_YMD".to_string(),
            year: "OCRN_YR".to_string(),
            month: "OCRN_MM".to_string(),
            cause_category: "IGTN_DMNT_LCLSF_NM".to_string(),
            deaths: "DTH_CNT".to_string(),
            injuries: "INJPSN_CNT".to_string(),
            property_damage: "PRPT_DAM_AMT".to_string(),
        }
    }
}

/// Header names of the weather file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherColumns {
    pub station: String,
    pub observed_at: String,
    pub temperature: String,
    pub humidity: String,
    pub precipitation: String,
}

impl Default for WeatherColumns {
    fn default() -> Self {
        Self {
            station: "지점명".to_string(),
            observed_at: "일시".to_string(),
            temperature: "기온(°C)".to_string(),
            humidity: "습도(%)".to_string(),
            precipitation: "강수량(mm)".to_string(),
        }
    }
}

fn column(table: &RawTable, dataset: &'static str, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::MissingColumn {
            dataset,
            column: name.to_string(),
        })
}

fn in_region(value: &Value, region: &str) -> bool {
    value.as_str() == Some(region)
}

/// Rows of `dataset` whose `region_column` equals `region` exactly, as a new
/// table. The input is left untouched.
pub fn filter_region(
    table: &RawTable,
    dataset: &'static str,
    region_column: &str,
    region: &str,
) -> Result<RawTable> {
    let idx = column(table, dataset, region_column)?;
    let rows = table
        .rows
        .iter()
        .filter(|row| in_region(cell(row, idx), region))
        .cloned()
        .collect();
    Ok(RawTable::new(table.headers.clone(), rows))
}

struct Field<'a> {
    dataset: &'static str,
    row: usize,
    column: &'a str,
    value: &'a Value,
}

impl Field<'_> {
    fn invalid(&self) -> PipelineError {
        PipelineError::InvalidField {
            dataset: self.dataset,
            row: self.row,
            column: self.column.to_string(),
            value: self.value.as_text().unwrap_or_default(),
        }
    }

    fn integer(&self) -> Result<i64> {
        match self.value {
            Value::Number { value: n, .. } if n.fract() == 0.0 && n.abs() < 1e15 => Ok(*n as i64),
            _ => Err(self.invalid()),
        }
    }

    /// Non-negative count; missing counts as zero.
    fn count(&self) -> Result<u32> {
        if self.value.is_missing() {
            return Ok(0);
        }
        let n = self.integer()?;
        u32::try_from(n).map_err(|_| self.invalid())
    }

    /// Non-negative amount; missing counts as zero.
    fn amount(&self) -> Result<f64> {
        match self.value {
            Value::Missing => Ok(0.0),
            Value::Number { value: n, .. } if *n >= 0.0 => Ok(*n),
            _ => Err(self.invalid()),
        }
    }

    fn optional_number(&self) -> Result<Option<f64>> {
        match self.value {
            Value::Missing => Ok(None),
            Value::Number { value: n, .. } => Ok(Some(*n)),
            Value::Text(_) => Err(self.invalid()),
        }
    }

    fn optional_text(&self) -> Option<String> {
        self.value.as_text()
    }
}

struct IncidentIndex {
    sub_region: usize,
    occurred_on: usize,
    year: usize,
    month: usize,
    cause_category: usize,
    deaths: usize,
    injuries: usize,
    property_damage: usize,
}

impl IncidentIndex {
    fn resolve(table: &RawTable, cols: &IncidentColumns) -> Result<Self> {
        Ok(Self {
            sub_region: column(table, INCIDENTS, &cols.sub_region)?,
            occurred_on: column(table, INCIDENTS, &cols.occurred_on)?,
            year: column(table, INCIDENTS, &cols.year)?,
            month: column(table, INCIDENTS, &cols.month)?,
            cause_category: column(table, INCIDENTS, &cols.cause_category)?,
            deaths: column(table, INCIDENTS, &cols.deaths)?,
            injuries: column(table, INCIDENTS, &cols.injuries)?,
            property_damage: column(table, INCIDENTS, &cols.property_damage)?,
        })
    }
}

fn field<'a>(
    dataset: &'static str,
    row_no: usize,
    row: &'a [Value],
    idx: usize,
    name: &'a str,
) -> Field<'a> {
    Field {
        dataset,
        row: row_no,
        column: name,
        value: cell(row, idx),
    }
}

/// Restrict the incident table to `region` and derive typed records.
///
/// Year and month are copied from their own columns and must agree with the
/// compact occurrence date, checked on the cell as written: `20240101.0`
/// is not a date even though it reads as the same number.
pub fn load_incidents(
    table: &RawTable,
    region: &str,
    cols: &IncidentColumns,
) -> Result<Vec<IncidentRecord>> {
    let ix = IncidentIndex::resolve(table, cols)?;
    let regional = filter_region(table, INCIDENTS, &cols.region, region)?;
    let mut out = Vec::with_capacity(regional.len());

    for (i, row) in regional.rows.iter().enumerate() {
        let row_no = i + 1;

        let raw_date = cell(row, ix.occurred_on).as_str().unwrap_or_default();
        let occurred_on = parse_compact_date(raw_date).ok_or_else(|| PipelineError::DateParse {
            dataset: INCIDENTS,
            row: row_no,
            value: raw_date.to_string(),
        })?;

        let year_field = field(INCIDENTS, row_no, row, ix.year, &cols.year);
        let year = i32::try_from(year_field.integer()?).map_err(|_| year_field.invalid())?;
        let month_field = field(INCIDENTS, row_no, row, ix.month, &cols.month);
        let month = match month_field.integer()? {
            m @ 1..=12 => m as u32,
            _ => return Err(month_field.invalid()),
        };
        if occurred_on.year() != year || occurred_on.month() != month {
            return Err(PipelineError::InconsistentCalendar {
                row: row_no,
                date: occurred_on,
                year,
                month,
            });
        }

        out.push(IncidentRecord {
            year,
            month,
            occurred_on,
            cause_category: field(INCIDENTS, row_no, row, ix.cause_category, &cols.cause_category)
                .optional_text(),
            sub_region: field(INCIDENTS, row_no, row, ix.sub_region, &cols.sub_region)
                .optional_text(),
            death_count: field(INCIDENTS, row_no, row, ix.deaths, &cols.deaths).count()?,
            injury_count: field(INCIDENTS, row_no, row, ix.injuries, &cols.injuries).count()?,
            property_damage_amount: field(
                INCIDENTS,
                row_no,
                row,
                ix.property_damage,
                &cols.property_damage,
            )
            .amount()?,
        });
    }

    info!(region, rows = out.len(), "incidents filtered");
    Ok(out)
}

/// Restrict the weather table to `station` and derive typed records.
///
/// The observation timestamp is reduced to its calendar date; year and month
/// come from that date.
pub fn load_weather(
    table: &RawTable,
    station: &str,
    cols: &WeatherColumns,
) -> Result<Vec<WeatherRecord>> {
    let observed_ix = column(table, WEATHER, &cols.observed_at)?;
    let temp_ix = column(table, WEATHER, &cols.temperature)?;
    let hum_ix = column(table, WEATHER, &cols.humidity)?;
    let precip_ix = column(table, WEATHER, &cols.precipitation)?;
    let regional = filter_region(table, WEATHER, &cols.station, station)?;
    let mut out = Vec::with_capacity(regional.len());

    for (i, row) in regional.rows.iter().enumerate() {
        let row_no = i + 1;

        let raw = cell(row, observed_ix).as_str().unwrap_or_default();
        let date = parse_timestamp_date(raw).ok_or_else(|| PipelineError::DateParse {
            dataset: WEATHER,
            row: row_no,
            value: raw.to_string(),
        })?;

        let precip_field = field(WEATHER, row_no, row, precip_ix, &cols.precipitation);
        let precipitation_mm = precip_field.optional_number()?;
        if precipitation_mm.is_some_and(|p| p < 0.0) {
            return Err(precip_field.invalid());
        }

        out.push(WeatherRecord {
            date,
            year: date.year(),
            month: date.month(),
            temperature_c: field(WEATHER, row_no, row, temp_ix, &cols.temperature)
                .optional_number()?,
            humidity_pct: field(WEATHER, row_no, row, hum_ix, &cols.humidity).optional_number()?,
            precipitation_mm,
        });
    }

    info!(station, rows = out.len(), "weather filtered");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn incident_table(rows: &[[&str; 9]]) -> RawTable {
        let cols = IncidentColumns::default();
        let headers = vec![
            cols.region,
            cols.sub_region,
            cols.occurred_on,
            cols.year,
            cols.month,
            cols.cause_category,
            cols.deaths,
            cols.injuries,
            cols.property_damage,
        ];
        RawTable::new(
            headers,
            rows.iter()
                .map(|r| r.iter().map(|c| Value::from_cell(c)).collect())
                .collect(),
        )
    }

    fn weather_table(rows: &[[&str; 5]]) -> RawTable {
        let cols = WeatherColumns::default();
        let headers = vec![
            cols.station,
            cols.observed_at,
            cols.temperature,
            cols.humidity,
            cols.precipitation,
        ];
        RawTable::new(
            headers,
            rows.iter()
                .map(|r| r.iter().map(|c| Value::from_cell(c)).collect())
                .collect(),
        )
    }

    const SEOUL: &str = "서울특별시";

    #[test]
    fn test_load_incidents_filters_region_and_derives_dates() {
        let table = incident_table(&[
            [SEOUL, "강남구", "20240101", "2024", "1", "전기적요인", "0", "1", "1500000"],
            ["부산광역시", "해운대구", "20240102", "2024", "1", "부주의", "0", "0", "0"],
            [SEOUL, "마포구", "20240215", "2024", "2", "부주의", "1", "", ""],
        ]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].occurred_on, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(records[0].sub_region.as_deref(), Some("강남구"));
        assert_eq!(records[0].injury_count, 1);
        assert_eq!(records[0].property_damage_amount, 1_500_000.0);

        assert_eq!((records[1].year, records[1].month), (2024, 2));
        assert_eq!(records[1].death_count, 1);
        assert_eq!(records[1].injury_count, 0);
        assert_eq!(records[1].property_damage_amount, 0.0);
    }

    #[test]
    fn test_region_match_is_exact() {
        let table = incident_table(&[
            ["서울특별시 ", "강남구", "20240101", "2024", "1", "x", "0", "0", "0"],
            ["서울", "강남구", "20240101", "2024", "1", "x", "0", "0", "0"],
        ]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unmatched_region_yields_empty_not_error() {
        let table = incident_table(&[["부산광역시", "x", "20240101", "2024", "1", "x", "0", "0", "0"]]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bad_date_inside_region_is_error() {
        let table = incident_table(&[[SEOUL, "x", "20241301", "2024", "13", "x", "0", "0", "0"]]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DateParse { row: 1, .. }));

        let table = incident_table(&[[SEOUL, "x", "2024011", "2024", "1", "x", "0", "0", "0"]]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DateParse { .. }));
    }

    #[test]
    fn test_bad_date_outside_region_is_ignored() {
        let table = incident_table(&[
            ["부산광역시", "x", "garbage", "2024", "1", "x", "0", "0", "0"],
            [SEOUL, "x", "20240101", "2024", "1", "x", "0", "0", "0"],
        ]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_inconsistent_year_month_is_error() {
        let table = incident_table(&[[SEOUL, "x", "20240101", "2024", "2", "x", "0", "0", "0"]]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InconsistentCalendar { month: 2, .. }));
    }

    #[test]
    fn test_negative_count_is_invalid() {
        let table = incident_table(&[[SEOUL, "x", "20240101", "2024", "1", "x", "-1", "0", "0"]]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidField { .. }));
    }

    #[test]
    fn test_missing_cause_stays_none() {
        let table = incident_table(&[[SEOUL, "", "20240101", "2024", "1", "", "0", "0", "0"]]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert_eq!(records[0].cause_category, None);
        assert_eq!(records[0].sub_region, None);
    }

    #[test]
    fn test_missing_column_is_error() {
        let table = RawTable::new(vec!["GRNDS_CTPV_NM".to_string()], vec![]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_filter_region_is_idempotent_and_leaves_input() {
        let table = incident_table(&[
            [SEOUL, "a", "20240101", "2024", "1", "x", "0", "0", "0"],
            ["부산광역시", "b", "20240101", "2024", "1", "x", "0", "0", "0"],
            [SEOUL, "c", "20240102", "2024", "1", "x", "0", "0", "0"],
        ]);
        let once = filter_region(&table, INCIDENTS, "GRNDS_CTPV_NM", SEOUL).unwrap();
        let twice = filter_region(&once, INCIDENTS, "GRNDS_CTPV_NM", SEOUL).unwrap();
        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_filter_region_missing_column_names_dataset() {
        let table = weather_table(&[["서울", "2024-01-01 00:00", "1", "1", "0"]]);
        let err = filter_region(&table, WEATHER, "station", "서울").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { dataset: "weather", ref column } if column == "station"
        ));
    }

    #[test]
    fn test_error_rows_count_within_region() {
        let table = incident_table(&[
            ["부산광역시", "x", "20240101", "2024", "1", "x", "0", "0", "0"],
            ["부산광역시", "x", "20240101", "2024", "1", "x", "0", "0", "0"],
            [SEOUL, "x", "20240101", "2024", "1", "x", "0", "0", "0"],
            [SEOUL, "x", "bad", "2024", "1", "x", "0", "0", "0"],
        ]);
        let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DateParse { row: 2, .. }));
    }

    #[test]
    fn test_leading_zero_date_is_accepted() {
        let table = incident_table(&[[SEOUL, "x", "09991231", "999", "12", "x", "0", "0", "0"]]);
        let records = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap();
        assert_eq!(records[0].occurred_on, NaiveDate::from_ymd_opt(999, 12, 31).unwrap());
        assert_eq!(records[0].year, 999);
    }

    #[test]
    fn test_numeric_lookalike_date_is_rejected() {
        for written in ["20240101.0", "2.0240101e7", "+20240101"] {
            let table = incident_table(&[[SEOUL, "x", written, "2024", "1", "x", "0", "0", "0"]]);
            let err = load_incidents(&table, SEOUL, &IncidentColumns::default()).unwrap_err();
            assert!(
                matches!(err, PipelineError::DateParse { ref value, .. } if value == written),
                "{written} should not parse"
            );
        }
    }

    #[test]
    fn test_short_rows_read_as_missing() {
        let cols = IncidentColumns::default();
        let headers = vec![
            cols.region.clone(),
            cols.sub_region.clone(),
            cols.occurred_on.clone(),
            cols.year.clone(),
            cols.month.clone(),
            cols.cause_category.clone(),
            cols.deaths.clone(),
            cols.injuries.clone(),
            cols.property_damage.clone(),
        ];
        let row = ["서울특별시", "강남구", "20240101", "2024", "1"]
            .iter()
            .map(|c| Value::from_cell(c))
            .collect();
        let table = RawTable::new(headers, vec![row, vec![]]);
        let records = load_incidents(&table, SEOUL, &cols).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cause_category, None);
        assert_eq!(records[0].death_count, 0);
        assert_eq!(records[0].property_damage_amount, 0.0);

        let wcols = WeatherColumns::default();
        let weather = RawTable::new(
            vec![
                wcols.station.clone(),
                wcols.observed_at.clone(),
                wcols.temperature.clone(),
                wcols.humidity.clone(),
                wcols.precipitation.clone(),
            ],
            vec![vec![Value::from_cell("서울"), Value::from_cell("2024-01-01")]],
        );
        let records = load_weather(&weather, "서울", &wcols).unwrap();
        assert_eq!(records[0].temperature_c, None);
        assert_eq!(records[0].precipitation_mm, None);
    }

    #[test]
    fn test_load_weather_derives_calendar_fields() {
        let table = weather_table(&[
            ["서울", "2024-01-01 00:00", "-1.5", "60", ""],
            ["부산", "2024-01-01 00:00", "5.0", "50", "1.0"],
            ["서울", "2024-02-10 13:00", "3.0", "", "2.5"],
        ]);
        let records = load_weather(&table, "서울", &WeatherColumns::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(records[0].temperature_c, Some(-1.5));
        assert_eq!(records[0].precipitation_mm, None);
        assert_eq!((records[1].year, records[1].month), (2024, 2));
        assert_eq!(records[1].humidity_pct, None);
        assert_eq!(records[1].precipitation_mm, Some(2.5));
    }

    #[test]
    fn test_load_weather_bad_timestamp_is_error() {
        let table = weather_table(&[["서울", "not a time", "1", "1", "0"]]);
        let err = load_weather(&table, "서울", &WeatherColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DateParse { dataset: "weather", .. }));
    }

    #[test]
    fn test_load_weather_negative_precipitation_is_error() {
        let table = weather_table(&[["서울", "2024-01-01 00:00", "1", "1", "-0.5"]]);
        let err = load_weather(&table, "서울", &WeatherColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidField { .. }));
    }
}
