use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, ParseWarning, Result};
use crate::filter;
use crate::model::{self, SightingRecord};
use crate::schema::sighting;

/// The sightings table for a session: loaded once, normalized, then only
/// ever read. Share it behind an `Arc`.
#[derive(Clone)]
pub struct DatasetStore {
    path: PathBuf,
    table: DataFrame,
    records: Vec<SightingRecord>,
    warnings: Vec<ParseWarning>,
}

impl DatasetStore {
    /// Load and normalize the sightings CSV.
    ///
    /// Required columns: Fecha, Lugar, Orca, Orcas, Grupo, Sexo, Varadora,
    /// Latitud, Longitud, Link. Unparsable dates and coordinates become null
    /// and are reported through `warnings()`; the rows are kept.
    pub fn load(path: impl AsRef<Path>, config: &DashboardConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = read_csv_as_strings(&path)?;
        require_columns(&raw, &sighting::REQUIRED)?;

        let (table, warnings) = normalize(raw, &config.date_formats)?;
        let records = model::records(&table)?;

        info!(
            "Loaded {} sighting rows from {:?} ({} parse warnings)",
            table.height(),
            path,
            warnings.len()
        );

        Ok(Self {
            path,
            table,
            records,
            warnings,
        })
    }

    /// Wrap an already-normalized table.
    pub fn from_table(table: DataFrame) -> Result<Self> {
        require_columns(&table, &sighting::REQUIRED)?;
        let records = model::records(&table)?;
        Ok(Self {
            path: PathBuf::new(),
            table,
            records,
            warnings: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    pub fn records(&self) -> &[SightingRecord] {
        &self.records
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.height() == 0
    }

    /// Earliest and latest non-null sighting date.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        filter::date_bounds(&self.records)
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(DashboardError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("dataset not found: {}", path.display()),
        )));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(DashboardError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Parse `Fecha` to `Date` and the coordinates to `Float64`.
fn normalize(
    mut df: DataFrame,
    date_formats: &[String],
) -> Result<(DataFrame, Vec<ParseWarning>)> {
    let mut warnings = Vec::new();

    let days: Vec<Option<i32>> = parse_column(&df, sighting::DATE, &mut warnings, |s| {
        parse_date(s, date_formats).map(model::days_since_epoch)
    })?;
    let latitudes = parse_column(&df, sighting::LATITUDE, &mut warnings, parse_coordinate)?;
    let longitudes = parse_column(&df, sighting::LONGITUDE, &mut warnings, parse_coordinate)?;

    let dates = Series::new(sighting::DATE.into(), &days).cast(&DataType::Date)?;
    df.with_column(dates)?;
    df.with_column(Series::new(sighting::LATITUDE.into(), &latitudes))?;
    df.with_column(Series::new(sighting::LONGITUDE.into(), &longitudes))?;

    Ok((df, warnings))
}

/// Apply `parse` to every cell of a string column. Blank cells become null
/// silently; cells `parse` rejects become null with a warning.
fn parse_column<T>(
    df: &DataFrame,
    column: &'static str,
    warnings: &mut Vec<ParseWarning>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    let values = df.column(column)?.str()?;
    let mut out = Vec::with_capacity(df.height());
    for (row, cell) in values.into_iter().enumerate() {
        let Some(text) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
            out.push(None);
            continue;
        };
        let parsed = parse(text);
        if parsed.is_none() {
            warn!("Row {row}: unparsable {column} value '{text}', set to null");
            warnings.push(ParseWarning {
                row,
                column,
                value: text.to_string(),
            });
        }
        out.push(parsed);
    }
    Ok(out)
}

/// Try each format in turn. Formats with a time part keep only the date.
pub(crate) fn parse_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date()))
    })
}

fn parse_coordinate(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const HEADER: &str = "Fecha,Lugar,Orca,Orcas,Grupo,Sexo,Varadora,Latitud,Longitud,Link";

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("Orcas.csv");
        fs::write(&path, format!("{HEADER}\n{body}")).unwrap();
        path
    }

    #[test]
    fn load_normalizes_dates_and_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "2023-03-14,Punta Norte,Mel,\"Mel, Pao\",G1,♀,Sí,-42.08,-63.77,\
             https://example.org/1\n\
             15/03/2023,Caleta Valdés,Pao,\"Mel, Pao\",G1,♂,No,-42.30,-63.60,\n",
        );

        let store = DatasetStore::load(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.warnings().is_empty());

        let rows = store.records();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2023, 3, 14));
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2023, 3, 15));
        assert_eq!(rows[0].latitude, Some(-42.08));
        assert_eq!(rows[0].individuals_present.as_deref(), Some("Mel, Pao"));
        assert_eq!(rows[1].link, None);
        assert_eq!(
            store.table().column(sighting::DATE).unwrap().dtype(),
            &DataType::Date
        );
    }

    #[test]
    fn bad_cells_are_nulled_and_reported_without_dropping_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "not a date,Punta Norte,Mel,Mel,G1,♀,No,abc,-63.77,\n\
             2023-03-15,Punta Norte,Pao,Pao,G1,♂,No,-42.3,-63.6,\n",
        );

        let store = DatasetStore::load(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(store.len(), 2);

        let rows = store.records();
        assert_eq!(rows[0].date, None);
        assert_eq!(rows[0].latitude, None);
        assert_eq!(rows[0].longitude, Some(-63.77));
        assert_eq!(rows[1].latitude, Some(-42.3));

        let columns: Vec<&str> = store.warnings().iter().map(|w| w.column).collect();
        assert_eq!(columns, vec![sighting::DATE, sighting::LATITUDE]);
        assert!(store.warnings().iter().all(|w| w.row == 0));
    }

    #[test]
    fn missing_column_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Orcas.csv");
        fs::write(&path, "Fecha,Lugar,Orca\n2023-01-01,X,Y\n").unwrap();

        let err = DatasetStore::load(&path, &DashboardConfig::default())
            .err()
            .unwrap();
        assert!(err.is_data_load());
        assert!(matches!(err, DashboardError::MissingColumn(ref c) if c == "Orcas"));
    }

    #[test]
    fn missing_file_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetStore::load(dir.path().join("nope.csv"), &DashboardConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, DashboardError::Io(_)));
    }

    #[test]
    fn date_formats_are_tried_in_order() {
        let formats = DashboardConfig::default().date_formats;
        assert_eq!(
            parse_date("2022-12-01 10:30:00", &formats),
            NaiveDate::from_ymd_opt(2022, 12, 1)
        );
        assert_eq!(
            parse_date("01/12/2022", &formats),
            NaiveDate::from_ymd_opt(2022, 12, 1)
        );
        assert_eq!(parse_date("Dec 1st", &formats), None);
    }

    #[test]
    fn infinite_coordinates_are_rejected() {
        assert_eq!(parse_coordinate("inf"), None);
        assert_eq!(parse_coordinate("-42.5"), Some(-42.5));
    }
}
