use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::schema::sighting;

/// One row of the normalized sightings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SightingRecord {
    pub date: Option<NaiveDate>,
    pub group: Option<String>,
    pub individual: Option<String>,
    pub location: Option<String>,
    pub sex: Option<String>,
    pub strands: Option<String>,
    /// Comma-separated names of everyone seen in the sighting.
    pub individuals_present: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub link: Option<String>,
}

/// 1970-01-01.
fn unix_epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Polars stores `Date` as days since the Unix epoch.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - unix_epoch()).num_days() as i32
}

pub fn date_from_days(days: i32) -> Option<NaiveDate> {
    unix_epoch().checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// Materialize the rows of a normalized table.
///
/// Expects `Fecha` as `Date`, `Latitud`/`Longitud` as `Float64` and every
/// other column as `String`.
pub fn records(df: &DataFrame) -> Result<Vec<SightingRecord>> {
    let dates = df.column(sighting::DATE)?.cast(&DataType::Int32)?;
    let dates = dates.i32()?;
    let groups = df.column(sighting::GROUP)?.str()?;
    let individuals = df.column(sighting::INDIVIDUAL)?.str()?;
    let locations = df.column(sighting::LOCATION)?.str()?;
    let sexes = df.column(sighting::SEX)?.str()?;
    let strands = df.column(sighting::STRANDS)?.str()?;
    let present = df.column(sighting::PARTICIPANTS)?.str()?;
    let latitudes = df.column(sighting::LATITUDE)?.f64()?;
    let longitudes = df.column(sighting::LONGITUDE)?.f64()?;
    let links = df.column(sighting::LINK)?.str()?;

    // Empty cells count as absent.
    let owned = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(SightingRecord {
            date: dates.get(i).and_then(date_from_days),
            group: owned(groups.get(i)),
            individual: owned(individuals.get(i)),
            location: owned(locations.get(i)),
            sex: owned(sexes.get(i)),
            strands: owned(strands.get(i)),
            individuals_present: owned(present.get(i)),
            latitude: latitudes.get(i),
            longitude: longitudes.get(i),
            link: owned(links.get(i)),
        });
    }
    Ok(rows)
}
