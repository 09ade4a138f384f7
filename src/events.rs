use std::collections::HashSet;
use std::fmt::Write as FmtWrite;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::model::{days_since_epoch, SightingRecord};
use crate::schema::sighting;

/// A deduplicated sighting with coordinates, one map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Raw participant list as recorded.
    pub individuals_present: Option<String>,
    pub link: Option<String>,
}

impl Event {
    pub fn participants(&self) -> Vec<&str> {
        self.individuals_present
            .as_deref()
            .map(parse_participants)
            .unwrap_or_default()
    }

    /// Popup body for the map marker. Values are HTML-escaped; the link
    /// line is left out when there is no link.
    pub fn popup_html(&self) -> String {
        let mut html =
            String::from(r#"<div style="width:220px; font-family:Arial; font-size:13px">"#);
        // write! into a String cannot fail
        let _ = write!(
            html,
            "<strong>Individuals in the sighting:</strong><br> {}<br>\
             <strong>Location:</strong> {}<br>\
             <strong>Date:</strong> {}<br>",
            escape_html(self.individuals_present.as_deref().unwrap_or("")),
            escape_html(self.location.as_deref().unwrap_or("")),
            self.date.map(|d| d.to_string()).unwrap_or_default(),
        );
        if let Some(link) = self.link.as_deref() {
            let _ = write!(
                html,
                r#"<br><a href="{}" target="_blank" style="color:#0077cc">Open post</a>"#,
                escape_html(link)
            );
        }
        html.push_str("</div>");
        html
    }
}

/// Split a participant list on commas, trimming each name. Empty names are
/// dropped.
pub fn parse_participants(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// One event per distinct (date, location, latitude, longitude,
/// participants, link), in first-seen order. Rows missing either coordinate
/// are skipped.
pub fn build_events<'a, I>(rows: I) -> Vec<Event>
where
    I: IntoIterator<Item = &'a SightingRecord>,
{
    let mut seen = HashSet::new();
    let mut events = Vec::new();
    for row in rows {
        let (Some(latitude), Some(longitude)) = (row.latitude, row.longitude) else {
            continue;
        };
        let key = (
            row.date,
            row.location.as_deref(),
            latitude.to_bits(),
            longitude.to_bits(),
            row.individuals_present.as_deref(),
            row.link.as_deref(),
        );
        if seen.insert(key) {
            events.push(Event {
                date: row.date,
                location: row.location.clone(),
                latitude,
                longitude,
                individuals_present: row.individuals_present.clone(),
                link: row.link.clone(),
            });
        }
    }
    events
}

/// Keep events where at least one participant is in `valid`.
pub fn filter_events_by_known_individuals(
    events: Vec<Event>,
    valid: &HashSet<String>,
) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| event.participants().iter().any(|name| valid.contains(*name)))
        .collect()
}

pub fn events_frame(events: &[Event]) -> Result<DataFrame> {
    let dates: Vec<Option<i32>> = events.iter().map(|e| e.date.map(days_since_epoch)).collect();
    let locations: Vec<Option<&str>> = events.iter().map(|e| e.location.as_deref()).collect();
    let latitudes: Vec<f64> = events.iter().map(|e| e.latitude).collect();
    let longitudes: Vec<f64> = events.iter().map(|e| e.longitude).collect();
    let present: Vec<Option<&str>> = events
        .iter()
        .map(|e| e.individuals_present.as_deref())
        .collect();
    let links: Vec<Option<&str>> = events.iter().map(|e| e.link.as_deref()).collect();
    let popups: Vec<String> = events.iter().map(Event::popup_html).collect();

    let dates = Series::new(sighting::DATE.into(), &dates).cast(&DataType::Date)?;
    Ok(DataFrame::new(vec![
        dates.into(),
        Column::new(sighting::LOCATION.into(), &locations),
        Column::new(sighting::LATITUDE.into(), &latitudes),
        Column::new(sighting::LONGITUDE.into(), &longitudes),
        Column::new(sighting::PARTICIPANTS.into(), &present),
        Column::new(sighting::LINK.into(), &links),
        Column::new("popup".into(), &popups),
    ])?)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{Row, TableBuilder};
    use crate::model::records;

    fn event(present: &str) -> Event {
        Event {
            date: NaiveDate::from_ymd_opt(2023, 9, 1),
            location: Some("Punta Norte".into()),
            latitude: -42.08,
            longitude: -63.77,
            individuals_present: Some(present.into()),
            link: None,
        }
    }

    #[test]
    fn participants_are_trimmed_and_empty_tokens_dropped() {
        assert_eq!(parse_participants(" Mel ,Pao,, Sol ,"), vec!["Mel", "Pao", "Sol"]);
        assert!(parse_participants(" , ").is_empty());
    }

    #[test]
    fn rows_of_one_sighting_collapse_to_one_event() {
        let df = TableBuilder::default()
            .row(Row {
                individual: "Mel",
                present: "Mel, Pao",
                ..Row::default()
            })
            .row(Row {
                individual: "Pao",
                present: "Mel, Pao",
                ..Row::default()
            })
            .row(Row {
                individual: "Sol",
                present: "Sol",
                coords: None,
                ..Row::default()
            })
            .row(Row {
                individual: "Mel",
                present: "Mel, Pao",
                link: Some("https://example.org/p/9"),
                ..Row::default()
            })
            .row(Row {
                individual: "Pao",
                present: "Mel, Pao",
                coords: Some((-42.30, -63.60)),
                ..Row::default()
            })
            .build();
        let rows = records(&df).unwrap();

        let events = build_events(&rows);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].link, None);
        assert_eq!(events[1].link.as_deref(), Some("https://example.org/p/9"));
        // Same date, place and participants, but another position.
        assert_eq!(events[2].date, events[0].date);
        assert_eq!(events[2].location, events[0].location);
        assert_eq!((events[2].latitude, events[2].longitude), (-42.30, -63.60));
    }

    #[test]
    fn one_valid_participant_keeps_the_event() {
        let valid: HashSet<String> = ["Pao".to_string()].into();
        let kept = filter_events_by_known_individuals(
            vec![event("Mel, Pao, Sol, Luz, Kai"), event("Mel, Sol"), event("")],
            &valid,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].participants().len(), 5);
    }

    #[test]
    fn popup_escapes_and_omits_missing_link() {
        let html = event("Mel <b>").popup_html();
        assert!(html.contains("Mel &lt;b&gt;"));
        assert!(html.contains("2023-09-01"));
        assert!(!html.contains("href"));

        let mut linked = event("Mel");
        linked.link = Some("https://example.org/p?a=1&b=2".into());
        assert!(linked
            .popup_html()
            .contains(r#"href="https://example.org/p?a=1&amp;b=2""#));
    }

    #[test]
    fn events_frame_has_one_row_per_event() {
        let frame = events_frame(&[event("Mel"), event("Pao")]).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 7);
    }
}
