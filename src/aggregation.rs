use std::collections::{BTreeSet, HashMap, HashSet};

use polars::prelude::*;
use serde::Serialize;

use crate::config::Sentinels;
use crate::error::Result;
use crate::filter::Dimension;
use crate::model::SightingRecord;
use crate::schema::{catalog, counts};

/// Dimension a category chart can group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Sex,
    Individual,
    Group,
    Location,
    Strands,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Sex,
        Category::Individual,
        Category::Group,
        Category::Location,
        Category::Strands,
    ];

    /// Categories worth charting for the current individual selection:
    /// with a single individual picked, only where and who.
    pub fn options(selected_individuals: &BTreeSet<String>) -> Vec<Category> {
        if selected_individuals.len() == 1 {
            vec![Category::Location, Category::Individual]
        } else {
            Self::ALL.to_vec()
        }
    }

    pub fn dimension(self) -> Dimension {
        match self {
            Self::Sex => Dimension::Sex,
            Self::Individual => Dimension::Individual,
            Self::Group => Dimension::Group,
            Self::Location => Dimension::Location,
            Self::Strands => Dimension::Strands,
        }
    }

    pub fn column(self) -> &'static str {
        self.dimension().column()
    }

    pub fn value(self, record: &SightingRecord) -> Option<&str> {
        self.dimension().value(record)
    }
}

/// One bar of a category chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Count non-null values, most frequent first. Equal counts keep the order
/// in which the values first appear.
pub fn value_counts<'a, I>(rows: I, category: Category) -> Vec<ValueCount>
where
    I: IntoIterator<Item = &'a SightingRecord>,
{
    let mut order: Vec<ValueCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        let Some(value) = category.value(row) else {
            continue;
        };
        match index.get(value) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(value, order.len());
                order.push(ValueCount {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }
    // stable
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order
}

/// Number of distinct non-null values.
pub fn count_unique<'a, I>(rows: I, category: Category) -> usize
where
    I: IntoIterator<Item = &'a SightingRecord>,
{
    rows.into_iter()
        .filter_map(|r| category.value(r))
        .collect::<HashSet<_>>()
        .len()
}

/// First row per individual, in table order. Rows without an individual
/// are dropped.
pub fn dedup_by_individual(rows: &[SightingRecord]) -> Vec<&SightingRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| {
            r.individual
                .as_deref()
                .is_some_and(|name| seen.insert(name))
        })
        .collect()
}

/// Convert counts into a two-column frame for chart renderers.
pub fn counts_frame(values: &[ValueCount]) -> Result<DataFrame> {
    let names: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
    let totals: Vec<u64> = values.iter().map(|v| v.count as u64).collect();
    Ok(DataFrame::new(vec![
        Column::new(counts::VALUE.into(), &names),
        Column::new(counts::COUNT.into(), &totals),
    ])?)
}

// ── Summary ─────────────────────────────────────────────────────────────────

/// One individual in the downloadable catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CatalogEntry {
    pub individual: String,
    pub sex: Option<String>,
    pub group: Option<String>,
    pub strands: Option<String>,
}

/// Headline metrics and breakdowns of the "general data" view. Everything
/// here is counted once per individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_individuals: usize,
    pub females: usize,
    pub males: usize,
    pub stranders: usize,
    pub groups: usize,
    pub group_distribution: Vec<ValueCount>,
    pub sex_distribution: Vec<ValueCount>,
    /// Names of individuals recorded as stranding, sorted.
    pub stranding_individuals: Vec<String>,
    pub catalog: Vec<CatalogEntry>,
}

impl Summary {
    pub fn compute(rows: &[SightingRecord], sentinels: &Sentinels) -> Self {
        let unique = dedup_by_individual(rows);

        let with = |category: Category, value: &str| {
            count_unique(
                unique
                    .iter()
                    .copied()
                    .filter(|r| category.value(r) == Some(value)),
                Category::Individual,
            )
        };

        let mut stranding_individuals: Vec<String> = unique
            .iter()
            .filter(|r| r.strands.as_deref() == Some(sentinels.strands_yes.as_str()))
            .filter_map(|r| r.individual.clone())
            .collect();
        stranding_individuals.sort();

        Self {
            total_individuals: count_unique(unique.iter().copied(), Category::Individual),
            females: with(Category::Sex, &sentinels.female),
            males: with(Category::Sex, &sentinels.male),
            stranders: with(Category::Strands, &sentinels.strands_yes),
            groups: count_unique(unique.iter().copied(), Category::Group),
            group_distribution: value_counts(unique.iter().copied(), Category::Group),
            sex_distribution: value_counts(unique.iter().copied(), Category::Sex),
            stranding_individuals,
            catalog: build_catalog(&unique),
        }
    }
}

/// Catalog rows sorted by individual name.
pub fn build_catalog(unique: &[&SightingRecord]) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = unique
        .iter()
        .filter_map(|r| {
            Some(CatalogEntry {
                individual: r.individual.clone()?,
                sex: r.sex.clone(),
                group: r.group.clone(),
                strands: r.strands.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.individual.cmp(&b.individual));
    entries
}

pub fn catalog_frame(entries: &[CatalogEntry]) -> Result<DataFrame> {
    let individuals: Vec<&str> = entries.iter().map(|e| e.individual.as_str()).collect();
    let sexes: Vec<Option<&str>> = entries.iter().map(|e| e.sex.as_deref()).collect();
    let groups: Vec<Option<&str>> = entries.iter().map(|e| e.group.as_deref()).collect();
    let strands: Vec<Option<&str>> = entries.iter().map(|e| e.strands.as_deref()).collect();
    Ok(DataFrame::new(vec![
        Column::new(catalog::INDIVIDUAL.into(), &individuals),
        Column::new(catalog::SEX.into(), &sexes),
        Column::new(catalog::GROUP.into(), &groups),
        Column::new(catalog::STRANDS.into(), &strands),
    ])?)
}

/// UTF-8, comma-separated, with a header row.
pub fn catalog_csv(entries: &[CatalogEntry]) -> Result<Vec<u8>> {
    let mut df = catalog_frame(entries)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{Row, TableBuilder};
    use crate::model::records;

    fn rows() -> Vec<SightingRecord> {
        let df = TableBuilder::default()
            .row(Row {
                individual: "Mel",
                group: Some("G1"),
                location: "Punta Norte",
                strands: "Sí",
                ..Row::default()
            })
            .row(Row {
                individual: "Pao",
                group: Some("G2"),
                sex: "♂",
                location: "Caleta Valdés",
                ..Row::default()
            })
            .row(Row {
                individual: "Mel",
                group: Some("G1"),
                location: "Caleta Valdés",
                strands: "Sí",
                ..Row::default()
            })
            .row(Row {
                individual: "Sol",
                group: Some("G2"),
                location: "Punta Norte",
                ..Row::default()
            })
            .row(Row {
                individual: "Mel",
                group: Some("G1"),
                location: "Punta Pirámide",
                strands: "Sí",
                ..Row::default()
            })
            .build();
        records(&df).unwrap()
    }

    fn pairs(counts: &[ValueCount]) -> Vec<(&str, usize)> {
        counts.iter().map(|c| (c.value.as_str(), c.count)).collect()
    }

    #[test]
    fn value_counts_sort_descending_with_first_seen_ties() {
        let rows = rows();
        assert_eq!(
            pairs(&value_counts(&rows, Category::Location)),
            vec![("Punta Norte", 2), ("Caleta Valdés", 2), ("Punta Pirámide", 1)]
        );
        assert_eq!(
            pairs(&value_counts(&rows, Category::Individual)),
            vec![("Mel", 3), ("Pao", 1), ("Sol", 1)]
        );
    }

    #[test]
    fn value_counts_skip_null_values() {
        let df = TableBuilder::default()
            .row(Row {
                group: None,
                ..Row::default()
            })
            .row(Row::default())
            .build();
        let rows = records(&df).unwrap();
        assert_eq!(pairs(&value_counts(&rows, Category::Group)), vec![("G1", 1)]);
    }

    #[test]
    fn unique_count_is_bounded_by_row_count() {
        let rows = rows();
        let unique = count_unique(&rows, Category::Individual);
        assert_eq!(unique, 3);
        assert!(unique < rows.len());

        let deduped: Vec<SightingRecord> =
            dedup_by_individual(&rows).into_iter().cloned().collect();
        assert_eq!(count_unique(&deduped, Category::Individual), deduped.len());
    }

    #[test]
    fn dedup_keeps_first_row_per_individual() {
        let rows = rows();
        let unique = dedup_by_individual(&rows);
        let locations: Vec<_> = unique.iter().map(|r| r.location.as_deref().unwrap()).collect();
        assert_eq!(locations, vec!["Punta Norte", "Caleta Valdés", "Punta Norte"]);
    }

    #[test]
    fn summary_counts_individuals_not_rows() {
        let summary = Summary::compute(&rows(), &Sentinels::default());
        assert_eq!(summary.total_individuals, 3);
        assert_eq!(summary.females, 2);
        assert_eq!(summary.males, 1);
        assert_eq!(summary.stranders, 1);
        assert_eq!(summary.groups, 2);
        assert_eq!(pairs(&summary.group_distribution), vec![("G2", 2), ("G1", 1)]);
        assert_eq!(pairs(&summary.sex_distribution), vec![("♀", 2), ("♂", 1)]);
        assert_eq!(summary.stranding_individuals, vec!["Mel"]);

        let names: Vec<_> = summary.catalog.iter().map(|e| e.individual.as_str()).collect();
        assert_eq!(names, vec!["Mel", "Pao", "Sol"]);
    }

    #[test]
    fn summary_of_nothing_is_all_zero() {
        let summary = Summary::compute(&[], &Sentinels::default());
        assert_eq!(summary.total_individuals, 0);
        assert!(summary.catalog.is_empty());
        assert!(summary.group_distribution.is_empty());
    }

    #[test]
    fn single_individual_limits_chart_categories() {
        let one: BTreeSet<String> = ["Mel".to_string()].into();
        assert_eq!(
            Category::options(&one),
            vec![Category::Location, Category::Individual]
        );
        assert_eq!(Category::options(&BTreeSet::new()).len(), 5);
    }

    #[test]
    fn catalog_csv_has_header_and_one_line_per_individual() {
        let summary = Summary::compute(&rows(), &Sentinels::default());
        let csv = String::from_utf8(catalog_csv(&summary.catalog).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Orca,Sexo,Grupo,Varadora"));
        assert_eq!(lines.next(), Some("Mel,♀,G1,Sí"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn counts_frame_keeps_order() {
        let frame = counts_frame(&value_counts(&rows(), Category::Individual)).unwrap();
        assert_eq!(frame.height(), 3);
        let totals = frame.column(counts::COUNT).unwrap();
        assert_eq!(totals.dtype(), &DataType::UInt64);
        assert_eq!(totals.u64().unwrap().get(0), Some(3));
        let names: Vec<_> = frame
            .column(counts::VALUE)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(names, vec!["Mel", "Pao", "Sol"]);
    }
}
