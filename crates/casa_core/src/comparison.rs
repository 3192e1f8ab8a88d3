//! crates/casa_core/src/comparison.rs
//!
//! The comparison engine. Joins a project's ordered criteria with its
//! visits and assessments into one canonical matrix, computes per-column
//! statistics and best/worst highlighting, and supports sorting, filtering
//! and weighted scoring on top of that single structure. Both the
//! interactive view and the CSV/PDF exports are fed from here, which is
//! what guarantees they agree on row order and cell content.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Assessment, AssessmentValue, Criteria, CriteriaKind, Direction, ProjectStatus, Visit,
};
use crate::error::{CoreError, CoreResult};

/// How an unanswered cell renders everywhere (table, CSV, PDF).
pub const UNANSWERED_DISPLAY: &str = "-";

/// Row ordering direction for `sort_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "asc" => Ok(SortDirection::Ascending),
            "desc" => Ok(SortDirection::Descending),
            other => Err(CoreError::Validation(format!(
                "Unknown sort direction '{}' (expected asc or desc)",
                other
            ))),
        }
    }
}

/// A single filter predicate. Multiple filters compose with logical AND.
#[derive(Debug, Clone)]
pub struct Filter {
    pub criteria_id: Uuid,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    AtLeast,
    AtMost,
    Contains,
}

impl FilterOp {
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "eq" => Ok(FilterOp::Equals),
            "gte" => Ok(FilterOp::AtLeast),
            "lte" => Ok(FilterOp::AtMost),
            "contains" => Ok(FilterOp::Contains),
            other => Err(CoreError::Validation(format!(
                "Unknown filter operator '{}' (expected eq, gte, lte or contains)",
                other
            ))),
        }
    }
}

/// One cell of the matrix: the stored value (or unanswered) plus the
/// highlight flags computed against the column statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixCell {
    pub value: Option<AssessmentValue>,
    pub best: bool,
    pub worst: bool,
}

impl MatrixCell {
    fn unanswered() -> Self {
        Self {
            value: None,
            best: false,
            worst: false,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.value.is_some()
    }

    /// The display text shared by every renderer.
    pub fn display_value(&self) -> String {
        match &self.value {
            Some(v) => v.display(),
            None => UNANSWERED_DISPLAY.to_string(),
        }
    }
}

/// One visit row. Cells are aligned index-for-index with the matrix
/// columns.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub visit_id: Uuid,
    pub visit_name: String,
    pub cells: Vec<MatrixCell>,
}

/// Min/max over a column's answered values. `None` for text columns and
/// for columns with no answered value at all.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ColumnStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// The per-visit weighted score, produced only on explicit request.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedScore {
    pub visit_id: Uuid,
    pub score: f64,
}

/// The metadata header block prepended to every export.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub project_name: String,
    pub status: ProjectStatus,
    pub exported_at: DateTime<Utc>,
}

/// The canonical visits x criteria grid.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonMatrix {
    pub columns: Vec<Criteria>,
    pub rows: Vec<MatrixRow>,
    pub stats: Vec<ColumnStats>,
}

impl ComparisonMatrix {
    /// Assembles the matrix from the ordered criteria list, the visit list
    /// (row order is preserved) and the project's assessments. Visits with
    /// no assessment at all still get a full row of unanswered cells; an
    /// empty visit set yields an empty matrix.
    pub fn build(columns: Vec<Criteria>, visits: &[Visit], assessments: &[Assessment]) -> Self {
        let rows = visits
            .iter()
            .map(|visit| {
                let cells = columns
                    .iter()
                    .map(|column| {
                        assessments
                            .iter()
                            .find(|a| a.visit_id == visit.id && a.criteria_id == column.id)
                            .map(|a| MatrixCell {
                                value: Some(a.value.clone()),
                                best: false,
                                worst: false,
                            })
                            .unwrap_or_else(MatrixCell::unanswered)
                    })
                    .collect();
                MatrixRow {
                    visit_id: visit.id,
                    visit_name: visit.name.clone(),
                    cells,
                }
            })
            .collect();

        let mut matrix = Self {
            stats: vec![ColumnStats::default(); columns.len()],
            columns,
            rows,
        };
        matrix.recompute();
        matrix
    }

    /// Recomputes column statistics and best/worst flags from the rows
    /// currently in the matrix. Called after construction and after every
    /// filter pass, so highlighting always reflects the visible rows.
    fn recompute(&mut self) {
        for (col_idx, column) in self.columns.iter().enumerate() {
            if !column.kind.is_orderable() {
                self.stats[col_idx] = ColumnStats::default();
                for row in &mut self.rows {
                    row.cells[col_idx].best = false;
                    row.cells[col_idx].worst = false;
                }
                continue;
            }

            let mut min: Option<f64> = None;
            let mut max: Option<f64> = None;
            for row in &self.rows {
                if let Some(key) = row.cells[col_idx].value.as_ref().and_then(|v| v.comparable())
                {
                    min = Some(min.map_or(key, |m: f64| m.min(key)));
                    max = Some(max.map_or(key, |m: f64| m.max(key)));
                }
            }
            self.stats[col_idx] = ColumnStats { min, max };

            // With direction applied, "best" sits at one extreme and
            // "worst" at the other. All ties at an extreme are marked.
            let (best_target, worst_target) = match column.direction {
                Direction::HigherIsBetter => (max, min),
                Direction::LowerIsBetter => (min, max),
            };
            for row in &mut self.rows {
                let cell = &mut row.cells[col_idx];
                let key = cell.value.as_ref().and_then(|v| v.comparable());
                cell.best = matches!((key, best_target), (Some(k), Some(t)) if k == t);
                cell.worst = matches!((key, worst_target), (Some(k), Some(t)) if k == t);
            }
        }
    }

    fn column_index(&self, criteria_id: Uuid) -> CoreResult<usize> {
        self.columns
            .iter()
            .position(|c| c.id == criteria_id)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Criteria {} does not belong to this project",
                    criteria_id
                ))
            })
    }

    /// Reorders rows by one column's comparable key. Unanswered rows sort
    /// last regardless of direction: unanswered is never "best".
    pub fn sort_by(&mut self, criteria_id: Uuid, direction: SortDirection) -> CoreResult<()> {
        let col_idx = self.column_index(criteria_id)?;
        let column = &self.columns[col_idx];
        if !column.kind.is_orderable() {
            return Err(CoreError::Validation(format!(
                "Criteria '{}' is a text criteria and cannot be sorted",
                column.name
            )));
        }

        self.rows.sort_by(|a, b| {
            let ka = a.cells[col_idx].value.as_ref().and_then(|v| v.comparable());
            let kb = b.cells[col_idx].value.as_ref().and_then(|v| v.comparable());
            match (ka, kb) {
                (Some(x), Some(y)) => {
                    let ord = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
                    match direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                }
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        Ok(())
    }

    /// Drops rows not matching every filter, then recomputes statistics
    /// and highlighting over the remaining rows. All filters are validated
    /// before any row is removed, so a bad filter leaves the matrix
    /// untouched. Unanswered cells never match a filter.
    pub fn apply_filters(&mut self, filters: &[Filter]) -> CoreResult<()> {
        let compiled = filters
            .iter()
            .map(|f| self.compile_filter(f))
            .collect::<CoreResult<Vec<_>>>()?;

        self.rows.retain(|row| {
            compiled.iter().all(|(col_idx, predicate)| {
                match row.cells[*col_idx].value.as_ref() {
                    Some(value) => predicate.matches(value),
                    None => false,
                }
            })
        });
        self.recompute();
        Ok(())
    }

    fn compile_filter(&self, filter: &Filter) -> CoreResult<(usize, Predicate)> {
        let col_idx = self.column_index(filter.criteria_id)?;
        let column = &self.columns[col_idx];
        let predicate = match filter.op {
            FilterOp::Equals => {
                let expected =
                    AssessmentValue::parse(column, &filter.value)?.ok_or_else(|| {
                        CoreError::Validation(format!(
                            "Filter on '{}' requires a value",
                            column.name
                        ))
                    })?;
                Predicate::Equals(expected)
            }
            FilterOp::AtLeast | FilterOp::AtMost => {
                if !column.kind.is_orderable() {
                    return Err(CoreError::Validation(format!(
                        "Criteria '{}' is a text criteria and only supports eq or contains",
                        column.name
                    )));
                }
                let threshold = AssessmentValue::parse(column, &filter.value)?
                    .and_then(|v| v.comparable())
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "Filter on '{}' requires a value",
                            column.name
                        ))
                    })?;
                if filter.op == FilterOp::AtLeast {
                    Predicate::AtLeast(threshold)
                } else {
                    Predicate::AtMost(threshold)
                }
            }
            FilterOp::Contains => Predicate::Contains(filter.value.to_lowercase()),
        };
        Ok((col_idx, predicate))
    }

    /// Computes the optional per-visit weighted score, aligned with the
    /// current rows: sum over orderable weighted columns of the normalized
    /// value times the weight. Normalization maps the column's [min, max]
    /// onto [0, 1] with the column direction applied; a column where every
    /// answered value is equal normalizes to 1, and an unanswered cell
    /// contributes 0. A weight on a text criteria is rejected.
    pub fn weighted_scores(&self) -> CoreResult<Vec<WeightedScore>> {
        for column in &self.columns {
            if column.weight.is_some() && !column.kind.is_orderable() {
                return Err(CoreError::Validation(format!(
                    "Criteria '{}' is a text criteria and cannot take part in a weighted score",
                    column.name
                )));
            }
        }

        let scores = self
            .rows
            .iter()
            .map(|row| {
                let mut score = 0.0;
                for (col_idx, column) in self.columns.iter().enumerate() {
                    let weight = match column.weight {
                        Some(w) => w,
                        None => continue,
                    };
                    let key = match row.cells[col_idx].value.as_ref().and_then(|v| v.comparable())
                    {
                        Some(k) => k,
                        None => continue,
                    };
                    let stats = &self.stats[col_idx];
                    let normalized = match (stats.min, stats.max) {
                        (Some(min), Some(max)) if max > min => (key - min) / (max - min),
                        _ => 1.0,
                    };
                    let normalized = match column.direction {
                        Direction::HigherIsBetter => normalized,
                        Direction::LowerIsBetter => 1.0 - normalized,
                    };
                    score += normalized * weight;
                }
                WeightedScore {
                    visit_id: row.visit_id,
                    score,
                }
            })
            .collect();
        Ok(scores)
    }

    /// Reorders rows by descending weighted score.
    pub fn sort_by_weighted_score(&mut self) -> CoreResult<()> {
        let scores = self.weighted_scores()?;
        let mut paired: Vec<(MatrixRow, f64)> = self
            .rows
            .drain(..)
            .zip(scores.into_iter().map(|s| s.score))
            .collect();
        paired.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.rows = paired.into_iter().map(|(row, _)| row).collect();
        Ok(())
    }
}

enum Predicate {
    Equals(AssessmentValue),
    AtLeast(f64),
    AtMost(f64),
    Contains(String),
}

impl Predicate {
    fn matches(&self, value: &AssessmentValue) -> bool {
        match self {
            Predicate::Equals(expected) => value == expected,
            Predicate::AtLeast(threshold) => {
                value.comparable().is_some_and(|k| k >= *threshold)
            }
            Predicate::AtMost(threshold) => value.comparable().is_some_and(|k| k <= *threshold),
            Predicate::Contains(needle) => value.display().to_lowercase().contains(needle),
        }
    }
}

/// Validates a criteria reorder request: the submitted ids must be exactly
/// a permutation of the project's existing criteria ids.
pub fn validate_reorder(existing: &[Criteria], ordered_ids: &[Uuid]) -> CoreResult<()> {
    if ordered_ids.len() != existing.len() {
        return Err(CoreError::Validation(format!(
            "Reorder must list all {} criteria, got {}",
            existing.len(),
            ordered_ids.len()
        )));
    }
    let mut seen = Vec::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if seen.contains(id) {
            return Err(CoreError::Validation(format!(
                "Criteria {} appears more than once in the reorder",
                id
            )));
        }
        if !existing.iter().any(|c| c.id == *id) {
            return Err(CoreError::Validation(format!(
                "Criteria {} does not belong to this project",
                id
            )));
        }
        seen.push(*id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn criteria(name: &str, kind: CriteriaKind, position: i32) -> Criteria {
        Criteria {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            weight: None,
            direction: Direction::HigherIsBetter,
            position,
            created_at: Utc::now(),
        }
    }

    fn visit(name: &str) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            address: "123 Test St".to_string(),
            realtor_name: None,
            realtor_contact: None,
            visit_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            notes: String::new(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assessment(visit: &Visit, column: &Criteria, value: AssessmentValue) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            visit_id: visit.id,
            criteria_id: column.id,
            value,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matrix_is_dense_even_when_assessments_are_sparse() {
        let columns = vec![
            criteria("Price", CriteriaKind::Numeric, 0),
            criteria("Has Yard", CriteriaKind::Boolean, 1),
            criteria("Notes", CriteriaKind::Text, 2),
        ];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        // Only one assessment in the whole project.
        let assessments = vec![assessment(
            &visits[0],
            &columns[0],
            AssessmentValue::Numeric(500000.0),
        )];

        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        assert_eq!(matrix.rows.len(), 3);
        for row in &matrix.rows {
            assert_eq!(row.cells.len(), 3);
        }
        assert!(matrix.rows[0].cells[0].is_answered());
        assert!(!matrix.rows[1].cells[0].is_answered());
        assert_eq!(matrix.rows[1].cells[0].display_value(), UNANSWERED_DISPLAY);
    }

    #[test]
    fn empty_visit_set_yields_empty_matrix() {
        let columns = vec![criteria("Price", CriteriaKind::Numeric, 0)];
        let matrix = ComparisonMatrix::build(columns, &[], &[]);
        assert!(matrix.rows.is_empty());
        assert!(matrix.stats[0].min.is_none());
        assert!(matrix.stats[0].max.is_none());
    }

    #[test]
    fn stats_ignore_unanswered_cells() {
        let columns = vec![criteria("Price", CriteriaKind::Numeric, 0)];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(500000.0)),
            assessment(&visits[1], &columns[0], AssessmentValue::Numeric(450000.0)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        assert_eq!(matrix.stats[0].min, Some(450000.0));
        assert_eq!(matrix.stats[0].max, Some(500000.0));
    }

    #[test]
    fn higher_is_better_marks_the_maximum_best() {
        let columns = vec![criteria("Rating", CriteriaKind::Rating, 0)];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Rating(5)),
            assessment(&visits[1], &columns[0], AssessmentValue::Rating(2)),
            assessment(&visits[2], &columns[0], AssessmentValue::Rating(5)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        // Both fives are best (ties all marked), the two is worst.
        assert!(matrix.rows[0].cells[0].best);
        assert!(matrix.rows[2].cells[0].best);
        assert!(!matrix.rows[1].cells[0].best);
        assert!(matrix.rows[1].cells[0].worst);
    }

    #[test]
    fn lower_is_better_flips_the_extremes() {
        let mut price = criteria("Price", CriteriaKind::Numeric, 0);
        price.direction = Direction::LowerIsBetter;
        let columns = vec![price];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(500000.0)),
            assessment(&visits[1], &columns[0], AssessmentValue::Numeric(450000.0)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        assert!(matrix.rows[1].cells[0].best);
        assert!(matrix.rows[0].cells[0].worst);
    }

    #[test]
    fn all_equal_column_marks_every_answered_cell_best_and_worst() {
        let columns = vec![criteria("Rating", CriteriaKind::Rating, 0)];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Rating(3)),
            assessment(&visits[1], &columns[0], AssessmentValue::Rating(3)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        for row in &matrix.rows[..2] {
            assert!(row.cells[0].best);
            assert!(row.cells[0].worst);
        }
        // The unanswered cell is excluded from highlighting entirely.
        assert!(!matrix.rows[2].cells[0].best);
        assert!(!matrix.rows[2].cells[0].worst);
    }

    #[test]
    fn text_columns_are_never_highlighted() {
        let columns = vec![criteria("Vibe", CriteriaKind::Text, 0)];
        let visits = vec![visit("A")];
        let assessments = vec![assessment(
            &visits[0],
            &columns[0],
            AssessmentValue::Text("cozy".to_string()),
        )];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        assert!(!matrix.rows[0].cells[0].best);
        assert!(!matrix.rows[0].cells[0].worst);
        assert!(matrix.stats[0].min.is_none());
    }

    #[test]
    fn sorting_keeps_unanswered_rows_last_in_both_directions() {
        let columns = vec![criteria("Price", CriteriaKind::Numeric, 0)];
        let visits = vec![visit("A"), visit("B"), visit("C"), visit("D")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(300.0)),
            assessment(&visits[2], &columns[0], AssessmentValue::Numeric(100.0)),
            assessment(&visits[3], &columns[0], AssessmentValue::Numeric(200.0)),
        ];
        let criteria_id = columns[0].id;
        let mut matrix = ComparisonMatrix::build(columns, &visits, &assessments);

        matrix.sort_by(criteria_id, SortDirection::Descending).unwrap();
        let names: Vec<&str> = matrix.rows.iter().map(|r| r.visit_name.as_str()).collect();
        assert_eq!(names, vec!["A", "D", "C", "B"]);

        matrix.sort_by(criteria_id, SortDirection::Ascending).unwrap();
        let names: Vec<&str> = matrix.rows.iter().map(|r| r.visit_name.as_str()).collect();
        assert_eq!(names, vec!["C", "D", "A", "B"]);
    }

    #[test]
    fn sorting_by_a_text_column_is_rejected() {
        let columns = vec![criteria("Vibe", CriteriaKind::Text, 0)];
        let criteria_id = columns[0].id;
        let mut matrix = ComparisonMatrix::build(columns, &[], &[]);
        assert!(matches!(
            matrix.sort_by(criteria_id, SortDirection::Ascending),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn filters_compose_with_and() {
        let columns = vec![
            criteria("Price", CriteriaKind::Numeric, 0),
            criteria("Has Yard", CriteriaKind::Boolean, 1),
        ];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(500000.0)),
            assessment(&visits[0], &columns[1], AssessmentValue::Boolean(true)),
            assessment(&visits[1], &columns[0], AssessmentValue::Numeric(450000.0)),
            assessment(&visits[1], &columns[1], AssessmentValue::Boolean(false)),
            assessment(&visits[2], &columns[0], AssessmentValue::Numeric(400000.0)),
            assessment(&visits[2], &columns[1], AssessmentValue::Boolean(true)),
        ];
        let filters = vec![
            Filter {
                criteria_id: columns[0].id,
                op: FilterOp::AtLeast,
                value: "450000".to_string(),
            },
            Filter {
                criteria_id: columns[1].id,
                op: FilterOp::Equals,
                value: "true".to_string(),
            },
        ];
        let mut matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        matrix.apply_filters(&filters).unwrap();
        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].visit_name, "A");
        // Stats follow the filtered rows.
        assert_eq!(matrix.stats[0].min, Some(500000.0));
    }

    #[test]
    fn unanswered_cells_never_match_a_filter() {
        let columns = vec![criteria("Has Yard", CriteriaKind::Boolean, 0)];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![assessment(
            &visits[0],
            &columns[0],
            AssessmentValue::Boolean(false),
        )];
        let filters = vec![Filter {
            criteria_id: columns[0].id,
            op: FilterOp::Equals,
            value: "false".to_string(),
        }];
        let mut matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        matrix.apply_filters(&filters).unwrap();
        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].visit_name, "A");
    }

    #[test]
    fn range_filters_on_text_columns_are_rejected() {
        let columns = vec![criteria("Vibe", CriteriaKind::Text, 0)];
        let criteria_id = columns[0].id;
        let visits = vec![visit("A")];
        let mut matrix = ComparisonMatrix::build(columns, &visits, &[]);
        let filters = vec![Filter {
            criteria_id,
            op: FilterOp::AtLeast,
            value: "3".to_string(),
        }];
        assert!(matches!(
            matrix.apply_filters(&filters),
            Err(CoreError::Validation(_))
        ));
        // A failed filter pass leaves the rows untouched.
        assert_eq!(matrix.rows.len(), 1);
    }

    #[test]
    fn text_columns_remain_filterable_by_substring() {
        let columns = vec![criteria("Vibe", CriteriaKind::Text, 0)];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            assessment(
                &visits[0],
                &columns[0],
                AssessmentValue::Text("Bright and cozy".to_string()),
            ),
            assessment(
                &visits[1],
                &columns[0],
                AssessmentValue::Text("Dark basement".to_string()),
            ),
        ];
        let filters = vec![Filter {
            criteria_id: columns[0].id,
            op: FilterOp::Contains,
            value: "cozy".to_string(),
        }];
        let mut matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        matrix.apply_filters(&filters).unwrap();
        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].visit_name, "A");
    }

    #[test]
    fn weighted_scores_normalize_per_column() {
        let mut price = criteria("Price", CriteriaKind::Numeric, 0);
        price.weight = Some(2.0);
        price.direction = Direction::LowerIsBetter;
        let mut rating = criteria("Rating", CriteriaKind::Rating, 1);
        rating.weight = Some(1.0);
        let columns = vec![price, rating];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(500000.0)),
            assessment(&visits[0], &columns[1], AssessmentValue::Rating(5)),
            assessment(&visits[1], &columns[0], AssessmentValue::Numeric(400000.0)),
            assessment(&visits[1], &columns[1], AssessmentValue::Rating(1)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        let scores = matrix.weighted_scores().unwrap();
        // A: price normalizes to 0 (worst under lower-is-better), rating to 1.
        assert!((scores[0].score - 1.0).abs() < 1e-9);
        // B: price normalizes to 1 * 2.0, rating to 0.
        assert!((scores[1].score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_score_treats_flat_columns_as_one_and_unanswered_as_zero() {
        let mut rating = criteria("Rating", CriteriaKind::Rating, 0);
        rating.weight = Some(3.0);
        let columns = vec![rating];
        let visits = vec![visit("A"), visit("B"), visit("C")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Rating(4)),
            assessment(&visits[1], &columns[0], AssessmentValue::Rating(4)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        let scores = matrix.weighted_scores().unwrap();
        assert!((scores[0].score - 3.0).abs() < 1e-9);
        assert!((scores[1].score - 3.0).abs() < 1e-9);
        assert_eq!(scores[2].score, 0.0);
    }

    #[test]
    fn weighted_score_rejects_weighted_text_criteria() {
        let mut vibe = criteria("Vibe", CriteriaKind::Text, 0);
        vibe.weight = Some(1.0);
        let matrix = ComparisonMatrix::build(vec![vibe], &[], &[]);
        assert!(matches!(
            matrix.weighted_scores(),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn weighted_sort_orders_best_first() {
        let mut rating = criteria("Rating", CriteriaKind::Rating, 0);
        rating.weight = Some(1.0);
        let columns = vec![rating];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Rating(2)),
            assessment(&visits[1], &columns[0], AssessmentValue::Rating(5)),
        ];
        let mut matrix = ComparisonMatrix::build(columns, &visits, &assessments);
        matrix.sort_by_weighted_score().unwrap();
        assert_eq!(matrix.rows[0].visit_name, "B");
    }

    // The worked scenario from the design discussion: project "Q1 Move"
    // with Price (numeric) and Has Yard (boolean), visit B missing its
    // yard answer.
    #[test]
    fn q1_move_scenario() {
        let price = criteria("Price", CriteriaKind::Numeric, 0);
        let yard = criteria("Has Yard", CriteriaKind::Boolean, 1);
        let columns = vec![price, yard];
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            assessment(&visits[0], &columns[0], AssessmentValue::Numeric(500000.0)),
            assessment(&visits[0], &columns[1], AssessmentValue::Boolean(true)),
            assessment(&visits[1], &columns[0], AssessmentValue::Numeric(450000.0)),
        ];
        let matrix = ComparisonMatrix::build(columns, &visits, &assessments);

        // Default direction is higher-is-better, so A's price is best.
        assert!(matrix.rows[0].cells[0].best);
        assert!(matrix.rows[1].cells[0].worst);
        // B's yard cell renders unanswered and is excluded from marking.
        assert_eq!(matrix.rows[1].cells[1].display_value(), UNANSWERED_DISPLAY);
        assert!(!matrix.rows[1].cells[1].best);
        assert!(!matrix.rows[1].cells[1].worst);
        // A is the only answered yard cell: both extremes at once.
        assert!(matrix.rows[0].cells[1].best);
        assert!(matrix.rows[0].cells[1].worst);
    }

    #[test]
    fn reorder_must_be_a_permutation() {
        let a = criteria("Price", CriteriaKind::Numeric, 0);
        let b = criteria("Has Yard", CriteriaKind::Boolean, 1);
        let existing = vec![a.clone(), b.clone()];

        assert!(validate_reorder(&existing, &[b.id, a.id]).is_ok());
        assert!(matches!(
            validate_reorder(&existing, &[a.id]),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate_reorder(&existing, &[a.id, a.id]),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate_reorder(&existing, &[a.id, Uuid::new_v4()]),
            Err(CoreError::Validation(_))
        ));
    }
}
