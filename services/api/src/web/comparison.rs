//! services/api/src/web/comparison.rs
//!
//! Axum handlers for the comparison view and the CSV/PDF exports. Both
//! assemble the same canonical matrix with the same query parameters, so
//! what gets exported is exactly what was on screen.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use casa_core::comparison::{
    ComparisonMatrix, ExportMetadata, Filter, FilterOp, SortDirection, WeightedScore,
};
use casa_core::domain::{Project, User};
use casa_core::error::{CoreError, CoreResult};
use casa_core::ports::MatrixRenderer;

use crate::adapters::{CsvRenderer, PdfRenderer};
use crate::error::core_error_response;
use crate::web::projects::{readable_project, CriteriaResponse};
use crate::web::state::AppState;

//=========================================================================================
// Query Parameter Parsing
//=========================================================================================

/// The sort/filter/weighted parameters shared by the interactive view and
/// the export endpoint.
#[derive(Debug)]
pub struct ViewParams {
    pub sort: Option<Uuid>,
    pub sort_direction: SortDirection,
    pub filters: Vec<Filter>,
    pub weighted: bool,
}

/// Parses the raw query pairs. `filter` may repeat and has the shape
/// `criteria_id:op:value`, where op is eq, gte, lte or contains.
pub fn parse_view_params(pairs: &[(String, String)]) -> CoreResult<ViewParams> {
    let mut params = ViewParams {
        sort: None,
        sort_direction: SortDirection::Ascending,
        filters: Vec::new(),
        weighted: false,
    };
    for (key, value) in pairs {
        match key.as_str() {
            "sort" => {
                let id = Uuid::parse_str(value).map_err(|_| {
                    CoreError::Validation(format!("'{}' is not a valid criteria id", value))
                })?;
                params.sort = Some(id);
            }
            "dir" => params.sort_direction = SortDirection::parse(value)?,
            "weighted" => params.weighted = matches!(value.as_str(), "true" | "1"),
            "filter" => {
                let mut parts = value.splitn(3, ':');
                let (id, op, filter_value) = match (parts.next(), parts.next(), parts.next()) {
                    (Some(id), Some(op), Some(v)) => (id, op, v),
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "Filter '{}' must have the shape criteria_id:op:value",
                            value
                        )))
                    }
                };
                let criteria_id = Uuid::parse_str(id).map_err(|_| {
                    CoreError::Validation(format!("'{}' is not a valid criteria id", id))
                })?;
                params.filters.push(Filter {
                    criteria_id,
                    op: FilterOp::parse(op)?,
                    value: filter_value.to_string(),
                });
            }
            "format" => {} // handled by the export endpoint
            other => {
                return Err(CoreError::Validation(format!(
                    "Unknown query parameter '{}'",
                    other
                )))
            }
        }
    }
    Ok(params)
}

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ComparisonCell {
    /// Display text; "-" for unanswered cells.
    pub display: String,
    pub answered: bool,
    pub best: bool,
    pub worst: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ComparisonRow {
    pub visit_id: Uuid,
    pub visit_name: String,
    pub cells: Vec<ComparisonCell>,
}

#[derive(Serialize, ToSchema)]
pub struct ColumnStatsResponse {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct WeightedScoreResponse {
    pub visit_id: Uuid,
    pub score: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ComparisonResponse {
    pub columns: Vec<CriteriaResponse>,
    pub rows: Vec<ComparisonRow>,
    pub stats: Vec<ColumnStatsResponse>,
    pub weighted_scores: Option<Vec<WeightedScoreResponse>>,
}

impl ComparisonResponse {
    fn from_matrix(matrix: ComparisonMatrix, scores: Option<Vec<WeightedScore>>) -> Self {
        let rows = matrix
            .rows
            .iter()
            .map(|row| ComparisonRow {
                visit_id: row.visit_id,
                visit_name: row.visit_name.clone(),
                cells: row
                    .cells
                    .iter()
                    .map(|cell| ComparisonCell {
                        display: cell.display_value(),
                        answered: cell.is_answered(),
                        best: cell.best,
                        worst: cell.worst,
                    })
                    .collect(),
            })
            .collect();
        let stats = matrix
            .stats
            .iter()
            .map(|s| ColumnStatsResponse {
                min: s.min,
                max: s.max,
            })
            .collect();
        Self {
            columns: matrix.columns.into_iter().map(Into::into).collect(),
            rows,
            stats,
            weighted_scores: scores.map(|scores| {
                scores
                    .into_iter()
                    .map(|s| WeightedScoreResponse {
                        visit_id: s.visit_id,
                        score: s.score,
                    })
                    .collect()
            }),
        }
    }
}

//=========================================================================================
// Matrix Assembly
//=========================================================================================

/// Fetches the project's criteria, visits and assessments once and applies
/// the view parameters. Every consumer (JSON view, CSV, PDF) goes through
/// here.
async fn assemble_view(
    state: &Arc<AppState>,
    project: &Project,
    params: &ViewParams,
) -> CoreResult<(ComparisonMatrix, Option<Vec<WeightedScore>>)> {
    let criteria = state.db.list_criteria(project.id).await?;
    let visits = state.db.list_visits(project.id).await?;
    let assessments = state.db.list_assessments(project.id).await?;

    let mut matrix = ComparisonMatrix::build(criteria, &visits, &assessments);
    matrix.apply_filters(&params.filters)?;

    if let Some(criteria_id) = params.sort {
        matrix.sort_by(criteria_id, params.sort_direction)?;
    } else if params.weighted {
        matrix.sort_by_weighted_score()?;
    }

    let scores = if params.weighted {
        Some(matrix.weighted_scores()?)
    } else {
        None
    };
    Ok((matrix, scores))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// The interactive comparison view of a project.
#[utoipa::path(
    get,
    path = "/projects/{id}/comparison",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("sort" = Option<Uuid>, Query, description = "Criteria id to sort by"),
        ("dir" = Option<String>, Query, description = "asc or desc"),
        ("filter" = Option<String>, Query, description = "criteria_id:op:value, repeatable"),
        ("weighted" = Option<bool>, Query, description = "Include weighted scores")
    ),
    responses(
        (status = 200, description = "The comparison matrix", body = ComparisonResponse),
        (status = 422, description = "Bad sort or filter parameter")
    )
)]
pub async fn get_comparison_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    let params = parse_view_params(&pairs).map_err(core_error_response)?;
    let (matrix, scores) = assemble_view(&state, &project, &params)
        .await
        .map_err(core_error_response)?;
    Ok(Json(ComparisonResponse::from_matrix(matrix, scores)))
}

/// Export the current comparison view as CSV or PDF.
#[utoipa::path(
    get,
    path = "/projects/{id}/export",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("format" = Option<String>, Query, description = "csv (default) or pdf"),
        ("sort" = Option<Uuid>, Query, description = "Criteria id to sort by"),
        ("dir" = Option<String>, Query, description = "asc or desc"),
        ("filter" = Option<String>, Query, description = "criteria_id:op:value, repeatable"),
        ("weighted" = Option<bool>, Query, description = "Sort by weighted score")
    ),
    responses(
        (status = 200, description = "The rendered export"),
        (status = 422, description = "Bad format, sort or filter parameter")
    )
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    let params = parse_view_params(&pairs).map_err(core_error_response)?;

    let format = pairs
        .iter()
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.as_str())
        .unwrap_or("csv");
    let renderer: Box<dyn MatrixRenderer> = match format {
        "csv" => Box::new(CsvRenderer),
        "pdf" => Box::new(PdfRenderer),
        other => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Unknown export format '{}' (expected csv or pdf)", other),
            ))
        }
    };

    let (matrix, _) = assemble_view(&state, &project, &params)
        .await
        .map_err(core_error_response)?;
    let meta = ExportMetadata {
        project_name: project.name.clone(),
        status: project.status,
        exported_at: Utc::now(),
    };
    let bytes = renderer
        .render(&matrix, &meta)
        .map_err(core_error_response)?;

    let disposition = format!(
        "attachment; filename=\"comparison.{}\"",
        renderer.file_extension()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, renderer.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn view_params_parse_sort_and_filters() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let query = pairs(&[
            ("sort", &id.to_string()),
            ("dir", "desc"),
            ("filter", &format!("{}:gte:450000", other)),
            ("filter", &format!("{}:contains:garden:view", other)),
            ("weighted", "true"),
        ]);
        let params = parse_view_params(&query).unwrap();
        assert_eq!(params.sort, Some(id));
        assert_eq!(params.sort_direction, SortDirection::Descending);
        assert!(params.weighted);
        assert_eq!(params.filters.len(), 2);
        assert_eq!(params.filters[0].op, FilterOp::AtLeast);
        // The value keeps any embedded colons.
        assert_eq!(params.filters[1].value, "garden:view");
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for raw in ["not-a-filter", "bad-uuid:eq:1"] {
            let query = pairs(&[("filter", raw)]);
            assert!(matches!(
                parse_view_params(&query),
                Err(CoreError::Validation(_))
            ));
        }
        let id = Uuid::new_v4().to_string();
        let query = pairs(&[("filter", &format!("{}:between:1", id))]);
        assert!(matches!(
            parse_view_params(&query),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let query = pairs(&[("sorted", "x")]);
        assert!(matches!(
            parse_view_params(&query),
            Err(CoreError::Validation(_))
        ));
    }
}
