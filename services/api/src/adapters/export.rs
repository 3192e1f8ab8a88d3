//! services/api/src/adapters/export.rs
//!
//! CSV and PDF implementations of the `MatrixRenderer` port. Both walk the
//! same canonical `ComparisonMatrix` in the same order and print cells via
//! `MatrixCell::display_value`, so the two exports always agree on row
//! ordering and cell text.

use casa_core::comparison::{ComparisonMatrix, ExportMetadata};
use casa_core::error::{CoreError, CoreResult};
use casa_core::ports::MatrixRenderer;
use printpdf::{BuiltinFont, Mm, PdfDocument};

/// The table as displayed: a header row, then one row per visit, in the
/// exact order and with the exact cell text the matrix holds. Both
/// renderers print this and nothing else, which is what keeps the CSV and
/// the PDF in agreement.
fn table_rows(matrix: &ComparisonMatrix) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(matrix.rows.len() + 1);
    let mut header = vec!["Visit".to_string()];
    header.extend(matrix.columns.iter().map(|c| c.name.clone()));
    rows.push(header);
    for row in &matrix.rows {
        let mut record = vec![row.visit_name.clone()];
        record.extend(row.cells.iter().map(|c| c.display_value()));
        rows.push(record);
    }
    rows
}

//=========================================================================================
// CSV
//=========================================================================================

/// Renders the matrix as CSV with a metadata header block.
pub struct CsvRenderer;

impl MatrixRenderer for CsvRenderer {
    fn render(&self, matrix: &ComparisonMatrix, meta: &ExportMetadata) -> CoreResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        let write_err = |e: csv::Error| CoreError::Infrastructure(format!("CSV write: {}", e));

        // Metadata header block.
        writer
            .write_record(["Project", &meta.project_name])
            .map_err(write_err)?;
        writer
            .write_record(["Status", meta.status.as_str()])
            .map_err(write_err)?;
        writer
            .write_record(["Exported", &meta.exported_at.to_rfc3339()])
            .map_err(write_err)?;
        writer.write_record([""]).map_err(write_err)?;

        // Criteria definitions.
        writer
            .write_record(["Criteria", "Type", "Weight", "Direction"])
            .map_err(write_err)?;
        for column in &matrix.columns {
            let weight = column
                .weight
                .map(|w| w.to_string())
                .unwrap_or_else(|| "-".to_string());
            writer
                .write_record([
                    column.name.as_str(),
                    column.kind.as_str(),
                    weight.as_str(),
                    column.direction.as_str(),
                ])
                .map_err(write_err)?;
        }
        writer.write_record([""]).map_err(write_err)?;

        // The matrix itself, exactly as currently sorted and filtered.
        for record in table_rows(matrix) {
            writer.write_record(&record).map_err(write_err)?;
        }

        writer
            .into_inner()
            .map_err(|e| CoreError::Infrastructure(format!("CSV flush: {}", e)))
    }

    fn content_type(&self) -> &'static str {
        "text/csv"
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }
}

//=========================================================================================
// PDF
//=========================================================================================

const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const MARGIN_MM: f32 = 15.0;
const LINE_HEIGHT_MM: f32 = 6.0;

/// Renders the matrix as a landscape A4 PDF, one text line per visit row.
pub struct PdfRenderer;

impl PdfRenderer {
    fn row_line(cells: &[String]) -> String {
        cells.join("  |  ")
    }
}

impl MatrixRenderer for PdfRenderer {
    fn render(&self, matrix: &ComparisonMatrix, meta: &ExportMetadata) -> CoreResult<Vec<u8>> {
        let (doc, page, layer) = PdfDocument::new(
            meta.project_name.clone(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| CoreError::Infrastructure(format!("PDF font: {}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| CoreError::Infrastructure(format!("PDF font: {}", e)))?;

        let mut current_layer = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

        // Metadata header block, mirroring the CSV preamble.
        let header_lines = [
            format!("Project: {}", meta.project_name),
            format!("Status: {}", meta.status.as_str()),
            format!("Exported: {}", meta.exported_at.to_rfc3339()),
        ];
        for line in &header_lines {
            current_layer.use_text(line.clone(), 11.0, Mm(MARGIN_MM), Mm(y), &bold);
            y -= LINE_HEIGHT_MM;
        }
        y -= LINE_HEIGHT_MM;

        for column in &matrix.columns {
            let weight = column
                .weight
                .map(|w| w.to_string())
                .unwrap_or_else(|| "-".to_string());
            let line = format!(
                "{} ({}, weight {}, {})",
                column.name,
                column.kind.as_str(),
                weight,
                column.direction.as_str()
            );
            current_layer.use_text(line, 9.0, Mm(MARGIN_MM), Mm(y), &font);
            y -= LINE_HEIGHT_MM;
        }
        y -= LINE_HEIGHT_MM;

        let table = table_rows(matrix);
        for (idx, row) in table.iter().enumerate() {
            if y < MARGIN_MM {
                let (new_page, new_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
                current_layer = doc.get_page(new_page).get_layer(new_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            let row_font = if idx == 0 { &bold } else { &font };
            current_layer.use_text(Self::row_line(row), 10.0, Mm(MARGIN_MM), Mm(y), row_font);
            y -= LINE_HEIGHT_MM;
        }

        doc.save_to_bytes()
            .map_err(|e| CoreError::Infrastructure(format!("PDF save: {}", e)))
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casa_core::domain::{
        Assessment, AssessmentValue, Criteria, CriteriaKind, Direction, ProjectStatus, Visit,
    };
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn sample_matrix() -> (ComparisonMatrix, ExportMetadata) {
        let price = Criteria {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "Price".to_string(),
            kind: CriteriaKind::Numeric,
            weight: Some(2.0),
            direction: Direction::LowerIsBetter,
            position: 0,
            created_at: Utc::now(),
        };
        let yard = Criteria {
            id: Uuid::new_v4(),
            project_id: price.project_id,
            name: "Has Yard".to_string(),
            kind: CriteriaKind::Boolean,
            weight: None,
            direction: Direction::HigherIsBetter,
            position: 1,
            created_at: Utc::now(),
        };
        let visit = |name: &str| Visit {
            id: Uuid::new_v4(),
            project_id: price.project_id,
            name: name.to_string(),
            address: "123 Test St".to_string(),
            realtor_name: None,
            realtor_contact: None,
            visit_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            notes: String::new(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let visits = vec![visit("A"), visit("B")];
        let assessments = vec![
            Assessment {
                id: Uuid::new_v4(),
                visit_id: visits[0].id,
                criteria_id: price.id,
                value: AssessmentValue::Numeric(500000.0),
                updated_at: Utc::now(),
            },
            Assessment {
                id: Uuid::new_v4(),
                visit_id: visits[0].id,
                criteria_id: yard.id,
                value: AssessmentValue::Boolean(true),
                updated_at: Utc::now(),
            },
            Assessment {
                id: Uuid::new_v4(),
                visit_id: visits[1].id,
                criteria_id: price.id,
                value: AssessmentValue::Numeric(450000.0),
                updated_at: Utc::now(),
            },
        ];
        let matrix = ComparisonMatrix::build(vec![price, yard], &visits, &assessments);
        let meta = ExportMetadata {
            project_name: "Q1 Move".to_string(),
            status: ProjectStatus::Active,
            exported_at: Utc::now(),
        };
        (matrix, meta)
    }

    #[test]
    fn csv_carries_metadata_and_matrix_in_display_order() {
        let (matrix, meta) = sample_matrix();
        let bytes = CsvRenderer.render(&matrix, &meta).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Project,Q1 Move");
        assert_eq!(lines[1], "Status,active");
        assert!(lines[2].starts_with("Exported,"));
        assert!(lines.contains(&"Criteria,Type,Weight,Direction"));
        assert!(lines.contains(&"Price,numeric,2,lower_is_better"));
        assert!(lines.contains(&"Visit,Price,Has Yard"));
        // Row order and cell text exactly as the matrix holds them,
        // unanswered rendered as the sentinel.
        assert!(lines.contains(&"A,500000,Yes"));
        assert!(lines.contains(&"B,450000,-"));
    }

    #[test]
    fn csv_and_pdf_derive_from_the_same_cells() {
        let (mut matrix, meta) = sample_matrix();
        matrix
            .sort_by(matrix.columns[0].id, casa_core::SortDirection::Ascending)
            .unwrap();

        // The materialized table both renderers print: after the ascending
        // price sort, B leads, and cell text matches the matrix display.
        let rows = table_rows(&matrix);
        assert_eq!(rows[0], vec!["Visit", "Price", "Has Yard"]);
        assert_eq!(rows[1], vec!["B", "450000", "-"]);
        assert_eq!(rows[2], vec!["A", "500000", "Yes"]);

        // The CSV body is exactly those rows.
        let csv_bytes = CsvRenderer.render(&matrix, &meta).unwrap();
        let csv_text = String::from_utf8(csv_bytes).unwrap();
        for row in &rows {
            assert!(csv_text.contains(&row.join(",")), "missing {:?}", row);
        }

        // The PDF prints the same rows through its line formatter, in the
        // same order.
        assert_eq!(PdfRenderer::row_line(&rows[1]), "B  |  450000  |  -");
        assert_eq!(PdfRenderer::row_line(&rows[2]), "A  |  500000  |  Yes");
        let pdf_bytes = PdfRenderer.render(&matrix, &meta).unwrap();
        assert!(pdf_bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_matrix_still_exports() {
        let (matrix, meta) = sample_matrix();
        let empty = ComparisonMatrix::build(matrix.columns.clone(), &[], &[]);
        let bytes = CsvRenderer.render(&empty, &meta).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Visit,Price,Has Yard"));
    }
}
