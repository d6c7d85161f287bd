use crate::import::job::{self, ImportError, ImportOutcome};
use crate::import_throttle;
use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::http::StatusCode;
use actix_web::{get, post, web::Data, HttpResponse};
use serde::Serialize;
use serde_json::json;

pub type Response = Result<HttpResponse, ImportError>;

#[derive(MultipartForm, Debug)]
pub struct ImportProductsQuery {
    file: TempFile,
}

#[derive(Serialize)]
struct ImportSummary {
    total_rows: usize,
    created: usize,
    updated: usize,
    errors: usize,
}

#[derive(Serialize)]
struct ImportProductsResponse {
    message: String,
    summary: ImportSummary,
    created_products: Vec<String>,
    updated_products: Vec<String>,
    errors: Vec<String>,
}

impl From<ImportOutcome> for ImportProductsResponse {
    fn from(outcome: ImportOutcome) -> Self {
        Self {
            message: "Import completed successfully".to_string(),
            summary: ImportSummary {
                total_rows: outcome.total_rows,
                created: outcome.created.len(),
                updated: outcome.updated.len(),
                errors: outcome.errors.len(),
            },
            created_products: outcome.created_preview(),
            updated_products: outcome.updated_preview(),
            errors: outcome.error_preview(),
        }
    }
}

impl actix_web::ResponseError for ImportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingUpload
            | Self::InvalidFileType { .. }
            | Self::Sheet(_)
            | Self::Container(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[post("/import/products")]
pub async fn import_products(
    ctx: Data<job::ImportContext>,
    q: MultipartForm<ImportProductsQuery>,
) -> Response {
    let q = q.into_inner();
    let filename = q.file.file_name.clone().ok_or(ImportError::MissingUpload)?;
    // One import at a time; a second operator waits here instead of racing
    // the natural-key upserts.
    let _permit = import_throttle::acquire_import_permit().await;
    let outcome = job::run_import(&ctx, q.file.file.path(), &filename).await?;
    Ok(HttpResponse::Ok().json(ImportProductsResponse::from(outcome)))
}

#[get("/import/preview")]
pub async fn import_preview() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Upload Excel file to preview import data",
        "expected_format": {
            "columns": ["Product Name", "Price TTC", "Description", "Image (optional)"],
            "example": {
                "DESIGNATION": "Pneu CONTINENTAL 195/65R15 91H ULTRA CONTACT",
                "PRIX TTC": 299.238,
                "DESCRIPTION": "Points forts: Kilométrage ultra-élevé...",
                "IMAGE": "Optional embedded image"
            }
        }
    }))
}
