use crate::import::images::{self, AssetStore};
use crate::import::parser::{classify_season, parse_tire_title};
use crate::import::sheet::{self, RawRow, SheetError};
use crate::import::slug::allocate_slug;
use crate::import::ImportRules;
use anyhow::Context;
use derive_more::{Display, Error};
use pneu_types::category::CategoryRepository;
use pneu_types::product::{CatalogProduct, ImportFields, NaturalKey, ProductRepository};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use typesafe_repository::async_ops::Save;
use typesafe_repository::IdentityOf;

/// How many created/updated/error entries the job result exposes as preview.
/// Totals always reflect the real counts.
pub const PREVIEW_LIMIT: usize = 10;

/// Structural failures: the job is rejected before any row is processed.
/// Row-level defects never surface here, they land in
/// [`ImportOutcome::errors`].
#[derive(Debug, Display, Error)]
pub enum ImportError {
    #[display("No file uploaded")]
    MissingUpload,
    #[error(ignore)]
    #[display("Invalid file type: {name} (expected .xlsx or .xls)")]
    InvalidFileType { name: String },
    #[display("{_0}")]
    Sheet(SheetError),
    #[error(ignore)]
    #[display("Unable to extract images: {_0}")]
    Container(anyhow::Error),
    #[error(ignore)]
    #[display("Unexpected error: {_0}")]
    Internal(anyhow::Error),
}

impl From<SheetError> for ImportError {
    fn from(err: SheetError) -> Self {
        Self::Sheet(err)
    }
}

#[derive(Clone, Copy, Debug, Display)]
enum ImportStage {
    #[display("validating upload")]
    Validating,
    #[display("extracting images")]
    ExtractingImages,
    #[display("reading rows")]
    ReadingRows,
    #[display("processing rows")]
    ProcessingRows,
    #[display("summarizing")]
    Summarizing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based over the data body, the way operators count their rows.
    pub row_number: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row_number, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub total_rows: usize,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    pub fn created_preview(&self) -> Vec<String> {
        self.created.iter().take(PREVIEW_LIMIT).cloned().collect()
    }

    pub fn updated_preview(&self) -> Vec<String> {
        self.updated.iter().take(PREVIEW_LIMIT).cloned().collect()
    }

    pub fn error_preview(&self) -> Vec<String> {
        self.errors
            .iter()
            .take(PREVIEW_LIMIT)
            .map(ToString::to_string)
            .collect()
    }
}

/// Collaborators and rules for import jobs, fixed at construction time.
#[derive(Clone)]
pub struct ImportContext {
    pub rules: ImportRules,
    pub products: Arc<dyn ProductRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub assets: Arc<dyn AssetStore>,
}

enum RowAction {
    Created(String),
    Updated(String),
    Skipped,
}

fn validate_extension(filename: &str) -> Result<(), ImportError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        Ok(())
    } else {
        Err(ImportError::InvalidFileType {
            name: filename.to_string(),
        })
    }
}

fn is_xlsx_container(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".xlsx")
}

/// Runs one import job over an uploaded spreadsheet.
///
/// The file is parsed twice: once for embedded images, once for the cell
/// grid. Each data row then goes through parse, classification, image
/// alignment and upsert; a failing row is recorded and skipped, it never
/// aborts the job.
pub async fn run_import(
    ctx: &ImportContext,
    path: &Path,
    filename: &str,
) -> Result<ImportOutcome, ImportError> {
    log::info!("Import of {filename}: {}", ImportStage::Validating);
    validate_extension(filename)?;
    let bytes = tokio::fs::read(path)
        .await
        .context("Unable to read upload")
        .map_err(ImportError::Internal)?;

    log::info!("Import of {filename}: {}", ImportStage::ExtractingImages);
    let images = if is_xlsx_container(filename) {
        images::extract_row_images(&bytes, ctx.assets.as_ref())
            .await
            .map_err(ImportError::Container)?
    } else {
        // Legacy .xls containers carry no drawing part we can read.
        log::warn!("Legacy container {filename}; embedded images are skipped");
        HashMap::new()
    };

    log::info!("Import of {filename}: {}", ImportStage::ReadingRows);
    let body = sheet::read_sheet(&bytes, &ctx.rules)?;

    let category = ctx
        .categories
        .get_or_create(
            &ctx.rules.category_name,
            &ctx.rules.category_slug,
            &ctx.rules.category_description,
        )
        .await
        .map_err(ImportError::Internal)?;

    log::info!(
        "Import of {filename}: {} ({} rows)",
        ImportStage::ProcessingRows,
        body.rows.len()
    );
    let mut outcome = ImportOutcome {
        total_rows: body.rows.len(),
        ..Default::default()
    };
    for row in &body.rows {
        match process_row(ctx, category.id, &images, row).await {
            Ok(RowAction::Created(name)) => outcome.created.push(name),
            Ok(RowAction::Updated(name)) => outcome.updated.push(name),
            Ok(RowAction::Skipped) => (),
            Err(err) => {
                log::warn!("Import row {} failed: {err:#}", row.position + 1);
                outcome.errors.push(RowError {
                    row_number: row.position + 1,
                    message: format!("{err:#}"),
                });
            }
        }
    }

    log::info!(
        "Import of {filename}: {}: {} created, {} updated, {} errors",
        ImportStage::Summarizing,
        outcome.created.len(),
        outcome.updated.len(),
        outcome.errors.len()
    );
    Ok(outcome)
}

async fn process_row(
    ctx: &ImportContext,
    category: IdentityOf<pneu_types::category::Category>,
    images: &HashMap<u32, String>,
    row: &RawRow,
) -> Result<RowAction, anyhow::Error> {
    let Some(title) = row.text(&ctx.rules.title_column) else {
        return Ok(RowAction::Skipped);
    };
    let price = match row.cell(&ctx.rules.price_column) {
        Some(cell) if !sheet::cell_is_blank(cell) => sheet::parse_price(cell)?,
        _ => return Ok(RowAction::Skipped),
    };
    if price < Decimal::ZERO {
        anyhow::bail!("Negative price {price}");
    }
    let description = row.text(&ctx.rules.description_column).unwrap_or_default();

    let parsed = parse_tire_title(&ctx.rules, &title);
    let season = classify_season(&ctx.rules, &title, &description);
    let image = images
        .get(&sheet::data_position_to_anchor_row(row.position))
        .cloned();

    let key = NaturalKey {
        name: parsed.model_name.clone(),
        brand: parsed.brand.clone(),
        size: parsed.size.clone(),
    };
    match ctx.products.find_by_key(&key).await? {
        Some(existing) => {
            ctx.products
                .update_import_fields(
                    &key,
                    ImportFields {
                        description,
                        price,
                        season,
                        image,
                    },
                )
                .await?;
            Ok(RowAction::Updated(existing.name))
        }
        None => {
            let slug = allocate_slug(ctx.products.as_ref(), &parsed.display_name()).await?;
            let now = OffsetDateTime::now_utc();
            let product = CatalogProduct {
                slug,
                name: parsed.model_name.clone(),
                brand: parsed.brand,
                size: parsed.size,
                description,
                price,
                season,
                category: Some(category),
                image,
                stock: ctx.rules.default_stock,
                active: true,
                created_at: now,
                updated_at: now,
            };
            ctx.products.save(product).await?;
            Ok(RowAction::Created(parsed.model_name))
        }
    }
}
