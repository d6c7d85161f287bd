use crate::import::ImportRules;
use anyhow::Context;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use derive_more::{Display, Error};
use itertools::Itertools;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Cursor;

/// Structural failures of the tabular pass. Any of these rejects the whole
/// job before a single row is processed.
#[derive(Debug, Display, Error)]
pub enum SheetError {
    #[display("Unable to read workbook: {message}")]
    Workbook { message: String },
    #[display("Workbook has no worksheets")]
    NoWorksheet,
    #[display("Header expected on spreadsheet row 1, found on row {row}")]
    HeaderOffset { row: u32 },
    #[display("Missing required columns: {columns}")]
    MissingColumns { columns: String },
}

/// One data row of the sheet body. `position` is 0-based and excludes the
/// header row.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub position: usize,
    cells: HashMap<String, Data>,
}

impl RawRow {
    pub fn cell(&self, column: &str) -> Option<&Data> {
        self.cells.get(column)
    }

    /// Trimmed text of a cell, `None` when the cell is absent or blank.
    pub fn text(&self, column: &str) -> Option<String> {
        let cell = self.cell(column)?;
        if cell_is_blank(cell) {
            return None;
        }
        Some(cell.to_string().trim().to_string())
    }

    pub fn is_blank(&self, column: &str) -> bool {
        self.cell(column).map(cell_is_blank).unwrap_or(true)
    }
}

#[derive(Debug)]
pub struct SheetBody {
    pub rows: Vec<RawRow>,
}

pub fn cell_is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Price cells arrive either as numbers or as text, sometimes with a French
/// decimal comma.
pub fn parse_price(cell: &Data) -> Result<Decimal, anyhow::Error> {
    match cell {
        Data::Float(f) => Decimal::try_from(*f).context("Price is not a valid decimal"),
        Data::Int(i) => Ok(Decimal::from(*i)),
        Data::String(s) => Decimal::from_str_exact(s.trim().replace(',', ".").as_str())
            .with_context(|| format!("Unable to parse price {s:?}")),
        other => Err(anyhow::anyhow!("Unsupported price cell: {other}")),
    }
}

/// Converts a 0-based data-body position into the 1-based spreadsheet row an
/// embedded image for that row is anchored at. The header occupies
/// spreadsheet row 1, so the data body starts at row 2.
///
/// This offset ties the two independent parses of the upload together; the
/// header-on-row-1 assumption behind it is enforced by [`read_sheet`].
pub fn data_position_to_anchor_row(position: usize) -> u32 {
    position as u32 + 2
}

/// Reads the first worksheet into an ordered sequence of rows, validating
/// that every required column is present in the header.
pub fn read_sheet(bytes: &[u8], rules: &ImportRules) -> Result<SheetBody, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|err| {
        SheetError::Workbook {
            message: err.to_string(),
        }
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)?
        .map_err(|err| SheetError::Workbook {
            message: err.to_string(),
        })?;

    let required = [
        rules.title_column.as_str(),
        rules.price_column.as_str(),
        rules.description_column.as_str(),
    ];
    let Some((start_row, _)) = range.start() else {
        return Err(missing_columns(required));
    };
    if start_row != 0 {
        return Err(SheetError::HeaderOffset { row: start_row + 1 });
    }

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect()
        })
        .unwrap_or_default();
    let absent = required
        .iter()
        .filter(|name| !headers.iter().any(|h| h.as_str() == **name))
        .copied()
        .collect::<Vec<_>>();
    if !absent.is_empty() {
        return Err(missing_columns(absent));
    }

    let rows = rows
        .enumerate()
        .map(|(position, row)| RawRow {
            position,
            cells: headers
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(idx, name)| {
                    (
                        name.clone(),
                        row.get(idx).cloned().unwrap_or(Data::Empty),
                    )
                })
                .collect(),
        })
        .collect();
    Ok(SheetBody { rows })
}

fn missing_columns<'a>(names: impl IntoIterator<Item = &'a str>) -> SheetError {
    SheetError::MissingColumns {
        columns: names.into_iter().join(", "),
    }
}
