use anyhow::{anyhow, Context};
use async_trait::async_trait;
use async_zip::base::read::mem::ZipFileReader;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Destination for extracted row images. Addressing is deterministic by row
/// number so a re-import overwrites instead of accumulating assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn write_asset(&self, row: u32, bytes: &[u8]) -> Result<String, anyhow::Error>;
}

pub struct FilesystemAssetStore {
    root: PathBuf,
}

const ASSET_SUBDIR: &str = "uploads/images";

impl FilesystemAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(err) = std::fs::create_dir_all(root.join(ASSET_SUBDIR)) {
            log::error!("Unable to create asset directory: {err}");
        }
        Self { root }
    }
}

#[async_trait]
impl AssetStore for FilesystemAssetStore {
    async fn write_asset(&self, row: u32, bytes: &[u8]) -> Result<String, anyhow::Error> {
        let relative = format!("{ASSET_SUBDIR}/row_{row}_tire.png");
        tokio::fs::write(self.root.join(&relative), bytes)
            .await
            .with_context(|| format!("Unable to write asset for row {row}"))?;
        Ok(relative)
    }
}

// SpreadsheetML drawing part. Only the anchor row and the relationship id of
// the picture are of interest; everything else is ignored.
#[derive(Debug, Deserialize)]
struct WsDr {
    #[serde(rename = "xdr:twoCellAnchor", default)]
    two_cell: Vec<DrawingAnchor>,
    #[serde(rename = "xdr:oneCellAnchor", default)]
    one_cell: Vec<DrawingAnchor>,
}

#[derive(Debug, Deserialize)]
struct DrawingAnchor {
    #[serde(rename = "xdr:from")]
    from: AnchorCell,
    #[serde(rename = "xdr:pic")]
    pic: Option<Picture>,
}

#[derive(Debug, Deserialize)]
struct AnchorCell {
    /// 0-based spreadsheet row of the anchor cell.
    #[serde(rename = "xdr:row")]
    row: u32,
}

#[derive(Debug, Deserialize)]
struct Picture {
    #[serde(rename = "xdr:blipFill")]
    blip_fill: BlipFill,
}

#[derive(Debug, Deserialize)]
struct BlipFill {
    #[serde(rename = "a:blip")]
    blip: Option<Blip>,
}

#[derive(Debug, Deserialize)]
struct Blip {
    #[serde(rename = "@r:embed")]
    embed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relationships {
    #[serde(rename = "Relationship", default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "@Target")]
    target: String,
}

/// Extracts every image embedded in the workbook, persists one per anchor
/// row, and returns relative asset paths keyed by 1-based spreadsheet row
/// (counting the header row).
///
/// If several images anchor to the same row only the first in document order
/// is kept. A single unreadable image degrades to "no image for that row"; a
/// container that cannot be opened at all is an error for the caller.
pub async fn extract_row_images(
    bytes: &[u8],
    store: &dyn AssetStore,
) -> Result<HashMap<u32, String>, anyhow::Error> {
    let zip = ZipFileReader::new(bytes.to_vec())
        .await
        .context("Unable to open spreadsheet container")?;
    let entries: Vec<String> = zip
        .file()
        .entries()
        .iter()
        .map(|e| Ok(e.filename().as_str()?.to_string()))
        .collect::<Result<_, anyhow::Error>>()?;

    let mut drawings: Vec<&String> = entries
        .iter()
        .filter(|name| name.starts_with("xl/drawings/drawing") && name.ends_with(".xml"))
        .collect();
    drawings.sort();

    let mut anchored: Vec<(u32, String)> = Vec::new();
    for drawing in drawings {
        let xml = read_entry_string(&zip, &entries, drawing).await?;
        let drawing_targets = drawing_relationships(&zip, &entries, drawing).await?;
        let parsed: WsDr = quick_xml::de::from_str(&xml)
            .with_context(|| format!("Unable to parse drawing {drawing}"))?;
        for anchor in parsed.two_cell.iter().chain(parsed.one_cell.iter()) {
            let embed = anchor
                .pic
                .as_ref()
                .and_then(|p| p.blip_fill.blip.as_ref())
                .and_then(|b| b.embed.as_deref());
            let Some(embed) = embed else {
                continue;
            };
            match drawing_targets.get(embed) {
                Some(target) => anchored.push((anchor.from.row, target.clone())),
                None => log::warn!("Drawing {drawing} references unknown relationship {embed}"),
            }
        }
    }

    let mut assets = HashMap::new();
    for (anchor_row, media) in anchored {
        let sheet_row = anchor_row + 1;
        if assets.contains_key(&sheet_row) {
            log::debug!("Several images anchored to row {sheet_row}; keeping the first");
            continue;
        }
        let image = match read_entry_bytes(&zip, &entries, &media).await {
            Ok(image) => image,
            Err(err) => {
                log::warn!("Unable to read image {media} for row {sheet_row}: {err}");
                continue;
            }
        };
        match store.write_asset(sheet_row, &image).await {
            Ok(path) => {
                assets.insert(sheet_row, path);
            }
            Err(err) => log::warn!("Unable to store image for row {sheet_row}: {err}"),
        }
    }
    Ok(assets)
}

async fn drawing_relationships(
    zip: &ZipFileReader,
    entries: &[String],
    drawing: &str,
) -> Result<HashMap<String, String>, anyhow::Error> {
    let file_name = drawing
        .rsplit('/')
        .next()
        .ok_or_else(|| anyhow!("Invalid drawing entry name: {drawing}"))?;
    let rels_name = format!("xl/drawings/_rels/{file_name}.rels");
    let xml = read_entry_string(zip, entries, &rels_name).await?;
    let rels: Relationships = quick_xml::de::from_str(&xml)
        .with_context(|| format!("Unable to parse relationships {rels_name}"))?;
    Ok(rels
        .relationships
        .into_iter()
        .map(|r| (r.id, resolve_rel_target(&r.target)))
        .collect())
}

/// Relationship targets are relative to `xl/drawings/`; the common form is
/// `../media/image1.png`.
fn resolve_rel_target(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix("../") {
        format!("xl/{stripped}")
    } else if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("xl/drawings/{target}")
    }
}

async fn read_entry_string(
    zip: &ZipFileReader,
    entries: &[String],
    name: &str,
) -> Result<String, anyhow::Error> {
    let index = entry_index(entries, name)?;
    let mut reader = zip.reader_with_entry(index).await?;
    let mut output = String::new();
    reader.read_to_string_checked(&mut output).await?;
    Ok(output)
}

async fn read_entry_bytes(
    zip: &ZipFileReader,
    entries: &[String],
    name: &str,
) -> Result<Vec<u8>, anyhow::Error> {
    let index = entry_index(entries, name)?;
    let mut reader = zip.reader_with_entry(index).await?;
    let mut output = Vec::new();
    reader.read_to_end_checked(&mut output).await?;
    Ok(output)
}

fn entry_index(entries: &[String], name: &str) -> Result<usize, anyhow::Error> {
    entries
        .iter()
        .position(|e| e == name)
        .ok_or_else(|| anyhow!("No {name} entry in container"))
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// 1x1 transparent PNG.
    pub(crate) const TEST_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[derive(Default)]
    pub(crate) struct MemAssetStore {
        pub written: RwLock<HashMap<u32, Vec<u8>>>,
    }

    #[async_trait]
    impl AssetStore for MemAssetStore {
        async fn write_asset(&self, row: u32, bytes: &[u8]) -> Result<String, anyhow::Error> {
            self.written.write().await.insert(row, bytes.to_vec());
            Ok(format!("{ASSET_SUBDIR}/row_{row}_tire.png"))
        }
    }

    fn workbook_with_images(anchor_rows: &[u32]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "DESIGNATION").unwrap();
        let image = rust_xlsxwriter::Image::new_from_buffer(TEST_PNG).unwrap();
        for row in anchor_rows {
            sheet.insert_image(*row, 3, &image).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[tokio::test]
    async fn keys_assets_by_one_based_sheet_row() {
        // Anchor at 0-based row 6 means 1-based spreadsheet row 7.
        let bytes = workbook_with_images(&[6]);
        let store = MemAssetStore::default();
        let assets = extract_row_images(&bytes, &store).await.unwrap();

        assert_eq!(1, assets.len());
        assert_eq!("uploads/images/row_7_tire.png", assets[&7]);
        assert_eq!(TEST_PNG, store.written.read().await[&7].as_slice());
    }

    #[tokio::test]
    async fn workbook_without_images_yields_empty_map() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "DESIGNATION").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let store = MemAssetStore::default();
        let assets = extract_row_images(&bytes, &store).await.unwrap();
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn rejects_non_zip_containers() {
        let store = MemAssetStore::default();
        assert!(extract_row_images(b"not a zip", &store).await.is_err());
    }

    #[test]
    fn resolves_relationship_targets() {
        assert_eq!("xl/media/image1.png", resolve_rel_target("../media/image1.png"));
        assert_eq!("xl/media/image1.png", resolve_rel_target("/xl/media/image1.png"));
        assert_eq!(
            "xl/drawings/media/image1.png",
            resolve_rel_target("media/image1.png")
        );
    }
}
