use std::collections::HashMap;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{Data, Range, Reader, Xlsx};
use configs::XlsxConfig;
use models::{CellValue, Column, ColumnLayout, Property, PropertyData};
use rust_xlsxwriter::{Workbook, Worksheet};
use tokio::fs;
use tokio::task;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PropertyStore;
use crate::errors::StoreError;

/// Listings kept in one worksheet of a local `.xlsx` workbook.
///
/// Row 1 holds the headers; columns are matched by header text, so a
/// workbook edited by hand keeps working as long as the names match.
/// Other worksheets in the file are carried over on write, values only.
#[derive(Debug, Clone)]
pub struct XlsxStore {
    path: PathBuf,
    sheet_name: String,
    layout: ColumnLayout,
}

impl XlsxStore {
    pub fn new<P: Into<PathBuf>>(path: P, sheet_name: impl Into<String>, layout: ColumnLayout) -> Self {
        Self { path: path.into(), sheet_name: sheet_name.into(), layout }
    }

    pub fn from_config(cfg: &XlsxConfig) -> Self {
        Self::new(&cfg.path, &cfg.sheet_name, ColumnLayout::new(cfg.include_visitado))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A sibling path unique to one write, e.g. `Deptos.xlsx.<uuid>.tmp`.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4()));
        self.path.with_file_name(name)
    }

    async fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PropertyStore for XlsxStore {
    fn backend(&self) -> &'static str {
        "xlsx"
    }

    async fn read_all(&self) -> Result<Vec<Property>, StoreError> {
        let Some(bytes) = self.read_bytes().await? else {
            warn!(path = %self.path.display(), "workbook not found; treating as empty");
            return Ok(Vec::new());
        };
        let (sheet_name, layout) = (self.sheet_name.clone(), self.layout);
        let rows = blocking(move || parse_workbook(bytes, &sheet_name, layout)).await?;
        debug!(path = %self.path.display(), rows = rows.len(), "workbook read");
        Ok(Property::enumerate(rows))
    }

    async fn write_all(&self, properties: &[Property]) -> Result<(), StoreError> {
        let existing = self.read_bytes().await?;
        let rows = properties.to_vec();
        let (sheet_name, layout) = (self.sheet_name.clone(), self.layout);
        let bytes = blocking(move || build_workbook(&rows, &sheet_name, layout, existing)).await?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        // rename is atomic, so readers see the old or the new workbook
        let tmp = self.temp_path();
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), rows = properties.len(), "workbook written");
        Ok(())
    }
}

/// Workbook encoding is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Workbook(format!("workbook task failed: {e}")))?
}

fn to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        other => CellValue::Text(other.to_string()),
    }
}

fn parse_workbook(bytes: Vec<u8>, sheet_name: &str, layout: ColumnLayout) -> Result<Vec<PropertyData>, StoreError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    if !workbook.sheet_names().iter().any(|n| n == sheet_name) {
        warn!(%sheet_name, "worksheet not found; treating as empty");
        return Ok(Vec::new());
    }
    let range = workbook.worksheet_range(sheet_name)?;
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let positions: HashMap<Column, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| match cell {
            Data::String(s) => Column::from_header(s).map(|c| (c, i)),
            _ => None,
        })
        .filter(|(c, _)| layout.columns().contains(c))
        .collect();

    let parsed = rows
        .filter(|row| !row.iter().all(|c| to_cell(c).is_blank()))
        .map(|row| {
            PropertyData::from_cells(|c| {
                positions
                    .get(&c)
                    .and_then(|&i| row.get(i))
                    .map(to_cell)
                    .unwrap_or(CellValue::Empty)
            })
        })
        .collect();
    Ok(parsed)
}

/// Rebuild the workbook: the listings sheet from `properties`, every other
/// sheet of `existing` copied cell by cell, in the original sheet order.
fn build_workbook(
    properties: &[Property],
    sheet_name: &str,
    layout: ColumnLayout,
    existing: Option<Vec<u8>>,
) -> Result<Vec<u8>, StoreError> {
    let mut others: Vec<(String, Range<Data>)> = Vec::new();
    let mut order: Vec<String> = Vec::new();
    if let Some(bytes) = existing {
        let mut old: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        for name in old.sheet_names() {
            if name != sheet_name {
                let range = old.worksheet_range(&name)?;
                others.push((name.clone(), range));
            }
            order.push(name);
        }
    }
    if !order.iter().any(|n| n == sheet_name) {
        order.push(sheet_name.to_string());
    }

    let mut workbook = Workbook::new();
    let mut others = others.into_iter();
    for name in &order {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        if name == sheet_name {
            write_listings(sheet, properties, layout)?;
        } else if let Some((_, range)) = others.next() {
            copy_range(sheet, &range)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn write_listings(sheet: &mut Worksheet, properties: &[Property], layout: ColumnLayout) -> Result<(), StoreError> {
    for (col, header) in layout.headers().into_iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }
    for (i, property) in properties.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in property.data.to_cells(layout).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) if s.is_empty() => {}
                CellValue::Text(s) => {
                    sheet.write_string(row, col, s.as_str())?;
                }
                CellValue::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
            }
        }
    }
    Ok(())
}

/// Values only: formulas come across as their cached results and dates as
/// serial numbers.
fn copy_range(sheet: &mut Worksheet, range: &Range<Data>) -> Result<(), StoreError> {
    let (top, left) = range.start().unwrap_or((0, 0));
    for (r, c, value) in range.cells() {
        let (row, col) = (top + r as u32, (left + c as u32) as u16);
        match value {
            Data::Empty | Data::Error(_) => {}
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                sheet.write_string(row, col, s.as_str())?;
            }
            Data::Float(f) => {
                sheet.write_number(row, col, *f)?;
            }
            Data::Int(i) => {
                sheet.write_number(row, col, *i as f64)?;
            }
            Data::Bool(b) => {
                sheet.write_boolean(row, col, *b)?;
            }
            Data::DateTime(d) => {
                sheet.write_number(row, col, d.as_f64())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::YesNo;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("deptos_xlsx_{}", uuid::Uuid::new_v4()))
            .join("Deptos.xlsx")
    }

    fn listing(zona: &str, precio: f64) -> PropertyData {
        PropertyData {
            zona: zona.into(),
            descripcion: format!("depto en {zona}"),
            ambientes: 3,
            precio,
            expensas: 52000.0,
            cochera: YesNo::Si,
            metros_totales: 70.5,
            metros_cubiertos: 62.0,
            tiempo_al_trabajo: 25,
            visitado: YesNo::Si,
            ..PropertyData::default()
        }
    }

    #[tokio::test]
    async fn missing_file_reads_empty() -> Result<(), anyhow::Error> {
        let store = XlsxStore::new(tmp_path(), "Sheet1", ColumnLayout::BASE);
        assert!(store.read_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn write_then_read_round_trips() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        let rows = Property::enumerate(vec![listing("Saavedra", 100000.0), listing("Villa Devoto", 135000.0)]);
        store.write_all(&rows).await?;

        let back = store.read_all().await?;
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].id, 0);
        assert_eq!(back[1].id, 1);
        assert_eq!(back[1].data.zona, "Villa Devoto");
        assert_eq!(back[1].data.precio, 135000.0);
        assert_eq!(back[0].data.metros_totales, 70.5);
        assert_eq!(back[0].data.cochera, YesNo::Si);
        // the base layout has no Visitado column
        assert_eq!(back[0].data.visitado, YesNo::No);

        // writing what was read changes nothing
        store.write_all(&back).await?;
        assert_eq!(store.read_all().await?, back);

        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn visitado_survives_when_layout_includes_it() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::WITH_VISITADO);
        store.write_all(&Property::enumerate(vec![listing("Saavedra", 1.0)])).await?;
        let back = store.read_all().await?;
        assert_eq!(back[0].data.visitado, YesNo::Si);
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn empty_write_truncates_but_keeps_headers() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        store.write_all(&Property::enumerate(vec![listing("Saavedra", 1.0)])).await?;
        store.write_all(&[]).await?;
        assert!(store.read_all().await?.is_empty());

        let bytes = fs::read(&path).await?;
        let mut wb: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let range = wb.worksheet_range("Sheet1")?;
        let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(header, ColumnLayout::BASE.headers());
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn hand_edited_workbook_is_read_by_header_name() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        fs::create_dir_all(path.parent().unwrap()).await?;
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Sheet1")?;
        // reordered, partial headers and a blank row in between
        ws.write_string(0, 0, "Precio")?;
        ws.write_string(0, 1, "Zona")?;
        ws.write_string(0, 2, "Cochera")?;
        ws.write_number(1, 0, 90000.0)?;
        ws.write_string(1, 1, "Saavedra")?;
        ws.write_string(1, 2, "SI")?;
        ws.write_string(3, 1, "Villa Urquiza")?;
        fs::write(&path, wb.save_to_buffer()?).await?;

        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        let rows = store.read_all().await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data.zona, "Saavedra");
        assert_eq!(rows[0].data.precio, 90000.0);
        assert_eq!(rows[0].data.cochera, YesNo::Si);
        assert_eq!(rows[1].id, 1);
        assert_eq!(rows[1].data.zona, "Villa Urquiza");
        assert_eq!(rows[1].data.precio, 0.0);
        assert_eq!(rows[1].data.descartado, YesNo::No);
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn other_sheet_name_reads_empty() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let writer = XlsxStore::new(&path, "Hoja1", ColumnLayout::BASE);
        writer.write_all(&Property::enumerate(vec![listing("Saavedra", 1.0)])).await?;
        let reader = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        assert!(reader.read_all().await?.is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn other_worksheets_survive_a_write() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        fs::create_dir_all(path.parent().unwrap()).await?;
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Sheet1")?;
        ws.write_string(0, 0, "Zona")?;
        ws.write_string(1, 0, "Saavedra")?;
        let notes = wb.add_worksheet();
        notes.set_name("Notas")?;
        notes.write_string(0, 0, "llamar al dueño")?;
        notes.write_number(2, 3, 42.5)?;
        notes.write_boolean(4, 1, true)?;
        fs::write(&path, wb.save_to_buffer()?).await?;

        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        let mut rows = store.read_all().await?;
        rows.push(Property::new(1, listing("Villa Devoto", 1.0)));
        store.write_all(&rows).await?;

        assert_eq!(store.read_all().await?.len(), 2);
        let mut back: Xlsx<_> = Xlsx::new(Cursor::new(fs::read(&path).await?))?;
        assert_eq!(back.sheet_names(), vec!["Sheet1".to_string(), "Notas".to_string()]);
        let notes = back.worksheet_range("Notas")?;
        assert_eq!(notes.get_value((0, 0)), Some(&Data::String("llamar al dueño".into())));
        assert_eq!(notes.get_value((2, 3)), Some(&Data::Float(42.5)));
        assert_eq!(notes.get_value((4, 1)), Some(&Data::Bool(true)));
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_writes_all_succeed() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let store = std::sync::Arc::new(XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE));
        for round in 0..10 {
            let mut tasks = Vec::new();
            for n in 0..6 {
                let store = store.clone();
                let rows = Property::enumerate((0..=n).map(|i| listing(&format!("z{round}-{i}"), 1.0)));
                tasks.push(tokio::spawn(async move { store.write_all(&rows).await }));
            }
            for t in tasks {
                t.await??;
            }
        }
        let len = store.read_all().await?.len();
        assert!((1..=6).contains(&len));

        // no temp files left behind
        let mut entries = fs::read_dir(path.parent().unwrap()).await?;
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await? {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["Deptos.xlsx".to_string()]);
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        fs::create_dir_all(path.parent().unwrap()).await?;
        fs::write(&path, b"not a workbook").await?;
        let store = XlsxStore::new(&path, "Sheet1", ColumnLayout::BASE);
        assert!(matches!(store.read_all().await, Err(StoreError::Workbook(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }
}
