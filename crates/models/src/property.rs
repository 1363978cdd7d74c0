use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cell::CellValue;
use crate::columns::{Column, ColumnLayout};
use crate::errors::ModelError;

/// `SI`/`NO` flag as stored in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>")]
pub enum YesNo {
    #[serde(rename = "SI")]
    Si,
    #[default]
    #[serde(rename = "NO")]
    No,
}

impl YesNo {
    pub fn as_str(self) -> &'static str {
        match self {
            YesNo::Si => "SI",
            YesNo::No => "NO",
        }
    }

    pub fn is_yes(self) -> bool {
        self == YesNo::Si
    }
}

impl FromStr for YesNo {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SI" | "SÍ" => Ok(YesNo::Si),
            "NO" => Ok(YesNo::No),
            _ => Err(ModelError::InvalidYesNo(s.to_string())),
        }
    }
}

impl TryFrom<Option<String>> for YesNo {
    type Error = ModelError;

    /// `null` reads as `NO`, like an absent field.
    fn try_from(s: Option<String>) -> Result<Self, Self::Error> {
        s.map_or(Ok(YesNo::No), |s| s.parse())
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing fields without the id: the body of create and update requests,
/// and the content of one sheet row.
///
/// Every field is optional on input and falls back to `""`, `0` or `NO`.
/// Numeric fields also accept numeric strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyData {
    #[serde(deserialize_with = "null_as_empty")]
    pub zona: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub descripcion: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub direccion: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub link: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub ambientes: i64,
    #[serde(deserialize_with = "lenient_f64", serialize_with = "whole_number")]
    pub precio: f64,
    #[serde(deserialize_with = "lenient_f64", serialize_with = "whole_number")]
    pub expensas: f64,
    pub cochera: YesNo,
    #[serde(deserialize_with = "lenient_i64")]
    pub antiguedad: i64,
    #[serde(deserialize_with = "lenient_f64", serialize_with = "whole_number")]
    pub metros_totales: f64,
    #[serde(deserialize_with = "lenient_f64", serialize_with = "whole_number")]
    pub metros_cubiertos: f64,
    #[serde(deserialize_with = "lenient_i64")]
    pub tiempo_al_trabajo: i64,
    pub descartado: YesNo,
    #[serde(deserialize_with = "null_as_empty")]
    pub motivo: String,
    pub visitado: YesNo,
}

impl PropertyData {
    /// Build a row from a cell lookup; absent cells take the field default.
    pub fn from_cells<F>(cell: F) -> Self
    where
        F: Fn(Column) -> CellValue,
    {
        let text = |c: Column| cell(c).as_text().unwrap_or_default();
        Self {
            zona: text(Column::Zona),
            descripcion: text(Column::Descripcion),
            direccion: text(Column::Direccion),
            link: text(Column::Link),
            ambientes: cell(Column::Ambientes).to_i64(),
            precio: cell(Column::Precio).to_f64(),
            expensas: cell(Column::Expensas).to_f64(),
            cochera: cell(Column::Cochera).to_yes_no(),
            antiguedad: cell(Column::Antiguedad).to_i64(),
            metros_totales: cell(Column::MetrosTotales).to_f64(),
            metros_cubiertos: cell(Column::MetrosCubiertos).to_f64(),
            tiempo_al_trabajo: cell(Column::TiempoAlTrabajo).to_i64(),
            descartado: cell(Column::Descartado).to_yes_no(),
            motivo: text(Column::Motivo),
            visitado: cell(Column::Visitado).to_yes_no(),
        }
    }

    /// Build a row from positional cells (column A first). Missing trailing
    /// cells default.
    pub fn from_positional(row: &[CellValue]) -> Self {
        Self::from_cells(|c| row.get(c.index()).cloned().unwrap_or(CellValue::Empty))
    }

    pub fn cell(&self, column: Column) -> CellValue {
        match column {
            Column::Zona => self.zona.as_str().into(),
            Column::Descripcion => self.descripcion.as_str().into(),
            Column::Direccion => self.direccion.as_str().into(),
            Column::Link => self.link.as_str().into(),
            Column::Ambientes => self.ambientes.into(),
            Column::Precio => self.precio.into(),
            Column::Expensas => self.expensas.into(),
            Column::Cochera => self.cochera.as_str().into(),
            Column::Antiguedad => self.antiguedad.into(),
            Column::MetrosTotales => self.metros_totales.into(),
            Column::MetrosCubiertos => self.metros_cubiertos.into(),
            Column::TiempoAlTrabajo => self.tiempo_al_trabajo.into(),
            Column::Descartado => self.descartado.as_str().into(),
            Column::Motivo => self.motivo.as_str().into(),
            Column::Visitado => self.visitado.as_str().into(),
        }
    }

    /// The full row for `layout`, one cell per column in sheet order.
    pub fn to_cells(&self, layout: ColumnLayout) -> Vec<CellValue> {
        layout.columns().iter().map(|c| self.cell(*c)).collect()
    }

    /// Price per covered square metre, rounded; 0 when the covered area is not positive.
    pub fn price_per_covered_meter(&self) -> f64 {
        if self.metros_cubiertos > 0.0 {
            (self.precio / self.metros_cubiertos).round()
        } else {
            0.0
        }
    }

    pub fn is_discarded(&self) -> bool {
        self.descartado.is_yes()
    }

    pub fn is_visited(&self) -> bool {
        self.visitado.is_yes()
    }
}

/// A listing with its id.
///
/// The id is positional: backends assign the 0-based row ordinal on every
/// read, it is never stored in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    #[serde(flatten)]
    pub data: PropertyData,
}

impl Property {
    pub fn new(id: i64, data: PropertyData) -> Self {
        Self { id, data }
    }

    /// Assign positional ids to rows in scan order.
    pub fn enumerate<I>(rows: I) -> Vec<Property>
    where
        I: IntoIterator<Item = PropertyData>,
    {
        rows.into_iter()
            .enumerate()
            .map(|(i, data)| Property::new(i as i64, data))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl NumberLike {
    fn into_cell(self) -> CellValue {
        match self {
            NumberLike::Int(i) => CellValue::from(i),
            NumberLike::Float(f) => CellValue::from(f),
            NumberLike::Text(s) => CellValue::from(s),
            NumberLike::Bool(b) => CellValue::from(if b { 1.0 } else { 0.0 }),
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(Option::<NumberLike>::deserialize(d)?.map(|n| n.into_cell().to_i64()).unwrap_or(0))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<NumberLike>::deserialize(d)?.map(|n| n.into_cell().to_f64()).unwrap_or(0.0))
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Integral amounts go out as JSON integers (`100000`, not `100000.0`).
fn whole_number<S: Serializer>(n: &f64, s: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < MAX_EXACT {
        s.serialize_i64(*n as i64)
    } else {
        s.serialize_f64(*n)
    }
}
