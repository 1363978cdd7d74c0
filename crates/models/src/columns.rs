//! Fixed column layout of the listings sheet.
//!
//! Both backends use the same header strings in the same order. The
//! `Visitado` column is optional; when present it is always last, and range
//! letters are derived from the header count.

/// One column of the listings sheet, in sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Zona,
    Descripcion,
    Direccion,
    Link,
    Ambientes,
    Precio,
    Expensas,
    Cochera,
    Antiguedad,
    MetrosTotales,
    MetrosCubiertos,
    TiempoAlTrabajo,
    Descartado,
    Motivo,
    Visitado,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::Zona,
        Column::Descripcion,
        Column::Direccion,
        Column::Link,
        Column::Ambientes,
        Column::Precio,
        Column::Expensas,
        Column::Cochera,
        Column::Antiguedad,
        Column::MetrosTotales,
        Column::MetrosCubiertos,
        Column::TiempoAlTrabajo,
        Column::Descartado,
        Column::Motivo,
        Column::Visitado,
    ];

    /// Exact header text as it appears in row 1.
    pub fn header(self) -> &'static str {
        match self {
            Column::Zona => "Zona",
            Column::Descripcion => "Descripción",
            Column::Direccion => "Dirección",
            Column::Link => "Link",
            Column::Ambientes => "Ambientes",
            Column::Precio => "Precio",
            Column::Expensas => "Expensas",
            Column::Cochera => "Cochera",
            Column::Antiguedad => "Antigüedad",
            Column::MetrosTotales => "Metros Totales",
            Column::MetrosCubiertos => "Metros Cubiertos",
            Column::TiempoAlTrabajo => "Tiempo al trabajo",
            Column::Descartado => "Descartado",
            Column::Motivo => "MOTIVO",
            Column::Visitado => "Visitado",
        }
    }

    /// Zero-based position in the full layout.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim();
        Column::ALL.into_iter().find(|c| c.header() == header)
    }
}

/// Which columns a backend persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    include_visitado: bool,
}

impl ColumnLayout {
    /// Layout of the local workbook: no `Visitado` column.
    pub const BASE: ColumnLayout = ColumnLayout { include_visitado: false };
    /// Layout of the cloud sheet: `Visitado` appended.
    pub const WITH_VISITADO: ColumnLayout = ColumnLayout { include_visitado: true };

    pub fn new(include_visitado: bool) -> Self {
        Self { include_visitado }
    }

    pub fn includes_visitado(&self) -> bool {
        self.include_visitado
    }

    pub fn columns(&self) -> &'static [Column] {
        static ALL: [Column; 15] = Column::ALL;
        if self.include_visitado {
            &ALL
        } else {
            &ALL[..ALL.len() - 1]
        }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.header()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns().is_empty()
    }

    /// Letter of the last column, e.g. `N` for 14 columns and `O` for 15.
    pub fn last_column(&self) -> String {
        column_letter(self.len())
    }

    /// True when `row`'s first cell carries the first canonical header.
    pub fn is_header_row<S: AsRef<str>>(&self, row: &[S]) -> bool {
        row.first().map(|c| c.as_ref() == Column::Zona.header()).unwrap_or(false)
    }
}

/// A1-style letters for a 1-based column number: 1 → `A`, 26 → `Z`, 27 → `AA`.
pub fn column_letter(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
