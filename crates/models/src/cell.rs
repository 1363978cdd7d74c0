use crate::property::YesNo;

/// A spreadsheet cell reduced to what the listing columns need.
///
/// Local workbooks hand back typed cells; the Sheets API hands back
/// formatted strings. Both are folded into this type before mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// True for cells a blank-row check should ignore (`Empty` or `""`).
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Text content, or `None` for an empty cell so the caller's default applies.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
        }
    }

    /// Integer content; blank or unparsable cells read as 0, fractions truncate.
    pub fn to_i64(&self) -> i64 {
        let n = self.to_f64();
        if let Self::Text(s) = self {
            if let Ok(i) = s.trim().parse::<i64>() {
                return i;
            }
        }
        n.trunc() as i64
    }

    /// Numeric content; blank, unparsable or non-finite cells read as 0.
    pub fn to_f64(&self) -> f64 {
        let n = match self {
            Self::Empty => 0.0,
            Self::Number(n) => *n,
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() { 0.0 } else { s.parse::<f64>().unwrap_or(0.0) }
            }
        };
        if n.is_finite() { n } else { 0.0 }
    }

    /// `SI` (any case, accent optional) is yes; everything else, blanks included, is no.
    pub fn to_yes_no(&self) -> YesNo {
        match self {
            Self::Text(s) => s.parse().unwrap_or_default(),
            _ => YesNo::No,
        }
    }

    /// The string written by RAW value updates; numbers lose a trailing `.0`.
    pub fn into_raw_string(self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s,
            Self::Number(n) => format_number(n),
        }
    }
}

fn format_number(n: f64) -> String {
    // f64's Display already prints 100000.0 as "100000"
    n.to_string()
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self { Self::Number(n) }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self { Self::Number(n as f64) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(!CellValue::from(" ").is_blank());
        assert!(!CellValue::from(0.0).is_blank());
    }

    #[test]
    fn numbers_from_text_and_numbers() {
        assert_eq!(CellValue::from("120000").to_f64(), 120000.0);
        assert_eq!(CellValue::from(" 45.5 ").to_f64(), 45.5);
        assert_eq!(CellValue::from("abc").to_f64(), 0.0);
        assert_eq!(CellValue::from("NaN").to_f64(), 0.0);
        assert_eq!(CellValue::Empty.to_f64(), 0.0);
        assert_eq!(CellValue::from(3.0).to_i64(), 3);
        assert_eq!(CellValue::from("3").to_i64(), 3);
        assert_eq!(CellValue::from("2.7").to_i64(), 2);
        assert_eq!(CellValue::from("").to_i64(), 0);
    }

    #[test]
    fn text_from_numbers_drops_trailing_zero() {
        assert_eq!(CellValue::from(100000.0).as_text().as_deref(), Some("100000"));
        assert_eq!(CellValue::from(62.5).into_raw_string(), "62.5");
        assert_eq!(CellValue::Empty.as_text(), None);
        assert_eq!(CellValue::Empty.into_raw_string(), "");
    }

    #[test]
    fn yes_no_cells() {
        assert_eq!(CellValue::from("SI").to_yes_no(), YesNo::Si);
        assert_eq!(CellValue::from("sí").to_yes_no(), YesNo::Si);
        assert_eq!(CellValue::from("NO").to_yes_no(), YesNo::No);
        assert_eq!(CellValue::from("quizás").to_yes_no(), YesNo::No);
        assert_eq!(CellValue::Empty.to_yes_no(), YesNo::No);
    }
}
