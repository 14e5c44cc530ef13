use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display text of the cell. Whole numbers render without decimals and
    /// dates as `YYYY-MM-DD`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Trimmed text, or `None` for blank cells.
    pub fn trimmed(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.as_text().trim().to_string())
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }
}

#[cfg(feature = "xlsx")]
mod xlsx {
    use super::{Cell, Sheet, Workbook};
    use crate::error::{LedgerError, Result};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use log::debug;
    use std::io::Cursor;

    impl Workbook {
        /// Reads every sheet of an xlsx/xls/ods file held in memory.
        ///
        /// Cells keep their absolute column positions even when the used range
        /// does not start at A1.
        pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
            let mut book = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| LedgerError::Workbook(e.to_string()))?;

            let mut sheets = Vec::new();
            for name in book.sheet_names() {
                let range = book
                    .worksheet_range(&name)
                    .map_err(|e| LedgerError::Workbook(format!("sheet '{}': {}", name, e)))?;

                let (start_row, start_col) = range.start().unwrap_or((0, 0));
                let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];
                for row in range.rows() {
                    let mut cells = vec![Cell::Empty; start_col as usize];
                    cells.extend(row.iter().map(convert_cell));
                    rows.push(cells);
                }

                debug!("Read sheet '{}' with {} rows", name, rows.len());
                sheets.push(Sheet { name, rows });
            }

            Ok(Workbook { sheets })
        }
    }

    fn convert_cell(data: &Data) -> Cell {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Float(n) => Cell::Number(*n),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::Error(e) => Cell::Text(format!("#{:?}", e)),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) => Cell::Date(value.date()),
                None => Cell::Number(dt.as_f64()),
            },
        }
    }
}
