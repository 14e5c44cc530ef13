use crate::config::{FileMatcherConfig, MatchStrategy, ObligationParserConfig};
use crate::schema::{FileRef, ObligationRecord};
use crate::workbook::{Cell, Sheet, Workbook};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const COL_SUPPLIER: usize = 1;
const COL_INVOICE: usize = 2;
const COL_DUE_DATE: usize = 3;
const COL_AMOUNT: usize = 4;
const COL_CATEGORY: usize = 5;
const COL_STATUS: usize = 6;
const COL_PAYMENT_METHOD: usize = 7;

/// Why a data row was dropped or a value ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub sheet_name: String,
    /// Zero-based row index within the sheet.
    pub row: usize,
    pub field: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParseOutcome {
    pub obligations: Vec<ObligationRecord>,
    pub issues: Vec<ValidationIssue>,
}

pub struct ObligationParser {
    config: ObligationParserConfig,
}

impl Default for ObligationParser {
    fn default() -> Self {
        Self::new(ObligationParserConfig::default())
    }
}

pub fn parse_obligations(workbook: &Workbook) -> ParseOutcome {
    ObligationParser::default().parse(workbook)
}

impl ObligationParser {
    pub fn new(config: ObligationParserConfig) -> Self {
        Self { config }
    }

    /// Reads every sheet. Bad rows are skipped and reported, never fatal.
    pub fn parse(&self, workbook: &Workbook) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        for sheet in &workbook.sheets {
            self.parse_sheet(sheet, &mut outcome);
        }

        info!(
            "Parsed {} obligations from {} sheets ({} rows skipped)",
            outcome.obligations.len(),
            workbook.sheets.len(),
            outcome.issues.len()
        );
        outcome
    }

    fn parse_sheet(&self, sheet: &Sheet, outcome: &mut ParseOutcome) {
        let mut protocol_number: Option<String> = None;
        let mut header_found = false;

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            if protocol_number.is_none() {
                protocol_number = self.find_protocol_number(row);
            }

            if !header_found {
                header_found = row
                    .iter()
                    .any(|cell| cell.as_text().contains(&self.config.header_marker));
                continue;
            }

            let issue = |field: &str, details: String| ValidationIssue {
                sheet_name: sheet.name.clone(),
                row: row_idx,
                field: field.to_string(),
                details,
            };

            let Some(supplier) = cell_at(row, COL_SUPPLIER).trimmed() else {
                continue;
            };
            let amount_cell = cell_at(row, COL_AMOUNT);
            if amount_cell.is_blank() {
                outcome
                    .issues
                    .push(issue("amount", format!("no amount for supplier '{}'", supplier)));
                continue;
            }
            if supplier
                .to_lowercase()
                .contains(&self.config.total_marker.to_lowercase())
            {
                debug!("Skipping subtotal row {} in sheet '{}'", row_idx, sheet.name);
                continue;
            }

            let amount = match parse_amount(amount_cell) {
                Some(value) if value > 0.0 => value,
                _ => {
                    outcome.issues.push(issue(
                        "amount",
                        format!("invalid or non-positive amount '{}'", amount_cell.as_text()),
                    ));
                    continue;
                }
            };

            let due_cell = cell_at(row, COL_DUE_DATE);
            let due_date = parse_due_date(due_cell);
            if due_date.is_none() && !due_cell.is_blank() {
                outcome.issues.push(issue(
                    "due_date",
                    format!("unrecognized date '{}'", due_cell.as_text()),
                ));
            }

            let status = cell_at(row, COL_STATUS)
                .trimmed()
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|| self.config.default_status.clone());

            outcome.obligations.push(ObligationRecord {
                protocol_number: protocol_number.clone(),
                sheet_name: sheet.name.clone(),
                supplier,
                invoice_number: cell_at(row, COL_INVOICE).trimmed(),
                due_date,
                amount,
                category: cell_at(row, COL_CATEGORY).trimmed(),
                status,
                payment_method: cell_at(row, COL_PAYMENT_METHOD).trimmed(),
                assigned_to: None,
                payment_code: None,
                slip_file: None,
                invoice_file: None,
            });
        }
    }

    fn find_protocol_number(&self, row: &[Cell]) -> Option<String> {
        row.iter().enumerate().find_map(|(i, cell)| {
            if cell.as_text().trim() != self.config.protocol_marker {
                return None;
            }
            row.get(i + 1).and_then(Cell::trimmed)
        })
    }
}

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(idx).unwrap_or(&EMPTY)
}

/// Text amounts keep only digits and commas; the first comma is the decimal
/// point and anything after a second comma is ignored (`"R$ 1.234,56"` → 1234.56).
pub fn parse_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(text) => {
            let kept: String = text
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == ',')
                .collect();
            let mut parts = kept.split(',');
            let units = parts.next().unwrap_or("");
            let decimals = parts.next().unwrap_or("");
            if units.is_empty() && decimals.is_empty() {
                return None;
            }
            format!("{}.{}", units, decimals)
                .trim_end_matches('.')
                .parse::<f64>()
                .ok()
        }
        _ => None,
    }
}

/// Accepts `D/M/Y` (two-digit years are 20YY), ISO `YYYY-MM-DD` with an optional
/// `T...` time suffix, or a date cell. Anything else is `None`.
pub fn parse_due_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(text) => {
            let text = text.trim();
            if text.contains('/') {
                let parts: Vec<&str> = text.split('/').map(str::trim).collect();
                let [day, month, year] = parts.as_slice() else {
                    return None;
                };
                let year: i32 = if year.len() == 2 {
                    format!("20{}", year).parse().ok()?
                } else {
                    year.parse().ok()?
                };
                NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
            } else if text.contains('-') {
                let date_part = text.split('T').next().unwrap_or(text);
                NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

pub struct FileMatcher {
    config: FileMatcherConfig,
}

impl Default for FileMatcher {
    fn default() -> Self {
        Self::new(FileMatcherConfig::default())
    }
}

pub fn match_files_to_obligations(
    obligations: &[ObligationRecord],
    files: &[FileRef],
) -> Vec<ObligationRecord> {
    FileMatcher::default().match_files(obligations, files)
}

impl FileMatcher {
    pub fn new(config: FileMatcherConfig) -> Self {
        Self { config }
    }

    /// Splits files into (slip pool, invoice pool). A name carrying both kinds of
    /// marker goes to the invoice pool; names with neither are ignored.
    pub fn partition<'a>(&self, files: &'a [FileRef]) -> (Vec<&'a FileRef>, Vec<&'a FileRef>) {
        let mut slips = Vec::new();
        let mut invoices = Vec::new();
        for file in files {
            let upper = file.name.to_uppercase();
            let has = |markers: &[String]| markers.iter().any(|m| upper.contains(&m.to_uppercase()));
            if has(self.config.invoice_markers.as_slice()) {
                invoices.push(file);
            } else if has(self.config.slip_markers.as_slice()) {
                slips.push(file);
            }
        }
        (slips, invoices)
    }

    /// Returns the obligations with their slip and invoice slots filled by the
    /// first compatible file of each pool. Best effort: two obligations with the
    /// same supplier prefix can land on the same file unless the strategy is
    /// [`MatchStrategy::Exclusive`].
    pub fn match_files(
        &self,
        obligations: &[ObligationRecord],
        files: &[FileRef],
    ) -> Vec<ObligationRecord> {
        let (slips, invoices) = self.partition(files);
        let mut taken_slips: HashSet<usize> = HashSet::new();
        let mut taken_invoices: HashSet<usize> = HashSet::new();

        let matched: Vec<ObligationRecord> = obligations
            .iter()
            .map(|obligation| {
                let keys = MatchKeys::new(obligation, self.config.supplier_key_len);
                let mut record = obligation.clone();
                record.slip_file = self.pick(&slips, &keys, &mut taken_slips);
                record.invoice_file = self.pick(&invoices, &keys, &mut taken_invoices);
                record
            })
            .collect();

        debug!(
            "Matched files for {} obligations against {} slips and {} invoices",
            matched.len(),
            slips.len(),
            invoices.len()
        );
        matched
    }

    fn pick(
        &self,
        pool: &[&FileRef],
        keys: &MatchKeys,
        taken: &mut HashSet<usize>,
    ) -> Option<FileRef> {
        let exclusive = self.config.strategy == MatchStrategy::Exclusive;
        let (idx, file) = pool
            .iter()
            .enumerate()
            .filter(|(idx, _)| !exclusive || !taken.contains(idx))
            .find(|(_, file)| keys.matches(&file.name))?;
        if exclusive {
            taken.insert(idx);
        }
        Some((*file).clone())
    }
}

struct MatchKeys {
    supplier: String,
    amount_underscored: String,
    amount_padded: String,
}

impl MatchKeys {
    fn new(obligation: &ObligationRecord, supplier_key_len: usize) -> Self {
        let supplier: String = obligation
            .supplier
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(supplier_key_len)
            .collect();

        Self {
            supplier,
            amount_underscored: obligation.amount.to_string().replacen('.', "_", 1),
            amount_padded: format!("{:04}", obligation.amount.round() as i64),
        }
    }

    fn matches(&self, filename: &str) -> bool {
        (!self.supplier.is_empty() && filename.to_uppercase().contains(&self.supplier))
            || filename.contains(&self.amount_underscored)
            || filename.contains(&self.amount_padded)
    }
}
