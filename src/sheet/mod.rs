//! Spreadsheet interchange. Import reads the fixed sheet layout the journal
//! has always used; export writes the same layout back out as CSV.

pub mod export;
pub mod import;

pub use export::export_trades;
pub use import::{import_rows, import_workbook, ImportOutcome, RowError};

/// Fixed column offsets of the sheet layout. The gaps between groups carry
/// presentation padding and are ignored on import.
pub(crate) mod columns {
    pub const DATE: usize = 0;
    pub const ASSET: usize = 6;
    pub const SESSION: usize = 11;
    pub const RISK: usize = 25;
    pub const PROFIT_LOSS: usize = 28;
    pub const SETUP: usize = 31;
    pub const NOTES: usize = 36;
    pub const LINK: usize = 50;

    /// Width of a full row, link column included.
    pub const ROW_WIDTH: usize = LINK + 1;
}
