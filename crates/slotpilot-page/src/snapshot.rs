//! Normalized view of the calendar page: an ordered list of rows, either a
//! day heading or a bookable item. This is the only shape the scanner and
//! the booking action ever see — HTML details stay in `html.rs`.

/// One row of the calendar list table, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRow {
    /// A day heading carrying the date the following items belong to.
    Heading {
        /// ISO date from the row's date attribute; may be empty when absent.
        date: String,
        /// Display label ("Monday, June 10").
        label: String,
    },
    /// A bookable activity row.
    Item {
        /// Raw time-range text, expected as `"HH:MM - HH:MM"`.
        time_text: String,
        /// Activity title.
        title: String,
        /// Background color signal; empty when the row carries none.
        color: String,
        /// Whether the row's booking control is present and enabled.
        bookable: bool,
        /// Portal-side identifier of the booking control, when exposed.
        event_id: Option<String>,
    },
}

/// Point-in-time capture of the active week's calendar rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub rows: Vec<PageRow>,
}

impl PageSnapshot {
    pub fn new(rows: Vec<PageRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
