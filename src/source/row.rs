/// One `ol_transactions` row as the database rendered it.
///
/// Cells stay textual so that a malformed value fails only its own row
/// when it is transformed, not the whole query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub dt: Option<String>,
    pub total: Option<String>,
    pub duration: Option<String>,
}

impl RawRow {
    pub fn new(dt: impl Into<String>, total: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            dt: Some(dt.into()),
            total: Some(total.into()),
            duration: Some(duration.into()),
        }
    }
}

/// Finite, single-pass sequence of rows produced by one window query.
#[derive(Debug)]
pub struct RowStream {
    rows: std::vec::IntoIter<RawRow>,
}

impl RowStream {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for RowStream {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
