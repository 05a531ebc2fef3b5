use crate::storage::watermark::Watermark;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerBound {
    /// `dt >= min_dt`; only the very first run, which has no watermark to exclude.
    Inclusive,
    /// `dt > min_dt`
    Exclusive,
}

/// The `[min_dt, max_dt]` slice of the table one run extracts.
/// The upper bound is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub min_dt: Watermark,
    pub max_dt: Watermark,
    pub lower: LowerBound,
}

impl Window {
    pub fn contains(&self, dt: &Watermark) -> bool {
        let above_min = match self.lower {
            LowerBound::Inclusive => dt >= &self.min_dt,
            LowerBound::Exclusive => dt > &self.min_dt,
        };
        above_min && dt <= &self.max_dt
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = match self.lower {
            LowerBound::Inclusive => '[',
            LowerBound::Exclusive => '(',
        };
        write!(f, "{open}{}, {}]", self.min_dt, self.max_dt)
    }
}
