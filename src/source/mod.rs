pub mod duckdb;
pub mod row;
pub mod timestamp;
pub mod traits;
pub mod window;

pub use self::duckdb::{DuckDbConnector, DuckDbSource};
pub use row::{RawRow, RowStream};
pub use traits::{Connector, DataSource, SourceError};
pub use window::{LowerBound, Window};
