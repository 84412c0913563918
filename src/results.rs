pub mod result_set;
pub mod row;

pub use result_set::{AFFECTED_ROWS, LAST_INSERT_ID, ResultSet};
pub use row::CustomDbRow;
