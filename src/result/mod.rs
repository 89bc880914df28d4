pub mod reader;
pub mod table;

pub use reader::DataReader;
pub use table::{DataRow, DataTable};
