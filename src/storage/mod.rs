pub mod dataset;
pub mod registry;

pub use dataset::{ColumnInfo, Dataset, SqlExecutor, TableInfo};
pub use registry::{DatasetInfo, DatasetRegistry};
