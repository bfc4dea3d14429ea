pub mod test_harness;

pub use data_validation::{id_column, name_column, validate_rows};
pub use test_harness::TestHarness;
