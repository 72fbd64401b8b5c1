pub mod fixtures;
mod harness;
mod test_directory;

pub use harness::{HarnessError, NegotiationHarness, Stage};
pub use test_directory::{prepare_test_dir, test_assets_dir};
