use anyhow::Context;
use std::fs;
use std::path::PathBuf;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("tests")
        .join("test-workdir")
}

/// Checked-in policy files used as fixtures.
pub fn test_assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

fn escape_path(path: &str) -> String {
    // Test names carry `::`, which Windows paths can't.
    path.replace("::", "_")
}

/// Fresh working directory for one test, wiped if a previous run left
/// it behind.
pub fn prepare_test_dir(dir_name: &str) -> anyhow::Result<PathBuf> {
    let test_dir: PathBuf = test_data_dir().join(escape_path(dir_name).as_str());

    if test_dir.exists() {
        fs::remove_dir_all(&test_dir)
            .with_context(|| format!("Removing test directory: {}", test_dir.display()))?;
    }
    fs::create_dir_all(&test_dir)
        .with_context(|| format!("Creating test directory: {}", test_dir.display()))?;
    Ok(test_dir)
}
