use std::path::{Path, PathBuf};

pub const PITSTOP_DIR: &str = ".pitstop";
pub const CONFIG_FILE: &str = ".pitstop/config.yaml";
pub const DEFAULT_DB_FILE: &str = ".pitstop/pitstop.db";

pub fn pitstop_dir(root: &Path) -> PathBuf {
    root.join(PITSTOP_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_under_pitstop_dir() {
        let root = Path::new("/tmp/proj");
        assert!(config_path(root).starts_with(pitstop_dir(root)));
    }
}
