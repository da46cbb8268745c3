use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `data` in one rename, so readers never observe a
/// half-written config.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".pitstop-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pitstop/config.yaml");
        atomic_write(&path, b"project: {name: a}").unwrap();
        atomic_write(&path, b"project: {name: b}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "project: {name: b}");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join(".pitstop");
        ensure_dir(&p).unwrap();
        ensure_dir(&p).unwrap();
        assert!(p.is_dir());
    }
}
