//! Blocking recursive asset copy, run on the blocking pool.
//!
//! Symbolic links are followed: a linked directory is copied as a directory
//! and a linked file as its contents. A link cycle is an error.

use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;
use walkdir::WalkDir;

/// Copies a file or directory into `dest_dir`, keeping its file name.
///
/// Returns `Ok(false)` when `source` does not exist.
///
/// # Errors
///
/// Returns the first IO error hit while copying, including a link cycle.
pub fn copy_asset(source: &Path, dest_dir: &Path) -> io::Result<bool> {
    let Some(name) = source.file_name() else {
        return Ok(false);
    };
    match fs::metadata(source) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
        Ok(_) => {}
    }

    let root = dest_dir.join(name);
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        let target = match entry.path().strip_prefix(source) {
            Ok(relative) if !relative.as_os_str().is_empty() => root.join(relative),
            _ => root.clone(),
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if entry.path_is_symlink() {
                trace!(link = %entry.path().display(), "Copying link target");
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_source_is_skipped() {
        let dir = TempDir::new().unwrap();
        assert!(!copy_asset(&dir.path().join("nope"), dir.path()).unwrap());
    }

    #[test]
    fn test_single_file_copy() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let config = src.path().join("config.yaml");
        fs::write(&config, "k: v").unwrap();

        assert!(copy_asset(&config, dst.path()).unwrap());
        assert_eq!(fs::read_to_string(dst.path().join("config.yaml")).unwrap(), "k: v");
    }

    #[test]
    fn test_nested_directory_copy() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let util = src.path().join("util");
        fs::create_dir_all(util.join("deep")).unwrap();
        fs::create_dir_all(util.join("empty")).unwrap();
        fs::write(util.join("deep/font.ttf"), b"ttf").unwrap();

        assert!(copy_asset(&util, dst.path()).unwrap());
        assert_eq!(fs::read(dst.path().join("util/deep/font.ttf")).unwrap(), b"ttf");
        assert!(dst.path().join("util/empty").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_followed() {
        use std::os::unix::fs::symlink;

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let fonts = src.path().join("fonts");
        fs::create_dir_all(&fonts).unwrap();
        fs::write(fonts.join("simhei.ttf"), b"ttf").unwrap();

        let util = src.path().join("util");
        fs::create_dir_all(&util).unwrap();
        symlink(&fonts, util.join("fonts")).unwrap();
        symlink(fonts.join("simhei.ttf"), util.join("default.ttf")).unwrap();

        assert!(copy_asset(&util, dst.path()).unwrap());

        let copied_dir = dst.path().join("util/fonts");
        assert!(fs::symlink_metadata(&copied_dir).unwrap().is_dir());
        assert_eq!(fs::read(copied_dir.join("simhei.ttf")).unwrap(), b"ttf");

        let copied_file = dst.path().join("util/default.ttf");
        assert!(fs::symlink_metadata(&copied_file).unwrap().is_file());
        assert_eq!(fs::read(copied_file).unwrap(), b"ttf");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_an_error() {
        use std::os::unix::fs::symlink;

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let util = src.path().join("util");
        fs::create_dir_all(&util).unwrap();
        symlink(&util, util.join("again")).unwrap();

        assert!(copy_asset(&util, dst.path()).is_err());
    }
}
