//! Filesystem primitives shared by the organizer and the restorer.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Returns `destination` if it is free, otherwise the first free sibling
/// named with a `_1`, `_2`, … suffix.
///
/// Files keep their extension (`a.txt` → `a_1.txt`); directories get a bare
/// suffix (`notes` → `notes_1`). The search ends because a directory holds
/// finitely many entries.
///
/// # Examples
///
/// ```no_run
/// use desktidy::fs_ops::resolve_collision;
/// use std::path::Path;
///
/// let free = resolve_collision(Path::new("/desk/Documents/a.txt"), false);
/// println!("{}", free.display());
/// ```
pub fn resolve_collision(destination: &Path, is_dir: bool) -> PathBuf {
    if !exists(destination) {
        return destination.to_path_buf();
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = numbered_sibling(destination, is_dir, counter);
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// `stem_N.ext` for files, `name_N` for directories.
pub fn numbered_sibling(path: &Path, is_dir: bool, counter: u64) -> PathBuf {
    let suffix = format!("_{}", counter);

    let name: OsString = match (is_dir, path.file_stem(), path.extension()) {
        (false, Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(&suffix);
            name.push(".");
            name.push(ext);
            name
        }
        _ => {
            let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            name.push(&suffix);
            name
        }
    };

    path.with_file_name(name)
}

/// Existence check that also sees dangling symlinks.
fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Moves a file or directory (as a unit) to `to`.
///
/// Uses `rename`; when the two paths are on different filesystems it falls
/// back to copy-then-delete. The source is only removed after the copy
/// completed.
pub fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "rename crossed devices, copying");
            copy_then_remove(from, to)
        }
        Err(e) => Err(e),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(from)?;
    if metadata.is_dir() {
        if let Err(e) = copy_dir_recursive(from, to) {
            // Leave no half-copied tree behind; the source is untouched.
            let _ = fs::remove_dir_all(to);
            return Err(e);
        }
        fs::remove_dir_all(from)
    } else {
        if let Err(e) = fs::copy(from, to) {
            let _ = fs::remove_file(to);
            return Err(e);
        }
        fs::remove_file(from)
    }
}

/// Recursively copy a directory
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_free_destination_is_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("a.txt");
        assert_eq!(resolve_collision(&dest, false), dest);
    }

    #[test]
    fn test_file_collision_keeps_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("a.txt");
        fs::write(&dest, "one").unwrap();
        fs::write(temp_dir.path().join("a_1.txt"), "two").unwrap();

        assert_eq!(
            resolve_collision(&dest, false),
            temp_dir.path().join("a_2.txt")
        );
    }

    #[test]
    fn test_directory_collision_uses_bare_suffix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("photos.2024");
        fs::create_dir(&dest).unwrap();

        assert_eq!(
            resolve_collision(&dest, true),
            temp_dir.path().join("photos.2024_1")
        );
    }

    #[test]
    fn test_numbered_sibling_edge_names() {
        let base = Path::new("/x");
        assert_eq!(
            numbered_sibling(&base.join("archive.tar.gz"), false, 1),
            base.join("archive.tar_1.gz")
        );
        assert_eq!(
            numbered_sibling(&base.join(".bashrc"), false, 2),
            base.join(".bashrc_2")
        );
        assert_eq!(
            numbered_sibling(&base.join("README"), false, 3),
            base.join("README_3")
        );
    }

    #[test]
    fn test_move_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let from = temp_dir.path().join("a.txt");
        let to = temp_dir.path().join("b.txt");
        fs::write(&from, "content").unwrap();

        move_entry(&from, &to).expect("Move failed");
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "content");
    }

    #[test]
    fn test_move_directory_as_unit() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let from = temp_dir.path().join("notes");
        fs::create_dir_all(from.join("inner")).unwrap();
        fs::write(from.join("inner").join("n.txt"), "n").unwrap();
        let to = temp_dir.path().join("Folders").join("notes");
        fs::create_dir(temp_dir.path().join("Folders")).unwrap();

        move_entry(&from, &to).expect("Move failed");
        assert!(!from.exists());
        assert!(to.join("inner").join("n.txt").exists());
    }

    #[test]
    fn test_move_missing_source_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = move_entry(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("dest"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("a").join("b")).unwrap();
        fs::write(src.join("top.txt"), "t").unwrap();
        fs::write(src.join("a").join("b").join("deep.txt"), "d").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir_recursive(&src, &dst).expect("Copy failed");

        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "t");
        assert_eq!(
            fs::read_to_string(dst.join("a").join("b").join("deep.txt")).unwrap(),
            "d"
        );
        assert!(src.exists());
    }
}
