//! Cosmetic folder markers.
//!
//! A marker is a small metadata file that tags a category folder with its
//! icon (`desktop.ini` on Windows). Markers never influence classification
//! or restoring. Every failure here is reported to the caller as an
//! `io::Error` and the caller logs and drops it.

use crate::file_category::CategoryRule;
use std::fs;
use std::io;
use std::path::Path;

/// File name used for folder markers.
pub const MARKER_FILE_NAME: &str = "desktop.ini";

/// Best-effort tagging of category folders.
pub trait FolderMarker {
    /// Tags a freshly created category folder.
    fn mark(&self, folder: &Path, rule: &CategoryRule) -> io::Result<()>;

    /// Removes the tag, if present. Absence is not an error.
    fn unmark(&self, folder: &Path) -> io::Result<()>;
}

/// Writes a `desktop.ini` shell-info file carrying the category icon.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopIniMarker;

impl FolderMarker for DesktopIniMarker {
    fn mark(&self, folder: &Path, rule: &CategoryRule) -> io::Result<()> {
        let content = format!(
            "[.ShellClassInfo]\r\nIconResource=shell32.dll,3\r\nInfoTip={} {}\r\n[ViewState]\r\nMode=\r\nVid=\r\nFolderType=Generic\r\n",
            rule.icon, rule.label
        );
        fs::write(folder.join(MARKER_FILE_NAME), content)
    }

    fn unmark(&self, folder: &Path) -> io::Result<()> {
        let path = folder.join(MARKER_FILE_NAME);
        match fs::remove_file(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                // Windows refuses to delete read-only files.
                let mut permissions = fs::metadata(&path)?.permissions();
                permissions.set_readonly(false);
                fs::set_permissions(&path, permissions)?;
                fs::remove_file(&path)
            }
            other => other,
        }
    }
}

/// Leaves folders untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarker;

impl FolderMarker for NoMarker {
    fn mark(&self, _folder: &Path, _rule: &CategoryRule) -> io::Result<()> {
        Ok(())
    }

    fn unmark(&self, _folder: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// The marker that suits the host platform.
pub fn platform_marker() -> Box<dyn FolderMarker> {
    if cfg!(windows) {
        Box::new(DesktopIniMarker)
    } else {
        Box::new(NoMarker)
    }
}
