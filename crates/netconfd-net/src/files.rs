//! Small-file adapter used for the resolver configuration file.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Read/write/exists over small text files.
///
/// Writes are atomic from the reader's perspective: content lands in a
/// temporary file in the target directory and is renamed into place.
pub trait FileStore: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileStore`] backed by the local filesystem.
pub struct SystemFiles;

impl FileStore for SystemFiles {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        // The permission bits from open() are masked by the umask; force the
        // requested mode before the file becomes visible at the final path.
        fs::set_permissions(&tmp, fs::Permissions::from_mode(mode))?;
        fs::rename(&tmp, path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
