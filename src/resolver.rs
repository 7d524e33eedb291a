//! Resolver configuration file updates.
//!
//! The file is rewritten from scratch on each DHCP pass that carries DNS
//! servers, but only when the content actually changes: a byte comparison
//! against the current file precedes every write.

use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use netconfd_net::FileStore;
use tracing::{debug, info};

pub const RESOLV_CONF: &str = "/etc/resolv.conf";

const FILE_MODE: u32 = 0o644;

/// Render the resolver file content for a set of nameservers.
pub fn render(servers: &[Ipv4Addr]) -> String {
    let mut content = String::from("# Generated by netconfd\n");
    for server in servers {
        content.push_str(&format!("nameserver {}\n", server));
    }
    content
}

/// Rewrite the resolver file at the default path.
pub fn update<F: FileStore + ?Sized>(files: &F, servers: &[Ipv4Addr]) -> io::Result<()> {
    update_at(files, Path::new(RESOLV_CONF), servers)
}

/// Rewrite the resolver file at `path`, skipping the write when the current
/// content is already identical.
pub fn update_at<F: FileStore + ?Sized>(
    files: &F,
    path: &Path,
    servers: &[Ipv4Addr],
) -> io::Result<()> {
    let content = render(servers);

    if let Ok(current) = files.read(path) {
        if current == content.as_bytes() {
            debug!(path = %path.display(), "resolver configuration already up to date, skipping");
            return Ok(());
        }
    }

    files.write(path, content.as_bytes(), FILE_MODE)?;
    info!(path = %path.display(), nameservers = servers.len(), "updated resolver configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryFiles {
        contents: Mutex<HashMap<PathBuf, Vec<u8>>>,
        writes: Mutex<usize>,
    }

    impl FileStore for MemoryFiles {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.contents
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn write(&self, path: &Path, data: &[u8], _mode: u32) -> io::Result<()> {
            *self.writes.lock().unwrap() += 1;
            self.contents
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), data.to_vec());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.contents.lock().unwrap().contains_key(path)
        }
    }

    #[test]
    fn test_render_format() {
        let content = render(&[Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)]);
        assert_eq!(
            content,
            "# Generated by netconfd\nnameserver 8.8.8.8\nnameserver 1.1.1.1\n"
        );
    }

    #[test]
    fn test_first_update_writes() {
        let files = MemoryFiles::default();
        let path = Path::new("/etc/resolv.conf");

        update_at(&files, path, &[Ipv4Addr::new(8, 8, 8, 8)]).unwrap();

        assert_eq!(*files.writes.lock().unwrap(), 1);
        assert_eq!(
            files.read(path).unwrap(),
            b"# Generated by netconfd\nnameserver 8.8.8.8\n"
        );
    }

    #[test]
    fn test_identical_content_skips_write() {
        let files = MemoryFiles::default();
        let path = Path::new("/etc/resolv.conf");
        let servers = [Ipv4Addr::new(8, 8, 8, 8)];

        update_at(&files, path, &servers).unwrap();
        update_at(&files, path, &servers).unwrap();

        assert_eq!(*files.writes.lock().unwrap(), 1);
    }

    #[test]
    fn test_changed_content_rewrites() {
        let files = MemoryFiles::default();
        let path = Path::new("/etc/resolv.conf");

        update_at(&files, path, &[Ipv4Addr::new(8, 8, 8, 8)]).unwrap();
        update_at(&files, path, &[Ipv4Addr::new(1, 1, 1, 1)]).unwrap();

        assert_eq!(*files.writes.lock().unwrap(), 2);
        assert_eq!(
            files.read(path).unwrap(),
            b"# Generated by netconfd\nnameserver 1.1.1.1\n"
        );
    }
}
