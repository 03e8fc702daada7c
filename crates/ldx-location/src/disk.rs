//! Loose files served straight from a data directory.
//!
//! The reference [`LooseFileBackend`]: what the host's own loose-file
//! location does, minus the archive machinery. Its traversal walks the
//! directory tree on every call, which is exactly the cost the cache avoids.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ldx_cache::{PathNormalizer, SEPARATOR};
use walkdir::WalkDir;

use crate::protocol::{ErrorCode, Location, LooseFileBackend, Result, Traverser};

pub const DISK_LOCATION_NAME: &str = "DiskLooseFiles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct DiskLooseFiles {
    data_dir: PathBuf,
    normalizer: PathNormalizer,
    prefix: String,
}

impl DiskLooseFiles {
    pub fn new(data_dir: impl Into<PathBuf>, normalizer: PathNormalizer) -> Self {
        let data_dir = data_dir.into();
        let prefix = data_dir.display().to_string();
        Self {
            data_dir,
            normalizer,
            prefix,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Filesystem path of a canonical (or raw) request path.
    ///
    /// Canonical paths are lowercase; mixed-case trees need a
    /// case-insensitive filesystem.
    pub fn file_path(&self, path: &str) -> PathBuf {
        let canonical = self.normalizer.normalize(path);
        let relative = match self.normalizer.root() {
            Some(root) => canonical
                .strip_prefix(root.marker_prefix())
                .unwrap_or(&canonical),
            None => canonical.as_str(),
        };
        relative
            .split(SEPARATOR)
            .filter(|c| !c.is_empty() && *c != "." && *c != "..")
            .fold(self.data_dir.clone(), |acc, c| acc.join(c))
    }

    /// Canonical names of every regular file under the data directory, sorted
    pub fn walk(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.data_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.data_dir)
                    .ok()
                    .map(|rel| self.normalizer.normalize(&rel.to_string_lossy()))
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort_unstable();
        names
    }

    fn open(&self, path: &str) -> Result<File> {
        File::open(self.file_path(path)).map_err(io_code)
    }

    fn info(&self, path: &str) -> Result<DiskInfo> {
        let metadata = fs::metadata(self.file_path(path)).map_err(io_code)?;
        if !metadata.is_file() {
            return Err(ErrorCode::InvalidType);
        }
        Ok(DiskInfo {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

fn io_code(e: io::Error) -> ErrorCode {
    match e.kind() {
        io::ErrorKind::NotFound => ErrorCode::NotExist,
        io::ErrorKind::OutOfMemory => ErrorCode::MemoryError,
        _ => ErrorCode::FileError,
    }
}

impl Location for DiskLooseFiles {
    type Stream = File;
    type AsyncStream = File;
    type Info = DiskInfo;

    fn create_stream(&self, path: &str, _read_only: bool) -> Result<File> {
        self.open(path)
    }

    fn create_async_stream(&self, path: &str, _read_only: bool) -> Result<File> {
        self.open(path)
    }

    fn traverse_prefix(&self, prefix: &str, traverser: &mut dyn Traverser) -> ErrorCode {
        let prefix = self.normalizer.normalize_prefix(prefix);
        let mut found = false;
        for name in self.walk().iter().filter(|n| n.starts_with(prefix.as_str())) {
            traverser.process_name(name, DISK_LOCATION_NAME);
            found = true;
        }
        if found {
            ErrorCode::None
        } else {
            ErrorCode::NotExist
        }
    }

    fn get_info(&self, path: &str) -> Result<DiskInfo> {
        self.info(path)
    }

    fn get_info_with_traverser(
        &self,
        path: &str,
        _traverser: Option<&mut dyn Traverser>,
    ) -> Result<DiskInfo> {
        self.info(path)
    }

    fn delete(&self, _path: &str) -> ErrorCode {
        ErrorCode::Unsupported
    }

    fn name(&self) -> &str {
        DISK_LOCATION_NAME
    }

    fn minimum_async_packet_size(&self) -> u32 {
        0
    }
}

impl LooseFileBackend for DiskLooseFiles {
    fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn backend() -> (TempDir, DiskLooseFiles) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Data");
        fs::create_dir_all(root.join("meshes/armor")).unwrap();
        fs::create_dir_all(root.join("textures")).unwrap();
        fs::write(root.join("meshes/armor/helmet.nif"), b"NIF").unwrap();
        fs::write(root.join("textures/face.dds"), b"DDS!").unwrap();
        let disk = DiskLooseFiles::new(&root, PathNormalizer::with_root("data", "root"));
        (temp, disk)
    }

    #[test]
    fn test_walk_yields_canonical_names() {
        let (_temp, disk) = backend();
        assert_eq!(
            disk.walk(),
            vec![r"data\meshes\armor\helmet.nif", r"data\textures\face.dds"]
        );
    }

    #[test]
    fn test_canonical_path_maps_to_file() {
        let (_temp, disk) = backend();
        let mut body = String::new();
        disk.create_stream(r"data\meshes\armor\helmet.nif", true)
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "NIF");
        assert_eq!(disk.get_info(r"data\textures\face.dds").unwrap().size, 4);
        assert_eq!(disk.get_info(r"data\textures\nope.dds"), Err(ErrorCode::NotExist));
        assert_eq!(disk.get_info(r"data\textures"), Err(ErrorCode::InvalidType));
    }

    #[test]
    fn test_parent_components_stay_inside() {
        let (_temp, disk) = backend();
        let path = disk.file_path(r"data\..\..\etc\passwd");
        assert!(path.starts_with(disk.data_dir()));
    }

    #[test]
    fn test_native_traversal() {
        let (_temp, disk) = backend();
        let mut names = Vec::new();
        let code = disk.traverse_prefix("meshes", &mut |n: &str, _: &str| names.push(n.to_string()));
        assert_eq!(code, ErrorCode::None);
        assert_eq!(names, vec![r"data\meshes\armor\helmet.nif"]);
        assert_eq!(
            disk.traverse_prefix("sound", &mut |_: &str, _: &str| {}),
            ErrorCode::NotExist
        );
    }
}
