//! Filesystem abstraction
//!
//! Builders and the orchestrator reach the local disk through [`FileSystem`]
//! so tests can observe what they do. [`LocalFileSystem`] is the real thing.

use std::fmt::Debug;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Local file and directory operations
pub trait FileSystem: Send + Sync + Debug {
    /// Returns true if `path` is an existing file
    fn file_exists(&self, path: &Path) -> bool;

    /// Returns true if `path` is an existing directory
    fn directory_exists(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory cannot be created.
    fn create_directory(&self, path: &Path) -> io::Result<()>;

    /// Copies one file, creating the destination's parent
    ///
    /// # Errors
    ///
    /// Returns the IO error if the copy fails.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Recursively copies the contents of `from` into `to`
    ///
    /// Existing files in `to` are overwritten, other files are left alone, so
    /// repeated copies overlay each other. Returns the number of files copied.
    ///
    /// # Errors
    ///
    /// Returns the IO error of the first entry that cannot be copied.
    fn copy_directory(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Removes a directory tree; a missing directory is not an error
    ///
    /// # Errors
    ///
    /// Returns the IO error if removal fails.
    fn delete_directory(&self, path: &Path) -> io::Result<()>;

    /// Removes a file; a missing file is not an error
    ///
    /// # Errors
    ///
    /// Returns the IO error if removal fails.
    fn delete_file(&self, path: &Path) -> io::Result<()>;

    /// Writes `dir`'s contents into a zip archive at `archive`
    ///
    /// # Errors
    ///
    /// Returns the IO error if reading the tree or writing the archive fails.
    fn zip_directory(&self, dir: &Path, archive: &Path) -> io::Result<()>;

    /// Returns true if `dir` contains at least one file at any depth
    fn has_files(&self, dir: &Path) -> bool;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Creates the local filesystem
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn relative<'a>(path: &'a Path, base: &Path) -> io::Result<&'a Path> {
    path.strip_prefix(base)
        .map_err(|e| io::Error::other(format!("{}: {e}", path.display())))
}

impl FileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to).map(|_| ())
    }

    fn copy_directory(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if !from.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", from.display()),
            ));
        }

        let mut copied = 0;
        for entry in WalkDir::new(from) {
            let entry = entry?;
            let target = to.join(relative(entry.path(), from)?);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn delete_directory(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn zip_directory(&self, dir: &Path, archive: &Path) -> io::Result<()> {
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = zip::ZipWriter::new(File::create(archive)?);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let rel = relative(entry.path(), dir)?;
            if rel.as_os_str().is_empty() {
                continue;
            }
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                writer.add_directory(name, options)?;
            } else {
                writer.start_file(name, options)?;
                io::copy(&mut File::open(entry.path())?, &mut writer)?;
            }
        }
        writer.finish()?;
        Ok(())
    }

    fn has_files(&self, dir: &Path) -> bool {
        dir.is_dir()
            && WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .any(|entry| entry.file_type().is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_copy_directory_recursive() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("Game.uproject"), "{}");
        write(&src.path().join("Source/Game/Game.cpp"), "int x;");
        fs::create_dir_all(src.path().join("Content/Empty")).unwrap();

        let fs = LocalFileSystem::new();
        let copied = fs.copy_directory(src.path(), &dst.path().join("copy")).unwrap();

        assert_eq!(copied, 2);
        assert!(fs.file_exists(&dst.path().join("copy/Source/Game/Game.cpp")));
        assert!(fs.directory_exists(&dst.path().join("copy/Content/Empty")));
    }

    #[test]
    fn test_copy_directory_overlays() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&a.path().join("keep.txt"), "a");
        write(&a.path().join("shared.txt"), "a");
        write(&b.path().join("shared.txt"), "b");

        let fs = LocalFileSystem::new();
        fs.copy_directory(a.path(), dst.path()).unwrap();
        fs.copy_directory(b.path(), dst.path()).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("keep.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.path().join("shared.txt")).unwrap(), "b");
    }

    #[test]
    fn test_copy_missing_directory_fails() {
        let dst = tempfile::tempdir().unwrap();
        let err = LocalFileSystem::new()
            .copy_directory(Path::new("/does/not/exist"), dst.path())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let fs = LocalFileSystem::new();
        assert!(fs.delete_directory(Path::new("/does/not/exist")).is_ok());
        assert!(fs.delete_file(Path::new("/does/not/exist.txt")).is_ok());
    }

    #[test]
    fn test_zip_directory() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(&src.path().join("Binaries/Win64/Widget.dll"), "dll");
        write(&src.path().join("Widget.uplugin"), "{}");

        let archive = out.path().join("release/Widget_5.3.zip");
        LocalFileSystem::new().zip_directory(src.path(), &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "Binaries/",
                "Binaries/Win64/",
                "Binaries/Win64/Widget.dll",
                "Widget.uplugin",
            ]
        );
    }

    #[test]
    fn test_has_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        assert!(!fs.has_files(dir.path()));
        write(&dir.path().join("a/b/c.txt"), "x");
        assert!(fs.has_files(dir.path()));
        assert!(!fs.has_files(&dir.path().join("missing")));
    }
}
