//! Release merging
//!
//! Each editor platform packages the plugin for its own targets. The release
//! tree takes the first successful package whole, then overlays only the
//! platform-specific `Binaries` and `Intermediate` trees of the others.

use std::path::{Path, PathBuf};

use crate::infrastructure::FileSystem;
use crate::model::{BuildError, EditorPlatform, EngineVersion};
use crate::paths::{LocalLayout, PackageKind};

/// Subtrees that differ between platform packages
pub const PLATFORM_SUBTREES: [&str; 2] = ["Binaries", "Intermediate"];

/// Where a merge put its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRelease {
    /// Merged plugin tree
    pub directory: PathBuf,
    /// Zip of the merged tree, when requested
    pub archive: Option<PathBuf>,
    /// Platforms whose packages were merged, in order
    pub platforms: Vec<EditorPlatform>,
}

/// `<root>/release/<Plugin>_<Version>.zip`
#[must_use]
pub fn release_archive(root: &Path, plugin: &str, version: EngineVersion) -> PathBuf {
    root.join("release").join(format!("{plugin}_{version}.zip"))
}

/// Merges the plugin packages of `platforms` into the release tree
///
/// Returns `Ok(None)` when `platforms` is empty. Package directories are only
/// read.
///
/// # Errors
///
/// Returns the first filesystem error.
pub fn merge_release(
    fs: &dyn FileSystem,
    root: &Path,
    plugin: &str,
    version: EngineVersion,
    platforms: &[EditorPlatform],
    zip: bool,
) -> Result<Option<MergedRelease>, BuildError> {
    let Some((first, rest)) = platforms.split_first() else {
        return Ok(None);
    };

    let release = LocalLayout::release_dir(root, plugin, version);
    fs.delete_directory(&release)
        .map_err(|e| BuildError::filesystem(&release, e))?;

    let package = |platform: EditorPlatform| {
        LocalLayout::resolve(root, platform, version).package_dir(PackageKind::Plugin)
    };

    let source = package(*first);
    let files = fs
        .copy_directory(&source, &release)
        .map_err(|e| BuildError::filesystem(&source, e))?;
    tracing::info!(platform = %first, %version, files, "Release tree seeded");

    for platform in rest {
        let source = package(*platform);
        for subtree in PLATFORM_SUBTREES {
            let from = source.join(subtree);
            if !fs.directory_exists(&from) {
                continue;
            }
            let files = fs
                .copy_directory(&from, &release.join(subtree))
                .map_err(|e| BuildError::filesystem(&from, e))?;
            tracing::info!(%platform, %version, subtree, files, "Merged platform binaries");
        }
    }

    let archive = if zip {
        let archive = release_archive(root, plugin, version);
        fs.zip_directory(&release, &archive)
            .map_err(|e| BuildError::filesystem(&archive, e))?;
        tracing::info!(path = %archive.display(), "Release archive written");
        Some(archive)
    } else {
        None
    };

    Ok(Some(MergedRelease {
        directory: release,
        archive,
        platforms: platforms.to_vec(),
    }))
}
