//! Path and command synthesis
//!
//! Pure, deterministic functions mapping (host, engine version, repository
//! layout) onto toolchain paths and command lines. Nothing here touches the
//! filesystem. Paths for Windows hosts are joined with `\`, everything else
//! with `/`, whatever OS this process runs on.
//!
//! Builders go through these functions for every path and argument they use.

mod args;
mod layout;

pub use args::{
    CommandLine, automation_test, editor_build, package_targets, plugin_package, project_package,
};
pub use layout::{
    BUILD_LOG, HostLayout, LocalLayout, PACKAGE_LOG, PackageKind, TEST_LOG, TEST_REPORT,
    phase_label,
};

use crate::model::{EditorPlatform, EngineVersion, HostKind};

/// Engine root used inside the Linux build container
pub const CONTAINER_ENGINE_ROOT: &str = "/home/ue4/UnrealEngine";

/// Mount point of the working copy inside the Linux build container
pub const CONTAINER_PROJECT_ROOT: &str = "/project";

/// Mount point of the result root inside the Linux build container
pub const CONTAINER_RESULT_ROOT: &str = "/results";

/// Default engine installation base on Windows hosts
pub const DEFAULT_WINDOWS_ENGINE_BASE: &str = r"C:\Program Files\Epic Games";

/// Default engine installation base on Mac hosts
pub const DEFAULT_MAC_ENGINE_BASE: &str = "/Users/Shared/Epic Games";

/// Path separator for `platform`
#[must_use]
pub fn separator(platform: EditorPlatform) -> char {
    if platform.uses_backslash() { '\\' } else { '/' }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Joins `parts` onto `base` with the separator of `platform`
///
/// Separators inside `parts` are rewritten to the platform's; empty parts are
/// skipped and no doubled separators are produced. On Windows the base is
/// normalised as well.
#[must_use]
pub fn join(platform: EditorPlatform, base: &str, parts: &[&str]) -> String {
    let sep = separator(platform);
    let mut out = if platform.uses_backslash() {
        base.replace('/', "\\")
    } else {
        base.to_string()
    };

    for part in parts {
        let part = part.trim_matches(is_separator);
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with(is_separator) {
            out.push(sep);
        }
        out.extend(part.chars().map(|c| if is_separator(c) { sep } else { c }));
    }
    out
}

/// Directory name of an installed engine, e.g. `UE_5.3`
#[must_use]
pub fn engine_dir_name(version: EngineVersion) -> String {
    format!("UE_{version}")
}

/// Engine installation root
///
/// The Linux container root is fixed by the image; every other host installs
/// engines side by side under `engine_base`.
#[must_use]
pub fn engine_root(host: HostKind, version: EngineVersion, engine_base: &str) -> String {
    match host {
        HostKind::LinuxContainer => CONTAINER_ENGINE_ROOT.to_string(),
        _ => join(host.platform(), engine_base, &[&engine_dir_name(version)]),
    }
}

/// Editor executable under `engine_root`
#[must_use]
pub fn editor_path(platform: EditorPlatform, engine_root: &str) -> String {
    let relative = match platform {
        EditorPlatform::Windows => "Engine/Binaries/Win64/UnrealEditor-Cmd.exe",
        EditorPlatform::Mac => "Engine/Binaries/Mac/UnrealEditor.app/Contents/MacOS/UnrealEditor",
        EditorPlatform::Linux => "Engine/Binaries/Linux/UnrealEditor",
    };
    join(platform, engine_root, &[relative])
}

/// Build script under `engine_root`
#[must_use]
pub fn build_script_path(platform: EditorPlatform, engine_root: &str) -> String {
    let relative = match platform {
        EditorPlatform::Windows => "Engine/Build/BatchFiles/Build.bat",
        EditorPlatform::Mac => "Engine/Build/BatchFiles/Mac/Build.sh",
        EditorPlatform::Linux => "Engine/Build/BatchFiles/Linux/Build.sh",
    };
    join(platform, engine_root, &[relative])
}

/// Packaging tool (`RunUAT`) under `engine_root`
#[must_use]
pub fn uat_script_path(platform: EditorPlatform, engine_root: &str) -> String {
    let relative = match platform {
        EditorPlatform::Windows => "Engine/Build/BatchFiles/RunUAT.bat",
        EditorPlatform::Mac | EditorPlatform::Linux => "Engine/Build/BatchFiles/RunUAT.sh",
    };
    join(platform, engine_root, &[relative])
}

/// `{repo}/{project}.uproject`
#[must_use]
pub fn project_file_path(platform: EditorPlatform, repo_root: &str, project: &str) -> String {
    join(platform, repo_root, &[&format!("{project}.uproject")])
}

/// `{repo}/Plugins/{plugin}/{plugin}.uplugin`
#[must_use]
pub fn plugin_descriptor_path(platform: EditorPlatform, repo_root: &str, plugin: &str) -> String {
    join(
        platform,
        repo_root,
        &["Plugins", plugin, &format!("{plugin}.uplugin")],
    )
}

/// Packaged plugin manifest: `{package}/Plugin/{plugin}.uplugin`
#[must_use]
pub fn plugin_manifest_path(platform: EditorPlatform, package_dir: &str, plugin: &str) -> String {
    join(
        platform,
        package_dir,
        &[PackageKind::Plugin.dir_name(), &format!("{plugin}.uplugin")],
    )
}

/// Every toolchain path a builder needs for one host and engine version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainPaths {
    /// Builder variant
    pub host: HostKind,
    /// Engine version
    pub version: EngineVersion,
    /// Engine installation root
    pub engine_root: String,
    /// Editor executable
    pub editor: String,
    /// Build script
    pub build_script: String,
    /// Packaging tool script
    pub uat_script: String,
    /// Working copy root as the toolchain sees it
    pub repo_root: String,
    /// Project descriptor
    pub project_file: String,
    /// Source plugin descriptor, for plugin builds
    pub plugin_descriptor: Option<String>,
}

impl ToolchainPaths {
    /// Resolves all toolchain paths
    #[must_use]
    pub fn resolve(
        host: HostKind,
        version: EngineVersion,
        engine_base: &str,
        repo_root: &str,
        project: &str,
        plugin: Option<&str>,
    ) -> Self {
        let platform = host.platform();
        let engine_root = engine_root(host, version, engine_base);
        Self {
            host,
            version,
            editor: editor_path(platform, &engine_root),
            build_script: build_script_path(platform, &engine_root),
            uat_script: uat_script_path(platform, &engine_root),
            project_file: project_file_path(platform, repo_root, project),
            plugin_descriptor: plugin.map(|p| plugin_descriptor_path(platform, repo_root, p)),
            repo_root: repo_root.to_string(),
            engine_root,
        }
    }

    /// Editor platform these paths belong to
    #[must_use]
    pub fn platform(&self) -> EditorPlatform {
        self.host.platform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_join_windows_uses_backslashes() {
        assert_eq!(
            join(EditorPlatform::Windows, "C:/Work/", &["Repo", "Sub/Dir"]),
            r"C:\Work\Repo\Sub\Dir"
        );
    }

    #[test]
    fn test_join_posix_uses_forward_slashes() {
        assert_eq!(
            join(EditorPlatform::Mac, "/Users/ci/", &["/Repo/", "Sub\\Dir"]),
            "/Users/ci/Repo/Sub/Dir"
        );
        assert_eq!(join(EditorPlatform::Linux, "/", &["tmp"]), "/tmp");
    }

    #[test]
    fn test_join_skips_empty_parts() {
        assert_eq!(join(EditorPlatform::Linux, "/a", &["", "/", "b"]), "/a/b");
    }

    #[test]
    fn test_engine_roots() {
        assert_eq!(
            engine_root(HostKind::Windows, EngineVersion::Ue5_3, DEFAULT_WINDOWS_ENGINE_BASE),
            r"C:\Program Files\Epic Games\UE_5.3"
        );
        assert_eq!(
            engine_root(HostKind::Mac, EngineVersion::Ue5_3, DEFAULT_MAC_ENGINE_BASE),
            "/Users/Shared/Epic Games/UE_5.3"
        );
        assert_eq!(
            engine_root(HostKind::LinuxRemote, EngineVersion::Ue5_4, "/opt/epic"),
            "/opt/epic/UE_5.4"
        );
        assert_eq!(
            engine_root(HostKind::LinuxContainer, EngineVersion::Ue5_4, "/ignored"),
            CONTAINER_ENGINE_ROOT
        );
    }

    #[test]
    fn test_toolchain_paths_windows() {
        let paths = ToolchainPaths::resolve(
            HostKind::Windows,
            EngineVersion::Ue5_3,
            r"D:\Engines",
            r"D:\ci\work\Game_5.3",
            "Game",
            Some("Widget"),
        );
        assert_eq!(paths.engine_root, r"D:\Engines\UE_5.3");
        assert_eq!(
            paths.editor,
            r"D:\Engines\UE_5.3\Engine\Binaries\Win64\UnrealEditor-Cmd.exe"
        );
        assert_eq!(
            paths.build_script,
            r"D:\Engines\UE_5.3\Engine\Build\BatchFiles\Build.bat"
        );
        assert_eq!(
            paths.uat_script,
            r"D:\Engines\UE_5.3\Engine\Build\BatchFiles\RunUAT.bat"
        );
        assert_eq!(paths.project_file, r"D:\ci\work\Game_5.3\Game.uproject");
        assert_eq!(
            paths.plugin_descriptor.as_deref(),
            Some(r"D:\ci\work\Game_5.3\Plugins\Widget\Widget.uplugin")
        );
    }

    #[test]
    fn test_toolchain_paths_mac() {
        let paths = ToolchainPaths::resolve(
            HostKind::Mac,
            EngineVersion::Ue5_2,
            DEFAULT_MAC_ENGINE_BASE,
            "/tmp/uci/Game_5.2",
            "Game",
            None,
        );
        assert_eq!(
            paths.editor,
            "/Users/Shared/Epic Games/UE_5.2/Engine/Binaries/Mac/UnrealEditor.app/Contents/MacOS/UnrealEditor"
        );
        assert_eq!(
            paths.build_script,
            "/Users/Shared/Epic Games/UE_5.2/Engine/Build/BatchFiles/Mac/Build.sh"
        );
        assert_eq!(paths.plugin_descriptor, None);
    }

    #[test]
    fn test_toolchain_paths_container() {
        let paths = ToolchainPaths::resolve(
            HostKind::LinuxContainer,
            EngineVersion::Ue5_3,
            "",
            CONTAINER_PROJECT_ROOT,
            "Game",
            None,
        );
        assert_eq!(paths.editor, "/home/ue4/UnrealEngine/Engine/Binaries/Linux/UnrealEditor");
        assert_eq!(
            paths.uat_script,
            "/home/ue4/UnrealEngine/Engine/Build/BatchFiles/RunUAT.sh"
        );
        assert_eq!(paths.project_file, "/project/Game.uproject");
    }

    #[test]
    fn test_plugin_manifest_path() {
        assert_eq!(
            plugin_manifest_path(EditorPlatform::Linux, "/r/packages/Linux_5.3", "Widget"),
            "/r/packages/Linux_5.3/Plugin/Widget.uplugin"
        );
    }

    fn host_strategy() -> impl Strategy<Value = HostKind> {
        prop_oneof![
            Just(HostKind::Windows),
            Just(HostKind::Mac),
            Just(HostKind::LinuxRemote),
            Just(HostKind::LinuxContainer),
        ]
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(
            host in host_strategy(),
            index in 0usize..11,
            project in "[A-Za-z][A-Za-z0-9]{0,12}",
        ) {
            let version = EngineVersion::ALL[index];
            let a = ToolchainPaths::resolve(host, version, "/base", "/repo", &project, Some("P"));
            let b = ToolchainPaths::resolve(host, version, "/base", "/repo", &project, Some("P"));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_separators_follow_platform(
            host in host_strategy(),
            index in 0usize..11,
        ) {
            let version = EngineVersion::ALL[index];
            let paths = ToolchainPaths::resolve(host, version, "/base", "/repo", "Game", None);
            let foreign = if host.platform().uses_backslash() { '/' } else { '\\' };
            prop_assert!(!paths.editor.contains(foreign));
            prop_assert!(!paths.project_file.contains(foreign));
            prop_assert!(!paths.uat_script.contains(foreign));
        }
    }
}
