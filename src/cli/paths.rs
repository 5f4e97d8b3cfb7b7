//! `unreal-ci paths` - Show synthesized paths and command lines

use std::fmt::Write as _;

use unreal_ci::infrastructure::Config;
use unreal_ci::model::{EditorPlatform, EngineVersion, HostKind};
use unreal_ci::paths::{
    CONTAINER_PROJECT_ROOT, CONTAINER_RESULT_ROOT, DEFAULT_MAC_ENGINE_BASE, HostLayout,
    PackageKind, ToolchainPaths, automation_test, editor_build, package_targets, plugin_package,
    project_package,
};

/// Engine base directory configured for `host`
fn engine_base(config: &Config, host: HostKind) -> String {
    match host {
        HostKind::Windows => config.windows.engine_base.clone(),
        HostKind::Mac => config
            .mac
            .as_ref()
            .map_or(DEFAULT_MAC_ENGINE_BASE, |m| m.engine_base())
            .to_string(),
        HostKind::LinuxRemote => config
            .linux
            .remote
            .as_ref()
            .and_then(|r| r.engine_base.clone())
            .unwrap_or_default(),
        HostKind::LinuxContainer => String::new(),
    }
}

/// Renders every path and command line for one host and engine version
pub fn render(
    config: &Config,
    platform: EditorPlatform,
    version: EngineVersion,
    repo: Option<&str>,
) -> String {
    let host = config.host_kind(platform);
    let (default_repo, result_root) = match host {
        HostKind::LinuxContainer => (CONTAINER_PROJECT_ROOT.to_string(), CONTAINER_RESULT_ROOT.to_string()),
        _ => ("<repo>".to_string(), config.result_path.display().to_string()),
    };
    let repo = repo.map_or(default_repo, str::to_string);

    let paths = ToolchainPaths::resolve(
        host,
        version,
        &engine_base(config, host),
        &repo,
        &config.project.name,
        config.project.plugin_name.as_deref(),
    );
    let layout = HostLayout::resolve(platform, &result_root, version);
    let targets = package_targets(platform, &config.game_platforms);

    let mut out = String::new();
    let _ = writeln!(out, "host:          {host}");
    let _ = writeln!(out, "engine root:   {}", paths.engine_root);
    let _ = writeln!(out, "editor:        {}", paths.editor);
    let _ = writeln!(out, "build script:  {}", paths.build_script);
    let _ = writeln!(out, "uat script:    {}", paths.uat_script);
    let _ = writeln!(out, "project:       {}", paths.project_file);
    if let Some(descriptor) = &paths.plugin_descriptor {
        let _ = writeln!(out, "plugin:        {descriptor}");
    }
    let _ = writeln!(out, "build dir:     {}", layout.build);
    let _ = writeln!(out, "tests dir:     {}", layout.tests);
    let _ = writeln!(out, "packages dir:  {}", layout.packages);
    let _ = writeln!(out);
    let _ = writeln!(out, "build:   {}", editor_build(&paths, &config.project.name));
    let _ = writeln!(
        out,
        "test:    {}",
        automation_test(&paths, config.test_filter(), &layout.tests)
    );
    if let Some(package) = plugin_package(
        &paths,
        &layout.package_dir(platform, PackageKind::Plugin),
        &targets,
    ) {
        let _ = writeln!(out, "package: {package}");
    } else {
        let archive = layout.package_dir(platform, PackageKind::Project);
        for target in targets {
            let _ = writeln!(out, "package: {}", project_package(&paths, target, &archive));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(plugin: bool) -> Config {
        let plugin = if plugin { "plugin_name: Widget" } else { "" };
        Config::from_yaml(&format!(
            r#"
project:
  name: Sample
  {plugin}
  repository:
    local_path: /src/sample
engine_versions: ["5.3"]
editor_platforms: [Linux]
game_platforms: [Linux]
result_path: /tmp/results
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_render_container_plugin() {
        let text = render(&config(true), EditorPlatform::Linux, EngineVersion::Ue5_3, None);
        assert!(text.contains("engine root:   /home/ue4/UnrealEngine"));
        assert!(text.contains("plugin:        /project/Plugins/Widget/Widget.uplugin"));
        assert!(text.contains("tests dir:     /results/tests/Linux_5.3"));
        assert!(text.contains("-Package=/results/packages/Linux_5.3/Plugin"));
    }

    #[test]
    fn test_render_project_flow() {
        let text = render(
            &config(false),
            EditorPlatform::Linux,
            EngineVersion::Ue5_3,
            Some("/work/repo"),
        );
        assert!(text.contains("project:       /work/repo/Sample.uproject"));
        assert!(text.contains("BuildCookRun"));
        assert!(text.contains("-platform=Linux"));
        assert!(!text.contains("plugin:"));
    }
}
