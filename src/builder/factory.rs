//! Builder selection
//!
//! The orchestrator asks a [`BuilderFactory`] for a builder per host kind.
//! [`BuilderFactory::standard`] registers the four real builders; tests
//! register their own constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{
    Builder, ContainerHost, LinuxContainerBuilder, LinuxRemoteBuilder, MacBuilder,
    PlatformBuilder, RemoteShellHost, WindowsBuilder, WindowsHost,
};
use crate::infrastructure::{Config, ConfigError, FileSystem};
use crate::model::{EditorPlatform, HostKind};

/// Shared collaborators handed to every builder
#[derive(Debug, Clone)]
pub struct BuilderContext {
    /// Run configuration
    pub config: Arc<Config>,
    /// Local filesystem
    pub fs: Arc<dyn FileSystem>,
}

/// Creates one builder
pub type BuilderConstructor =
    Box<dyn Fn(&BuilderContext) -> Result<Box<dyn Builder>, ConfigError> + Send + Sync>;

/// Table from host kind to builder constructor
#[derive(Default)]
pub struct BuilderFactory {
    constructors: HashMap<HostKind, BuilderConstructor>,
}

impl fmt::Debug for BuilderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderFactory")
            .field("hosts", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BuilderFactory {
    /// Factory with nothing registered
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Factory with the Windows, Mac, Linux-remote and Linux-container builders
    #[must_use]
    pub fn standard() -> Self {
        let mut factory = Self::empty();
        factory.register(HostKind::Windows, |ctx| {
            let host = WindowsHost::new(ctx.config.clone(), ctx.fs.clone());
            let builder: WindowsBuilder = PlatformBuilder::new(host, ctx.config.clone(), ctx.fs.clone());
            Ok(Box::new(builder))
        });
        factory.register(HostKind::Mac, |ctx| {
            let mac = ctx.config.mac.as_ref().ok_or(ConfigError::MissingHostSettings {
                platform: EditorPlatform::Mac,
                section: "mac",
            })?;
            let host = RemoteShellHost::new(HostKind::Mac, &mac.host, mac.engine_base(), &ctx.config);
            let builder: MacBuilder = PlatformBuilder::new(host, ctx.config.clone(), ctx.fs.clone());
            Ok(Box::new(builder))
        });
        factory.register(HostKind::LinuxRemote, |ctx| {
            let remote = ctx.config.linux.remote.as_ref().ok_or(ConfigError::MissingHostSettings {
                platform: EditorPlatform::Linux,
                section: "linux.remote",
            })?;
            let engine_base = remote
                .engine_base
                .clone()
                .ok_or(ConfigError::Missing("linux.remote.engine_base"))?;
            let host = RemoteShellHost::new(HostKind::LinuxRemote, remote, engine_base, &ctx.config);
            let builder: LinuxRemoteBuilder = PlatformBuilder::new(host, ctx.config.clone(), ctx.fs.clone());
            Ok(Box::new(builder))
        });
        factory.register(HostKind::LinuxContainer, |ctx| {
            let host = ContainerHost::new(ctx.config.clone(), ctx.fs.clone());
            let builder: LinuxContainerBuilder =
                PlatformBuilder::new(host, ctx.config.clone(), ctx.fs.clone());
            Ok(Box::new(builder))
        });
        factory
    }

    /// Registers (or replaces) the constructor for `host`
    pub fn register<F>(&mut self, host: HostKind, constructor: F) -> &mut Self
    where
        F: Fn(&BuilderContext) -> Result<Box<dyn Builder>, ConfigError> + Send + Sync + 'static,
    {
        self.constructors.insert(host, Box::new(constructor));
        self
    }

    /// Returns true if `host` has a constructor
    #[must_use]
    pub fn supports(&self, host: HostKind) -> bool {
        self.constructors.contains_key(&host)
    }

    /// Builds a fresh builder for `host`
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not registered or its settings are missing.
    pub fn create(&self, host: HostKind, ctx: &BuilderContext) -> Result<Box<dyn Builder>, ConfigError> {
        let constructor = self.constructors.get(&host).ok_or(ConfigError::Invalid {
            field: "editor_platforms",
            reason: format!("no builder registered for {host}"),
        })?;
        constructor(ctx)
    }
}
