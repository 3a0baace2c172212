use std::path::{Path, PathBuf};

use log::{error, info};

use crate::{CompileError, CompileResult};

/// Everything one compilation needs to know about where it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerContext {
    /// Root of the source asset tree.
    pub assets_dir: PathBuf,
    /// Root of the compiled data tree; mirrors the layout of `assets_dir`.
    pub data_dir: PathBuf,
    /// Descriptor being compiled.
    pub file: PathBuf,
}

impl CompilerContext {
    pub fn new(assets_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            data_dir: data_dir.into(),
            file: file.into(),
        }
    }
}

/// Source and artifact of a successful compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltResource {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => -1,
        }
    }

    pub fn is_success(self) -> bool {
        self == RunStatus::Success
    }
}

/// Notifications consumed by whatever drives the asset pipeline.
pub trait CompilerEvents: Sync {
    fn on_asset_compilation_failed(&self, asset: &Path, reason: &str);
    fn on_resource_built(&self, asset: &Path, source: &Path, target: &Path);
}

/// Reports pipeline events through the log facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEvents;

impl CompilerEvents for LogEvents {
    fn on_asset_compilation_failed(&self, asset: &Path, reason: &str) {
        error!("Failed to compile {}: {}", asset.display(), reason);
    }

    fn on_resource_built(&self, asset: &Path, source: &Path, target: &Path) {
        info!("Built {} ({} -> {})", asset.display(), source.display(), target.display());
    }
}

pub trait Compiler: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Runs the whole pipeline for `ctx.file`.
    fn compile(&self, ctx: &CompilerContext) -> CompileResult<BuiltResource>;

    /// Runs `compile` and reports the outcome through `events`.
    /// Exactly one hook fires per call; errors never escape.
    fn run(&self, ctx: &CompilerContext, events: &dyn CompilerEvents) -> RunStatus {
        match self.compile(ctx) {
            Ok(built) => {
                events.on_resource_built(&ctx.file, &built.source, &built.target);
                RunStatus::Success
            }
            Err(err) => {
                events.on_asset_compilation_failed(&ctx.file, &err.to_string());
                RunStatus::Failure
            }
        }
    }
}

/// Placeholder for asset types without a dedicated compiler.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericCompiler;

impl Compiler for GenericCompiler {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn compile(&self, ctx: &CompilerContext) -> CompileResult<BuiltResource> {
        info!("Assets dir: {}", ctx.assets_dir.display());
        info!("Data dir: {}", ctx.data_dir.display());
        info!("File: {}", ctx.file.display());
        Err(CompileError::NotImplemented)
    }
}
