use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info};
use rayon::prelude::*;
use rescomp_core::{Compiler, CompilerContext, GenericCompiler, LogEvents};
use rescomp_model::{Model, ModelCompiler};

#[derive(Debug, Parser)]
#[command(name = "rescomp", version, about = "Offline resource compiler")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile asset descriptors into the data directory
    Build(BuildArgs),
    /// Print the contents of a compiled .gmdl file
    Inspect { file: PathBuf },
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[arg(long, env = "RESCOMP_ASSETS_DIR")]
    assets_dir: PathBuf,

    #[arg(long, env = "RESCOMP_DATA_DIR")]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = AssetKind::Model)]
    kind: AssetKind,

    /// Worker threads for batch builds (defaults to one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AssetKind {
    Generic,
    Model,
}

impl AssetKind {
    fn compiler(self) -> Box<dyn Compiler> {
        match self {
            AssetKind::Generic => Box::new(GenericCompiler),
            AssetKind::Model => Box::new(ModelCompiler),
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match cli.command {
        Command::Build(args) => {
            let failures = build(&args)?;
            Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Inspect { file } => {
            inspect(&file, &mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Compiles every file independently and returns how many failed.
fn build(args: &BuildArgs) -> Result<usize> {
    let start = Instant::now();
    let compiler = args.kind.compiler();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .context("Failed to create worker pool")?;

    let failures = pool.install(|| {
        args.files
            .par_iter()
            .map(|file| {
                let ctx = CompilerContext::new(&args.assets_dir, &args.data_dir, file);
                compiler.run(&ctx, &LogEvents)
            })
            .filter(|status| !status.is_success())
            .count()
    });

    info!(
        "{}: {} built, {} failed in {:.2}s",
        compiler.name(),
        args.files.len() - failures,
        failures,
        start.elapsed().as_secs_f32()
    );
    Ok(failures)
}

fn inspect(file: &Path, out: &mut impl Write) -> Result<()> {
    let model = Model::load_from_file(file).with_context(|| format!("Failed to load model file: {}", file.display()))?;

    writeln!(out, "{}", file.display())?;
    writeln!(
        out,
        "  format {} v{}, {} materials, {} meshes",
        String::from_utf8_lossy(&model.header.format),
        model.header.version,
        model.header.materials,
        model.header.meshes
    )?;
    for (i, material) in model.materials.iter().enumerate() {
        writeln!(out, "  material[{}] '{}' shader={}", i, material.name, material.shader)?;
        for (slot, filename) in &material.bindings {
            writeln!(out, "    {} = {}", slot, filename)?;
        }
    }
    for (i, mesh) in model.meshes.iter().enumerate() {
        let h = &mesh.header;
        writeln!(
            out,
            "  mesh[{}] material={} vertices={} faces={} uv_channels={}",
            i, h.material_index, h.vertices, h.faces, h.uv_channels
        )?;
    }
    Ok(())
}
