//! lumen - apply a colour grading profile to an image
//!
//! Examples:
//!   lumen photo.jpg graded.png --profile faded.json
//!   lumen photo.jpg graded.jpg --strength 0.6 --backend cpu
//!   lumen --list-gpus

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lumen::config::BackendKind;
use lumen::{gpu, image_io, profile_io, EngineConfig, ProfileConfig, Renderer};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(author, version, about = "Apply a colour grading profile to an image")]
struct Cli {
    /// Input image
    #[arg(required_unless_present = "list_gpus")]
    input: Option<PathBuf>,

    /// Output image (.png or .jpg)
    #[arg(required_unless_present = "list_gpus")]
    output: Option<PathBuf>,

    /// Profile JSON. Defaults to the `<stem>.lumen.json` sidecar next to the input
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Blend between the original (0) and the full effect (1)
    #[arg(short, long, default_value_t = 1.0)]
    strength: f32,

    /// auto, cpu or gpu (overrides LUMEN_BACKEND)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Fixed grain seed (overrides LUMEN_GRAIN_SEED)
    #[arg(long)]
    grain_seed: Option<u64>,

    /// Number of threads for the CPU backend (0 = auto)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// List GPU adapters and exit
    #[arg(long)]
    list_gpus: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

fn list_gpus() {
    let adapters = gpu::detect_adapters();
    if adapters.is_empty() {
        println!("no GPU adapters found");
    }
    for adapter in adapters {
        println!("{} ({}, {})", adapter.name, adapter.backend, adapter.device_type);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    if cli.list_gpus {
        list_gpus();
        return Ok(());
    }
    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        bail!("input and output paths are required");
    };

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let profile: ProfileConfig = match &cli.profile {
        Some(path) => profile_io::load_profile(path)?,
        None => profile_io::load_sidecar(&input)?.unwrap_or_else(|| {
            info!("no profile given and no sidecar found; rendering unchanged");
            ProfileConfig::default()
        }),
    };

    let mut config = EngineConfig::from_env();
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend);
    }
    if let Some(seed) = cli.grain_seed {
        config = config.with_grain_seed(seed);
    }

    let source = image_io::decode(&input)?;
    let mut renderer = Renderer::new(config).context("Failed to initialise renderer")?;

    let started = Instant::now();
    let rendered = renderer
        .render(&source, &profile, cli.strength)
        .with_context(|| format!("Failed to render {}", input.display()))?;
    info!(
        backend = renderer.backend_name(),
        stages = ?rendered.stages,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rendered {}x{}",
        rendered.source_width,
        rendered.source_height
    );

    image_io::save(&rendered.image, &output)?;
    info!("wrote {}", output.display());
    Ok(())
}
