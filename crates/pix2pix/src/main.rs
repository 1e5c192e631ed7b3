//! pix2pix command-line tool
//!
//! ## Usage
//!
//! ```bash
//! # List the tensors in a container
//! pix2pix inspect https://example.com/facades.pict
//!
//! # Translate a raw 256x256 RGB image
//! pix2pix transfer --model facades.pict --input in.rgb --width 256 --height 256 --output out.rgb
//!
//! # Settings from a JSON file
//! pix2pix --config pix2pix.json --log-level debug inspect facades.pict
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pix2pix::{ModelSource, Pipeline, Pix2Pix, Pix2PixConfig};
use pix2pix_network::Fetcher;
use pix2pix_weights::{Container, WeightDecoder};

#[derive(Parser, Debug)]
#[command(name = "pix2pix")]
#[command(version)]
#[command(about = "Image-to-image translation with quantized pix2pix generators", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tensors, parameter count and codebook range of a container
    Inspect {
        /// URL, file:// URL or path of the container
        source: String,
    },

    /// Translate a raw interleaved RGB (or RGBA) image
    Transfer {
        /// URL, file:// URL or path of the container
        #[arg(short, long)]
        model: String,

        /// Raw input pixels
        #[arg(short, long)]
        input: PathBuf,

        /// Image width in pixels
        #[arg(long)]
        width: usize,

        /// Image height in pixels
        #[arg(long)]
        height: usize,

        /// Raw RGB output path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Pix2PixConfig::from_file(path)?,
        None => Pix2PixConfig::default(),
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Inspect { source } => inspect(config, &source).await,
        Command::Transfer {
            model,
            input,
            width,
            height,
            output,
        } => transfer(config, &model, input, width, height, output).await,
    }
}

async fn inspect(config: Pix2PixConfig, source: &str) -> Result<(), Box<dyn std::error::Error>> {
    let source = ModelSource::parse(source)?;
    let bytes = Fetcher::new(config.network)?.fetch(&source).await?;

    let container = Container::parse(&bytes)?;
    let weights = WeightDecoder::new(config.decoder).decode(&bytes)?;

    println!("Source:     {}", source);
    println!("Size:       {} bytes", bytes.len());
    println!("Tensors:    {}", weights.len());
    println!("Parameters: {}", weights.parameter_count());
    match container.codebook.range() {
        Some((lo, hi)) => println!("Codebook:   [{}, {}]", lo, hi),
        None => println!("Codebook:   no finite entries"),
    }
    println!();
    for (name, tensor) in weights.iter() {
        println!("  {:<56} {:?}", name, tensor.shape());
    }
    println!();

    match Pipeline::default().check_weights(&weights) {
        Ok(()) => println!("Generator:  complete"),
        Err(e) => println!("Generator:  incomplete ({})", e),
    }
    Ok(())
}

async fn transfer(
    config: Pix2PixConfig,
    model: &str,
    input: PathBuf,
    width: usize,
    height: usize,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let pix2pix = Pix2Pix::new(config)?;
    let handle = pix2pix.load_model(model).await?;

    let pixels = tokio::fs::read(&input).await?;
    let start = std::time::Instant::now();
    let rgb = handle.transfer_pixels(width, height, &pixels).await?;
    info!("Translated {}x{} image in {:?}", width, height, start.elapsed());

    tokio::fs::write(&output, &rgb).await?;
    info!("Wrote {} bytes to {}", rgb.len(), output.display());
    Ok(())
}
