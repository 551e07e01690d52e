//! screen-scout CLI
//!
//! Finds or clicks targets on the live screen, or searches inside a supplied
//! image file. Exit code 0 when the target is found, 1 when it is not.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use screen_scout::{
    CompositeLocator, ImgOptions, Language, LocatorSpec, OcrOptions, PointerActuator,
    PrimaryScreen, Rect, ScreenSource, StillImage, SystemPointer, DEFAULT_TIMEOUT,
};

#[derive(Parser)]
#[command(name = "screen-scout")]
#[command(about = "Locate text and images on screen, wait for them, click them")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Search inside this image file instead of the live screen
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Seconds to keep polling before giving up
    #[arg(short, long, global = true, default_value_t = DEFAULT_TIMEOUT.as_secs_f64())]
    timeout: f64,

    /// Restrict the search to a region, as x,y,width,height
    #[arg(short, long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LangArg {
    English,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
}

impl From<LangArg> for Language {
    fn from(lang: LangArg) -> Self {
        match lang {
            LangArg::English => Language::English,
            LangArg::French => Language::French,
            LangArg::German => Language::German,
            LangArg::Spanish => Language::Spanish,
            LangArg::Italian => Language::Italian,
            LangArg::Portuguese => Language::Portuguese,
            LangArg::Dutch => Language::Dutch,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find a phrase and print where it is
    FindText {
        /// Phrase to locate
        phrase: String,

        /// Recognition language
        #[arg(short, long, value_enum, default_value = "english")]
        lang: LangArg,

        /// Binarize before recognition
        #[arg(long)]
        threshold_filter: bool,
    },

    /// Find a reference image and print where it is
    FindImage {
        /// Reference image file
        reference: PathBuf,

        /// Similarity floor in [0, 1]
        #[arg(long, default_value_t = 0.9)]
        threshold: f32,

        /// Match in color instead of grayscale
        #[arg(long)]
        color: bool,
    },

    /// Wait for a phrase and click its center
    ClickText {
        /// Phrase to locate
        phrase: String,

        /// Recognition language
        #[arg(short, long, value_enum, default_value = "english")]
        lang: LangArg,
    },

    /// Wait for a reference image and click its center
    ClickImage {
        /// Reference image file
        reference: PathBuf,

        /// Similarity floor in [0, 1]
        #[arg(long, default_value_t = 0.9)]
        threshold: f32,
    },

    /// Capture the primary screen to a file
    Capture {
        /// Where to write the capture
        output: PathBuf,
    },
}

fn parse_region(region: &str) -> anyhow::Result<Rect> {
    let parts: Vec<i64> = region
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .context("region must be four integers: x,y,width,height")?;
    anyhow::ensure!(
        parts.len() == 4 && parts[2] >= 0 && parts[3] >= 0,
        "region must be four integers: x,y,width,height"
    );
    Ok(Rect::new(
        parts[0] as i32,
        parts[1] as i32,
        parts[2] as u32,
        parts[3] as u32,
    ))
}

fn screen_source(input: &Option<PathBuf>) -> anyhow::Result<Arc<dyn ScreenSource>> {
    match input {
        Some(path) => {
            let img = image::open(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Arc::new(StillImage::new(img.to_rgba8())))
        }
        None => Ok(Arc::new(PrimaryScreen::new())),
    }
}

fn print_rect(rect: Rect, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!(
            "found at ({}, {}) size {}x{}",
            rect.x, rect.y, rect.width, rect.height
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string(&rect)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| if cli.verbose { "debug" } else { "warn" }.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let timeout = Duration::from_secs_f64(cli.timeout);
    let region = cli.region.as_deref().map(parse_region).transpose()?;
    let pointer: Arc<dyn PointerActuator> = Arc::new(SystemPointer::new());

    let mut spec_builder = LocatorSpec::builder();
    if let Some(r) = region {
        spec_builder = spec_builder.region(r);
    }

    match cli.command {
        Commands::FindText {
            phrase,
            lang,
            threshold_filter,
        } => {
            let spec = spec_builder
                .phrase(phrase)
                .ocr_options(OcrOptions {
                    language: lang.into(),
                    threshold_filter,
                    ..Default::default()
                })
                .build()?;
            let locator = CompositeLocator::new(vec![spec], screen_source(&cli.input)?, pointer)?;
            match locator.try_wait_for(timeout).await? {
                Some(rect) => print_rect(rect, &cli.format)?,
                None => {
                    eprintln!("not found within {:.1}s", timeout.as_secs_f64());
                    process::exit(1);
                }
            }
        }

        Commands::FindImage {
            reference,
            threshold,
            color,
        } => {
            let img = image::open(&reference)
                .with_context(|| format!("failed to read {}", reference.display()))?;
            let spec = spec_builder
                .reference_image(img)
                .img_options(ImgOptions::new(threshold, color)?)
                .build()?;
            let locator = CompositeLocator::new(vec![spec], screen_source(&cli.input)?, pointer)?;
            match locator.try_wait_for(timeout).await? {
                Some(rect) => print_rect(rect, &cli.format)?,
                None => {
                    eprintln!("not found within {:.1}s", timeout.as_secs_f64());
                    process::exit(1);
                }
            }
        }

        Commands::ClickText { phrase, lang } => {
            let spec = spec_builder
                .phrase(phrase)
                .ocr_options(OcrOptions {
                    language: lang.into(),
                    ..Default::default()
                })
                .build()?;
            let locator = CompositeLocator::new(vec![spec], screen_source(&cli.input)?, pointer)?;
            locator.click(timeout).await?;
            info!("clicked");
        }

        Commands::ClickImage {
            reference,
            threshold,
        } => {
            let img = image::open(&reference)
                .with_context(|| format!("failed to read {}", reference.display()))?;
            let spec = spec_builder
                .reference_image(img)
                .img_options(ImgOptions::new(threshold, false)?)
                .build()?;
            let locator = CompositeLocator::new(vec![spec], screen_source(&cli.input)?, pointer)?;
            locator.click(timeout).await?;
            info!("clicked");
        }

        Commands::Capture { output } => {
            let frame = PrimaryScreen::new().capture_full().await?;
            frame
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("captured {}x{} to {}", frame.width(), frame.height(), output.display());
        }
    }

    Ok(())
}
