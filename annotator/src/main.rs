#[cfg(feature = "video")]
extern crate ffmpeg_next as ffmpeg;

mod tui;
#[cfg(feature = "video")]
mod video;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use annotation_common::{AnnotatorConfig, FrameSource, ImageSequence, Session};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
pub struct Args {
    /// Video file (.mp4/.mkv/...) or a directory of .jpg/.png frames.
    input: PathBuf,
    /// Directory receiving annotated frame images and `annotations.csv`.
    output: PathBuf,
    /// YAML file with `classes`, and optionally `resolution` and `image_fps`.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Where to write logs; the terminal is taken by the UI.
    /// Defaults to `<output>/annotator.log`.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {path:?}"))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,annotator=info,annotation_common=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn open_source(input: &Path, config: &AnnotatorConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    if input.is_dir() {
        let source = ImageSequence::open(input, config.resolution, config.image_fps)?;
        return Ok(Box::new(source));
    }

    #[cfg(feature = "video")]
    {
        let source = video::VideoFile::open(input, config.resolution)?;
        Ok(Box::new(source))
    }
    #[cfg(not(feature = "video"))]
    {
        anyhow::bail!("{input:?} is not a directory and video support is disabled")
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {:?}", args.output))?;
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| args.output.join("annotator.log"));
    init_logging(&log_file)?;

    let config = AnnotatorConfig::load_or_default(args.config.as_deref())
        .context("loading annotator config")?;
    let palette = config.palette()?;
    log::info!(
        "Classes: {:?}, frames scaled to {}x{}",
        config.classes,
        config.resolution.0,
        config.resolution.1
    );

    let _span = tracing::info_span!("session", input = ?args.input).entered();
    let source = open_source(&args.input, &config)
        .with_context(|| format!("opening input {:?}", args.input))?;
    let session = Session::open(source, &args.output, palette)
        .with_context(|| format!("starting session on {:?}", args.input))?;
    log::info!(
        "Annotating {:?}: {} frames, {} existing rows",
        args.input,
        session.frame_count(),
        session.store().len()
    );

    let (session, ui_result) = tui::run(session);
    let closed = session.close();
    if let Err(err) = ui_result {
        if let Err(save_err) = &closed {
            log::error!("Saving annotations failed: {save_err}");
        }
        return Err(err.context("terminal UI failed"));
    }
    closed.context("saving annotations")?;

    println!("Annotations written to {:?}", args.output);
    Ok(())
}
