use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use annotation_common::dataset::{self, Category, DatasetRecord};
use annotation_common::AnnotatorConfig;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
pub struct Args {
    /// Directory the annotator was run from; sidecar image paths are relative to it.
    root: PathBuf,
    /// Annotation output directories under `root`, each holding an `annotations.csv`.
    #[arg(required = true)]
    dirs: Vec<PathBuf>,
    /// Path to output .json file. Prints to stdout when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Annotator YAML config providing the category names.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Dataset {
    categories: Vec<Category>,
    records: Vec<DatasetRecord>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,into_dataset=info,annotation_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let config = AnnotatorConfig::load_or_default(args.config.as_deref())
        .context("loading annotator config")?;
    let records = dataset::collect(&args.root, &args.dirs)
        .with_context(|| format!("collecting annotations under {:?}", args.root))?;

    let n_boxes: usize = records.iter().map(|r| r.annotations.len()).sum();
    if let Some(max_id) = records
        .iter()
        .flat_map(|r| r.annotations.iter().map(|a| a.class_id))
        .max()
    {
        if max_id >= config.n_classes() {
            log::warn!(
                "Class id {max_id} has no name, only {} classes configured",
                config.n_classes()
            );
        }
    }

    let dataset = Dataset {
        categories: dataset::categories(&config.classes),
        records,
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &dataset)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dataset)?;
            writeln!(stdout)?;
        }
    }

    log::info!(
        "Wrote {} records with {n_boxes} boxes from {} directories",
        dataset.records.len(),
        args.dirs.len()
    );
    Ok(())
}
