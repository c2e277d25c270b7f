//! detect_image - run the selected model on one photo and save the overlay
//!
//! This tool:
//! 1. Scans the models directory and picks a model (default or `--model`)
//! 2. Turns the photo upright using its stored EXIF orientation
//! 3. Runs inference and builds the detection set
//! 4. Draws the overlay and writes the annotated image

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use camml::{
    default_factory, detect_still, open_upright, render, CammlConfig, ModelCatalog, ModelSlot,
    Orientation, RenderMode,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect objects in a still image")]
struct Args {
    /// Image to analyse.
    #[arg(required_unless_present = "list_models")]
    input: Option<PathBuf>,
    /// Where to write the annotated image.
    #[arg(long, short, default_value = "output.png")]
    output: PathBuf,
    /// Model display name (see --list-models).
    #[arg(long, env = "CAMML_MODEL")]
    model: Option<String>,
    /// Directory holding model files.
    #[arg(long, env = "CAMML_MODELS_DIR")]
    models_dir: Option<PathBuf>,
    /// Override the photo's EXIF orientation tag (1-8).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    orientation: Option<u8>,
    /// Overlay style: outline or blur.
    #[arg(long)]
    mode: Option<RenderMode>,
    /// Print the model catalog and exit.
    #[arg(long)]
    list_models: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CammlConfig::load()?;
    if let Some(dir) = args.models_dir {
        cfg.models.dir = dir;
    }
    if let Some(mode) = args.mode {
        cfg.render.mode = mode;
    }
    cfg.validate()?;

    let catalog = ModelCatalog::scan(&cfg.models.dir, &cfg.models.extensions)?;
    if args.list_models {
        for (index, entry) in catalog.entries().iter().enumerate() {
            println!("{:>2}  {:<20} {}", index + 1, entry.name, entry.path.display());
        }
        return Ok(());
    }

    let factory = default_factory(
        cfg.models.input_width,
        cfg.models.input_height,
        cfg.models.confidence_threshold,
    );
    // An explicit --model must load exactly that file; the configured
    // preference may fall back.
    let slot = match args.model.as_deref() {
        Some(name) => ModelSlot::load(&catalog, factory.as_ref(), name)?,
        None => ModelSlot::start(&catalog, factory.as_ref(), cfg.models.preferred.as_deref())?,
    };
    log::info!("using model {}", slot.current().name);

    let input = args
        .input
        .ok_or_else(|| anyhow!("an input image is required"))?;
    let orientation = args.orientation.and_then(Orientation::from_exif);
    let mut image = open_upright(&input, orientation)?;

    let set = match detect_still(&slot, &image) {
        Ok(set) => set,
        Err(e) => {
            log::error!("detection failed for {}: {}", input.display(), e);
            return Err(e.into());
        }
    };

    for detection in set.iter() {
        println!(
            "{:<16} {:>5.1}%  x={:.0} y={:.0} w={:.0} h={:.0}",
            detection.label.as_deref().unwrap_or("(unlabelled)"),
            detection.confidence * 100.0,
            detection.bbox.x,
            detection.bbox.y,
            detection.bbox.width,
            detection.bbox.height
        );
    }

    render(&mut image, &set, &cfg.render);
    image
        .save(&args.output)
        .with_context(|| format!("failed to save {}", args.output.display()))?;
    log::info!(
        "wrote {} detection(s) to {}",
        set.len(),
        args.output.display()
    );
    Ok(())
}
