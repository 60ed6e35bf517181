use std::path::PathBuf;

use prismcal::analysis::resolution::ResolutionSweep;
use prismcal::{CalibrationBuilder, EventReducer, PipelineSettings, PrismError};

fn main() {
    // RUST_LOG=debug for per-tube details
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    if let Err(e) = run(settings_path) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(settings_path: Option<PathBuf>) -> Result<(), PrismError> {
    let settings = match settings_path {
        Some(path) => {
            log::info!("Loading settings from {}", path.display());
            PipelineSettings::load(&path)?
        }
        None => {
            log::info!("No settings file given, using the 8 station 60' instrument in .");
            PipelineSettings::default()
        }
    };

    let calibration = CalibrationBuilder::new(&settings.instrument, settings.calibration_folder.clone())
        .show_progress(settings.show_progress)
        .build()?;

    let reduction = EventReducer::new(&settings.instrument, &calibration.matrix)
        .show_progress(settings.show_progress)
        .reduce(&settings.data_folder)?;

    let df = reduction.to_dataframe()?;
    println!("{df}");

    if let Some(resolution) = settings.resolution {
        let sweep = ResolutionSweep::new(&df, resolution)?;
        let curve = sweep.curve()?;

        println!("{:>12} {:>12}", curve.sweep_variable, format!("d{}", curve.target_variable));
        for point in &curve.points {
            println!("{:>12.4} {:>12.5}", point.x, point.fwhm);
        }
    }

    Ok(())
}
