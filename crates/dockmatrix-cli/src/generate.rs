use std::num::NonZeroU32;
use std::path::PathBuf;

use dockmatrix_build::matrix::{self, MatrixGenerator, Step};
use dockmatrix_build::{Mode, Outcome, RenderOptions};
use dockmatrix_core::{MatrixConfig, Selection};

pub struct GenerateArgs {
    pub check: bool,
    pub selection: Selection,
    pub ncores: NonZeroU32,
    pub user_name: String,
    pub output_dir: PathBuf,
}

pub fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    if let Some(warning) = matrix::check_host_cores(args.ncores, matrix::host_cores()) {
        println!("{warning}");
    }

    let config = MatrixConfig::load(&args.output_dir)?;
    tracing::debug!(
        output_dir = %args.output_dir.display(),
        base_image = %config.images.base,
        "config loaded"
    );
    let mode = if args.check { Mode::Check } else { Mode::Write };
    let options = RenderOptions {
        ncores: args.ncores,
        user_name: args.user_name,
    };

    let generator = MatrixGenerator::new(&config, args.selection, options, args.output_dir, mode);
    let report = generator.run(|step| match step {
        Step::File(Outcome::Written(path)) => println!("Wrote {}", path.display()),
        Step::File(Outcome::Consistent(path)) => {
            println!("File {} is consistent with generator script", path.display());
        }
        // Surfaced as the run's error.
        Step::File(Outcome::Mismatch(_)) => {}
        Step::GpuUnsupported(gpu) => {
            println!("Container build for GPU {gpu} is not yet supported.");
        }
    })?;

    tracing::info!(
        files = report.outcomes.len(),
        unsupported_gpu_targets = report.unsupported_gpus.len(),
        check = args.check,
        "generation finished"
    );
    Ok(())
}
