use std::num::NonZeroU32;
use std::path::PathBuf;

use dockmatrix_core::axis::Filter;
use dockmatrix_core::{
    Combination, MatrixConfig, MpiImplementation, Release, Selection, TargetCpu, TargetGpu,
    Variant,
};

use crate::dockerfile::{DockerfileGenerator, RenderOptions};
use crate::output::{Mode, Outcome, OutputError, OutputFile};

/// CUDA container builds are not available yet; the GPU track only reports.
pub const GPU_CONTAINERS_SUPPORTED: bool = false;

/// Progress of a [`MatrixGenerator::run`], reported as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    File(Outcome),
    /// A GPU-track target passed the filters but cannot be built.
    GpuUnsupported(TargetGpu),
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub unsupported_gpus: Vec<TargetGpu>,
}

/// Every CPU-track combination admitted by `selection`, in enumeration order.
pub fn cpu_combinations(selection: &Selection) -> Vec<Combination> {
    let mut combinations = Vec::new();
    for &release in Release::ALL {
        if !selection.release.matches(&release) {
            continue;
        }
        for &mpi in MpiImplementation::ALL {
            if !selection.mpi.matches(&mpi) {
                continue;
            }
            for &cpu in TargetCpu::ALL {
                if !selection.cpu.matches(&cpu) {
                    continue;
                }
                for &variant in Variant::ALL {
                    if !selection.variant.matches(&variant) {
                        continue;
                    }
                    combinations.push(Combination {
                        release,
                        mpi,
                        cpu,
                        gpu: None,
                        variant,
                    });
                }
            }
        }
    }
    combinations
}

/// Generates or verifies one Dockerfile per selected combination.
pub struct MatrixGenerator<'a> {
    config: &'a MatrixConfig,
    selection: Selection,
    options: RenderOptions,
    output_dir: PathBuf,
    mode: Mode,
}

impl<'a> MatrixGenerator<'a> {
    pub fn new(
        config: &'a MatrixConfig,
        selection: Selection,
        options: RenderOptions,
        output_dir: impl Into<PathBuf>,
        mode: Mode,
    ) -> Self {
        Self {
            config,
            selection,
            options,
            output_dir: output_dir.into(),
            mode,
        }
    }

    /// Runs the CPU track, then the GPU track. Stops at the first mismatch.
    pub fn run(&self, mut on_step: impl FnMut(&Step)) -> Result<Report, MatrixError> {
        tracing::info!(
            release = %self.selection.release,
            mpi = %self.selection.mpi,
            target_cpu = %self.selection.cpu,
            target_gpu = %self.selection.gpu,
            version = %self.selection.variant,
            mode = ?self.mode,
            "expanding build matrix"
        );
        let mut report = Report::default();

        for combination in cpu_combinations(&self.selection) {
            let outcome = self.emit(&combination)?;
            on_step(&Step::File(outcome.clone()));
            if let Outcome::Mismatch(path) = outcome {
                return Err(MatrixError::Mismatch { path });
            }
            report.outcomes.push(outcome);
        }

        self.run_gpu_track(&mut report, &mut on_step)?;

        tracing::info!(files = report.outcomes.len(), "build matrix done");
        Ok(report)
    }

    fn run_gpu_track(
        &self,
        report: &mut Report,
        on_step: &mut impl FnMut(&Step),
    ) -> Result<(), MatrixError> {
        let selection = &self.selection;
        for &release in Release::ALL {
            if !selection.release.matches(&release) {
                continue;
            }
            for &mpi in MpiImplementation::ALL {
                if !selection.mpi.matches(&mpi) {
                    continue;
                }
                for &cpu in TargetCpu::ALL {
                    if !selection.cpu.matches(&cpu) {
                        continue;
                    }
                    for &gpu in TargetGpu::ALL {
                        if selection.gpu == Filter::Only(TargetGpu::NoGpu)
                            || !selection.gpu.matches(&gpu)
                        {
                            continue;
                        }
                        if !GPU_CONTAINERS_SUPPORTED {
                            report.unsupported_gpus.push(gpu);
                            on_step(&Step::GpuUnsupported(gpu));
                            continue;
                        }
                        for &variant in Variant::ALL {
                            if !selection.variant.matches(&variant) {
                                continue;
                            }
                            let combination = Combination {
                                release,
                                mpi,
                                cpu,
                                gpu: Some(gpu),
                                variant,
                            };
                            let outcome = self.emit(&combination)?;
                            on_step(&Step::File(outcome.clone()));
                            if let Outcome::Mismatch(path) = outcome {
                                return Err(MatrixError::Mismatch { path });
                            }
                            report.outcomes.push(outcome);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn emit(&self, combination: &Combination) -> Result<Outcome, MatrixError> {
        tracing::debug!(name = %combination.name(), "rendering");
        let generator = DockerfileGenerator::new(self.config, combination, &self.options);
        let mut file = OutputFile::new(&self.output_dir, &combination.file_name());
        file.push_str(&generator.render());
        Ok(file.finish(self.mode)?)
    }
}

/// Advisory message when more cores are requested than the host has.
pub fn check_host_cores(requested: NonZeroU32, host: Option<usize>) -> Option<String> {
    let host = host?;
    (requested.get() as usize > host).then(|| {
        format!(
            "WARNING: More CPU cores requested for build than available ({requested} > {host})"
        )
    })
}

/// Number of CPUs available to this process, if the platform reports it.
pub fn host_cores() -> Option<usize> {
    match std::thread::available_parallelism() {
        Ok(n) => Some(n.get()),
        Err(e) => {
            tracing::debug!(error = %e, "cannot determine host CPU count");
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("{path} is not consistent with the generator; regenerate it without --check")]
    Mismatch { path: PathBuf },
}
