mod generate;

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use dockmatrix_core::axis::{Axis, Filter};
use dockmatrix_core::{MpiImplementation, Release, TargetCpu, TargetGpu, Variant};

#[derive(Parser)]
#[command(
    name = "dockmatrix",
    about = "Generate the CP2K container Dockerfiles for every build-matrix combination",
    disable_version_flag = true
)]
struct Cli {
    /// Check consistency with generator script
    #[arg(long)]
    check: bool,
    /// Select a MPI implementation
    #[arg(long, value_name = "MPI", default_value = "all", value_parser = filter_parser::<MpiImplementation>())]
    mpi: Filter<MpiImplementation>,
    /// Number of CPU cores used for building the container and running the regression tests
    #[arg(
        short = 'j',
        long,
        default_value = "16",
        allow_negative_numbers = true,
        value_parser = dockmatrix_core::parse_ncores
    )]
    ncores: NonZeroU32,
    /// CP2K release for which the docker files are generated
    #[arg(long, default_value = "all", value_parser = filter_parser::<Release>())]
    release: Filter<Release>,
    /// Target CPU for which the docker files are generated
    #[arg(long, default_value = "all", value_parser = filter_parser::<TargetCpu>())]
    target_cpu: Filter<TargetCpu>,
    /// Target GPU for which the docker files are generated
    #[arg(long, default_value = "no GPU", value_parser = filter_parser::<TargetGpu>())]
    target_gpu: Filter<TargetGpu>,
    /// Username for GitHub and DockerHub
    #[arg(long = "user", visible_alias = "user-name", default_value = "cp2k")]
    user_name: String,
    /// Version type of the CP2K binary
    #[arg(long = "version", value_name = "VERSION", default_value = "psmp", value_parser = filter_parser::<Variant>())]
    variant: Filter<Variant>,
    /// Directory the Dockerfiles are written to (and dockmatrix.toml is read from)
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

/// Restricts a flag to the axis tokens plus `all`, and lists them in `--help`.
fn filter_parser<T>() -> impl TypedValueParser<Value = Filter<T>>
where
    T: Axis + FromStr<Err = dockmatrix_core::Error> + Send + Sync,
{
    PossibleValuesParser::new(Filter::<T>::choices()).try_map(|s| s.parse::<Filter<T>>())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="unset or malformed RUST_LOG falls back to the info level"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    generate::generate(generate::GenerateArgs {
        check: cli.check,
        selection: dockmatrix_core::Selection {
            release: cli.release,
            mpi: cli.mpi,
            cpu: cli.target_cpu,
            gpu: cli.target_gpu,
            variant: cli.variant,
        },
        ncores: cli.ncores,
        user_name: cli.user_name,
        output_dir: cli.output_dir,
    })
}
