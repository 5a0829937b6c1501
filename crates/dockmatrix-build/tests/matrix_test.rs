use std::num::NonZeroU32;

use dockmatrix_build::matrix::{
    GPU_CONTAINERS_SUPPORTED, MatrixError, MatrixGenerator, Step, check_host_cores,
    cpu_combinations,
};
use dockmatrix_build::{Mode, Outcome, RenderOptions};
use dockmatrix_core::axis::Filter;
use dockmatrix_core::{
    MatrixConfig, MpiImplementation, Release, Selection, TargetCpu, TargetGpu, Variant,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn everything() -> Selection {
    Selection {
        release: Filter::All,
        mpi: Filter::All,
        cpu: Filter::All,
        gpu: Filter::All,
        variant: Filter::All,
    }
}

fn run(dir: &std::path::Path, selection: Selection, mode: Mode) -> Result<Vec<Step>, MatrixError> {
    let config = MatrixConfig::default();
    let generator = MatrixGenerator::new(&config, selection, RenderOptions::default(), dir, mode);
    let mut steps = Vec::new();
    generator.run(|step| steps.push(step.clone()))?;
    Ok(steps)
}

fn sorted_dir(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Enumeration ──

#[test]
fn full_cpu_track_enumerates_in_nested_order() {
    let names: Vec<String> = cpu_combinations(&everything())
        .iter()
        .map(|c| c.name())
        .collect();

    assert_eq!(names.len(), 16);
    assert_eq!(names[0], "2025.2_mpich_x86_64_psmp");
    assert_eq!(names[1], "2025.2_mpich_x86_64_pdbg");
    assert_eq!(names[2], "2025.2_mpich_cascadelake_psmp");
    assert_eq!(names[4], "2025.2_openmpi_x86_64_psmp");
    assert_eq!(names[15], "master_openmpi_cascadelake_pdbg");
}

#[test]
fn default_selection_yields_psmp_only() {
    let combinations = cpu_combinations(&Selection::default());

    assert_eq!(combinations.len(), 8);
    assert!(combinations.iter().all(|c| c.variant == Variant::Psmp));
    assert!(combinations.iter().all(|c| c.gpu.is_none()));
}

#[test]
fn single_value_filters_select_one_combination() {
    let selection = Selection {
        release: Filter::Only(Release::Master),
        mpi: Filter::Only(MpiImplementation::Mpich),
        cpu: Filter::Only(TargetCpu::CascadeLake),
        gpu: Filter::Only(TargetGpu::NoGpu),
        variant: Filter::Only(Variant::Pdbg),
    };
    let names: Vec<String> = cpu_combinations(&selection)
        .iter()
        .map(|c| c.name())
        .collect();

    assert_eq!(names, vec!["master_mpich_cascadelake_pdbg"]);
}

fn filter_strategy<T: Copy + std::fmt::Debug + 'static>(
    values: &'static [T],
) -> impl Strategy<Value = Filter<T>> {
    prop_oneof![
        Just(Filter::All),
        proptest::sample::select(values).prop_map(Filter::Only),
    ]
}

proptest! {
    #[test]
    fn every_enumerated_combination_matches_its_filters(
        release in filter_strategy(Release::ALL),
        mpi in filter_strategy(MpiImplementation::ALL),
        cpu in filter_strategy(TargetCpu::ALL),
        variant in filter_strategy(Variant::ALL),
    ) {
        let selection = Selection { release, mpi, cpu, gpu: Filter::All, variant };
        let combinations = cpu_combinations(&selection);

        let width = |all: bool, n: usize| if all { n } else { 1 };
        let expected = width(release == Filter::All, 2)
            * width(mpi == Filter::All, 2)
            * width(cpu == Filter::All, 2)
            * width(variant == Filter::All, 2);
        prop_assert_eq!(combinations.len(), expected);

        for c in &combinations {
            prop_assert!(release.matches(&c.release));
            prop_assert!(mpi.matches(&c.mpi));
            prop_assert!(cpu.matches(&c.cpu));
            prop_assert!(variant.matches(&c.variant));
            prop_assert_eq!(
                c.file_name(),
                format!("{}_{}_{}_{}.Dockerfile", c.release, c.mpi, c.cpu, c.variant)
            );
        }
    }
}

// ── Write / Check ──

#[test]
fn write_creates_one_file_per_combination() {
    let tmp = TempDir::new().unwrap();
    let selection = Selection {
        release: Filter::Only(Release::V2025_2),
        mpi: Filter::Only(MpiImplementation::OpenMpi),
        ..Selection::default()
    };

    let steps = run(tmp.path(), selection, Mode::Write).unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(
        sorted_dir(tmp.path()),
        vec![
            "2025.2_openmpi_cascadelake_psmp.Dockerfile",
            "2025.2_openmpi_x86_64_psmp.Dockerfile",
        ]
    );
}

#[test]
fn write_twice_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), Selection::default(), Mode::Write).unwrap();
    let first = std::fs::read(tmp.path().join("master_openmpi_x86_64_psmp.Dockerfile")).unwrap();

    run(tmp.path(), Selection::default(), Mode::Write).unwrap();
    let second = std::fs::read(tmp.path().join("master_openmpi_x86_64_psmp.Dockerfile")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn check_after_write_is_consistent() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), everything(), Mode::Write).unwrap();

    let steps = run(tmp.path(), everything(), Mode::Check).unwrap();

    let consistent = steps
        .iter()
        .filter(|s| matches!(s, Step::File(Outcome::Consistent(_))))
        .count();
    assert_eq!(consistent, 16);
}

#[test]
fn check_detects_single_byte_change() {
    let tmp = TempDir::new().unwrap();
    let selection = Selection {
        release: Filter::Only(Release::Master),
        mpi: Filter::Only(MpiImplementation::Mpich),
        cpu: Filter::Only(TargetCpu::X86_64),
        ..Selection::default()
    };
    run(tmp.path(), selection, Mode::Write).unwrap();

    let path = tmp.path().join("master_mpich_x86_64_psmp.Dockerfile");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 2;
    bytes[last] ^= 0x01;
    std::fs::write(&path, bytes).unwrap();

    let err = run(tmp.path(), selection, Mode::Check).unwrap_err();
    assert!(matches!(err, MatrixError::Mismatch { path: p } if p == path));
}

#[test]
fn check_stops_at_first_mismatch() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), everything(), Mode::Write).unwrap();
    std::fs::write(tmp.path().join("2025.2_mpich_x86_64_psmp.Dockerfile"), "drift").unwrap();

    let config = MatrixConfig::default();
    let generator = MatrixGenerator::new(
        &config,
        everything(),
        RenderOptions::default(),
        tmp.path(),
        Mode::Check,
    );
    let mut seen = 0;
    let result = generator.run(|_| seen += 1);

    assert!(result.is_err());
    assert_eq!(seen, 1);
}

// ── GPU track ──

#[test]
fn gpu_track_only_reports_unsupported_targets() {
    assert!(!GPU_CONTAINERS_SUPPORTED);
    let tmp = TempDir::new().unwrap();
    let selection = Selection {
        gpu: Filter::Only(TargetGpu::P100),
        ..everything()
    };

    let steps = run(tmp.path(), selection, Mode::Write).unwrap();

    let unsupported: Vec<_> = steps
        .iter()
        .filter(|s| matches!(s, Step::GpuUnsupported(TargetGpu::P100)))
        .collect();
    // one per (release, mpi, cpu)
    assert_eq!(unsupported.len(), 8);
    assert!(
        sorted_dir(tmp.path())
            .iter()
            .all(|name| !name.contains("cuda"))
    );
}

#[test]
fn gpu_track_with_all_targets_reports_every_gpu_value() {
    let tmp = TempDir::new().unwrap();
    let config = MatrixConfig::default();
    let generator = MatrixGenerator::new(
        &config,
        everything(),
        RenderOptions::default(),
        tmp.path(),
        Mode::Write,
    );
    let mut steps = Vec::new();

    let report = generator.run(|step| steps.push(step.clone())).unwrap();

    let count = |target: TargetGpu| {
        steps
            .iter()
            .filter(|s| **s == Step::GpuUnsupported(target))
            .count()
    };
    assert_eq!(count(TargetGpu::NoGpu), 8);
    assert_eq!(count(TargetGpu::P100), 8);
    assert_eq!(report.unsupported_gpus.len(), 16);
    assert_eq!(report.outcomes.len(), 16);
    assert!(
        sorted_dir(tmp.path())
            .iter()
            .all(|name| !name.contains("cuda"))
    );
}

#[test]
fn gpu_track_is_silent_for_no_gpu_selection() {
    let tmp = TempDir::new().unwrap();

    let steps = run(tmp.path(), Selection::default(), Mode::Write).unwrap();

    assert!(
        steps
            .iter()
            .all(|s| !matches!(s, Step::GpuUnsupported(_)))
    );
}

// ── Host cores ──

#[test]
fn host_core_warning_only_when_exceeded() {
    let n = |v| NonZeroU32::new(v).unwrap();

    assert_eq!(
        check_host_cores(n(32), Some(8)).as_deref(),
        Some("WARNING: More CPU cores requested for build than available (32 > 8)")
    );
    assert!(check_host_cores(n(8), Some(8)).is_none());
    assert!(check_host_cores(n(1), Some(8)).is_none());
    assert!(check_host_cores(n(64), None).is_none());
}
