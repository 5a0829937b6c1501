use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::{Error, Result};

/// Token that selects every value of an axis.
pub const WILDCARD: &str = "all";

/// One independent dimension of the build matrix.
pub trait Axis: Copy + Eq + fmt::Debug + 'static {
    /// Human-readable axis name used in diagnostics.
    const NAME: &'static str;
    /// Whether `all` is listed before the axis values in the CLI choices.
    const WILDCARD_FIRST: bool;

    /// Every value of the axis, in enumeration order.
    fn all() -> &'static [Self];

    fn as_str(&self) -> &'static str;
}

macro_rules! axis {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal, wildcard_first = $first:literal {
            $($variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl Axis for $name {
            const NAME: &'static str = $label;
            const WILDCARD_FIRST: bool = $first;

            fn all() -> &'static [Self] {
                Self::ALL
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| Error::UnknownAxisValue {
                        axis: $label,
                        value: s.to_owned(),
                        expected: Self::ALL.iter().map(Axis::as_str).collect(),
                    })
            }
        }
    };
}

axis! {
    /// CP2K release the container is built from.
    Release, "release", wildcard_first = true {
        V2025_2 => "2025.2",
        Master => "master",
    }
}

axis! {
    MpiImplementation, "MPI implementation", wildcard_first = true {
        Mpich => "mpich",
        OpenMpi => "openmpi",
    }
}

axis! {
    TargetCpu, "target CPU", wildcard_first = true {
        X86_64 => "x86_64",
        CascadeLake => "cascadelake",
    }
}

axis! {
    /// `NoGpu` is the CPU-only track; every other value is a CUDA target.
    TargetGpu, "target GPU", wildcard_first = false {
        NoGpu => "no GPU",
        P100 => "P100",
    }
}

axis! {
    /// Build flavor of the CP2K binary.
    Variant, "version", wildcard_first = false {
        Psmp => "psmp",
        Pdbg => "pdbg",
    }
}

/// Release-specific knobs of the rendered Dockerfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseProfile {
    /// Suffix of the Spack dependency manifest and CMake preset.
    pub build_type: &'static str,
    /// Branch passed to `git clone -b`; `None` clones the default branch.
    pub branch: Option<&'static str>,
    /// Rolling releases embed the build date in the image tag.
    pub dated_tag: bool,
}

impl Release {
    pub fn profile(self) -> ReleaseProfile {
        match self {
            Release::V2025_2 => ReleaseProfile {
                build_type: "_all",
                branch: Some("support/v2025.2"),
                dated_tag: false,
            },
            Release::Master => ReleaseProfile {
                build_type: "",
                branch: None,
                dated_tag: true,
            },
        }
    }
}

impl TargetGpu {
    pub fn is_gpu(self) -> bool {
        self != TargetGpu::NoGpu
    }
}

/// Either the wildcard or one concrete axis value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T: Axis> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(selected) => selected == value,
        }
    }

    /// Accepted tokens, in the order they are offered on the command line.
    pub fn choices() -> Vec<&'static str> {
        let values = T::all().iter().map(Axis::as_str);
        if T::WILDCARD_FIRST {
            std::iter::once(WILDCARD).chain(values).collect()
        } else {
            values.chain(std::iter::once(WILDCARD)).collect()
        }
    }
}

impl<T: Axis + FromStr<Err = Error>> FromStr for Filter<T> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == WILDCARD {
            return Ok(Filter::All);
        }
        s.parse().map(Filter::Only).map_err(|_| Error::UnknownAxisValue {
            axis: T::NAME,
            value: s.to_owned(),
            expected: Self::choices(),
        })
    }
}

impl<T: Axis> fmt::Display for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str(WILDCARD),
            Filter::Only(value) => f.write_str(value.as_str()),
        }
    }
}

/// One filter per axis, as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub release: Filter<Release>,
    pub mpi: Filter<MpiImplementation>,
    pub cpu: Filter<TargetCpu>,
    pub gpu: Filter<TargetGpu>,
    pub variant: Filter<Variant>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            release: Filter::All,
            mpi: Filter::All,
            cpu: Filter::All,
            gpu: Filter::Only(TargetGpu::NoGpu),
            variant: Filter::Only(Variant::Psmp),
        }
    }
}

/// One fully-specified point of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combination {
    pub release: Release,
    pub mpi: MpiImplementation,
    pub cpu: TargetCpu,
    /// `None` on the CPU track.
    pub gpu: Option<TargetGpu>,
    pub variant: Variant,
}

impl Combination {
    /// Underscore-joined axis values, e.g. `2025.2_mpich_x86_64_psmp`.
    pub fn name(&self) -> String {
        match self.gpu {
            Some(gpu) => format!(
                "{}_{}_{}_cuda_{}_{}",
                self.release, self.mpi, self.cpu, gpu, self.variant
            ),
            None => format!(
                "{}_{}_{}_{}",
                self.release, self.mpi, self.cpu, self.variant
            ),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.Dockerfile", self.name())
    }
}

/// Parses the `--ncores` value. Anything below one or above `u32::MAX` is rejected.
pub fn parse_ncores(value: &str) -> Result<NonZeroU32> {
    let invalid = || Error::InvalidCoreCount {
        value: value.to_owned(),
    };
    let parsed: i64 = value.trim().parse().map_err(|_| invalid())?;
    let count = u32::try_from(parsed).map_err(|_| invalid())?;
    NonZeroU32::new(count).ok_or_else(invalid)
}
