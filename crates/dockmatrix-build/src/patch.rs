use std::fmt;

use dockmatrix_core::{Combination, MpiImplementation, Release, TargetCpu};

/// One `sed -e` clause applied to the Spack dependency manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SedRule {
    /// Inserts a `require: target=` line above the `mpi:` provider block.
    RequireTargetBeforeMpi(TargetCpu),
    /// Rewrites the existing `require: target=` line.
    ReplaceRequireTarget(TargetCpu),
    /// Switches the MPI provider from MPICH to OpenMPI.
    SwapMpiProvider,
    /// Adds an `openmpi` package entry requiring the internal hwloc.
    InjectOpenMpiHwloc,
    CommentOutMpich,
    /// Must run after [`SedRule::CommentOutMpich`]: both toggle the same `#` marker column.
    UncommentOpenMpi,
}

impl fmt::Display for SedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SedRule::RequireTargetBeforeMpi(cpu) => {
                write!(f, r#"/^\s*mpi:/i\      require: target="{cpu}""#)
            }
            SedRule::ReplaceRequireTarget(cpu) => {
                write!(f, r#"s/require: target="\w*"/require: target="{cpu}"/"#)
            }
            SedRule::SwapMpiProvider => f.write_str("s/- mpich/- openmpi/"),
            SedRule::InjectOpenMpiHwloc => f.write_str(
                r"/^\s*xpmem:/i\    openmpi:\n      require:\n        - +internal-hwloc",
            ),
            SedRule::CommentOutMpich => f.write_str(r#"/^\s*- "mpich@/ s/^ /#/"#),
            SedRule::UncommentOpenMpi => f.write_str(r#"/^#\s*- "openmpi@/ s/^#/ /"#),
        }
    }
}

/// Ordered list of [`SedRule`]s plus the manifest they edit in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    rules: Vec<SedRule>,
    manifest: String,
}

impl PatchPlan {
    pub fn for_combination(combination: &Combination) -> Self {
        let release = combination.release;
        let mut rules = vec![match release {
            Release::V2025_2 => SedRule::RequireTargetBeforeMpi(combination.cpu),
            Release::Master => SedRule::ReplaceRequireTarget(combination.cpu),
        }];

        if combination.mpi == MpiImplementation::OpenMpi {
            rules.push(SedRule::SwapMpiProvider);
            if release == Release::V2025_2 {
                rules.push(SedRule::InjectOpenMpiHwloc);
            }
            rules.push(SedRule::CommentOutMpich);
            rules.push(SedRule::UncommentOpenMpi);
        }

        Self {
            rules,
            manifest: manifest_path(release),
        }
    }

    pub fn rules(&self) -> &[SedRule] {
        &self.rules
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }

    /// Renders the full `sed` invocation.
    pub fn render(&self) -> String {
        let mut command = String::from("sed");
        for rule in &self.rules {
            command.push_str(&format!(" -e '{rule}'"));
        }
        command.push_str(" -i ");
        command.push_str(&self.manifest);
        command
    }
}

/// Spack environment manifest shipped with the CP2K sources.
pub fn manifest_path(release: Release) -> String {
    format!(
        "/opt/cp2k/tools/spack/cp2k_deps{}_${{CP2K_VERSION}}.yaml",
        release.profile().build_type
    )
}
