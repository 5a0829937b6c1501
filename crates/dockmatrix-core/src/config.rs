use std::path::Path;

use serde::{Deserialize, Serialize};

/// File name of the optional configuration, looked up in the output directory.
pub const CONFIG_FILE_NAME: &str = "dockmatrix.toml";

/// dockmatrix.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub spack: SpackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Base image of the CPU-only containers
    #[serde(default = "default_base_image")]
    pub base: String,
    /// Base image of the CUDA containers
    #[serde(default = "default_cuda_base_image")]
    pub cuda_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// OMP_STACKSIZE exported by the container entrypoint
    #[serde(default = "default_omp_stacksize")]
    pub omp_stacksize: String,
    /// Lines of the build log shown when compilation fails
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,
    /// Packages installed in both the build and the install stage
    #[serde(default = "default_required_packages")]
    pub required_packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpackConfig {
    /// Spack release
    #[serde(default = "default_spack_version")]
    pub version: String,
    /// spack-packages release
    #[serde(default = "default_spack_packages_version")]
    pub packages_version: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base: default_base_image(),
            cuda_base: default_cuda_base_image(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            omp_stacksize: default_omp_stacksize(),
            log_lines: default_log_lines(),
            required_packages: default_required_packages(),
        }
    }
}

impl Default for SpackConfig {
    fn default() -> Self {
        Self {
            version: default_spack_version(),
            packages_version: default_spack_packages_version(),
        }
    }
}

impl MatrixConfig {
    /// Load from dockmatrix.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &Path) -> crate::Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        let config = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    }
}

fn default_base_image() -> String {
    "ubuntu:24.04".to_owned()
}

fn default_cuda_base_image() -> String {
    "nvidia/cuda:12.8.1-devel-ubuntu24.04".to_owned()
}

fn default_omp_stacksize() -> String {
    "64M".to_owned()
}

fn default_log_lines() -> u32 {
    200
}

fn default_required_packages() -> Vec<String> {
    ["g++", "gcc", "gfortran", "python3"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_spack_version() -> String {
    "1.0.0".to_owned()
}

fn default_spack_packages_version() -> String {
    "2025.07.0".to_owned()
}
