use std::num::NonZeroU32;

use dockmatrix_core::axis::Axis;
use dockmatrix_core::{Combination, MatrixConfig, MpiImplementation};

use crate::patch::PatchPlan;

/// Install prefix of the CUDA toolkit in the NVIDIA base images.
const CUDA_PATH: &str = "/usr/local/cuda";

const DEFAULT_NCORES: NonZeroU32 = NonZeroU32::new(16).unwrap();

/// Caller-supplied parameters that are not part of the matrix itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// CPU cores used for the build and the regression tests.
    pub ncores: NonZeroU32,
    /// GitHub and DockerHub account of the CP2K fork.
    pub user_name: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            ncores: DEFAULT_NCORES,
            user_name: "cp2k".to_owned(),
        }
    }
}

/// Generates the two-stage (build, install) CP2K Dockerfile for one combination.
pub struct DockerfileGenerator<'a> {
    config: &'a MatrixConfig,
    combination: &'a Combination,
    options: &'a RenderOptions,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(
        config: &'a MatrixConfig,
        combination: &'a Combination,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            config,
            combination,
            options,
        }
    }

    /// Image tag; rolling releases defer the date to the shell running the build.
    pub fn tag(&self) -> String {
        let name = self.combination.name();
        if self.combination.release.profile().dated_tag {
            let release = self.combination.release.as_str();
            name.replace(release, &format!("{release}$(date +%Y%m%d)"))
        } else {
            name
        }
    }

    /// Options passed to `do_regtest.py` by the `run_tests` shortcut.
    pub fn test_options(&self) -> String {
        let options = format!("--maxtasks {} --workbasedir /mnt", self.options.ncores);
        match self.combination.mpi {
            MpiImplementation::OpenMpi => {
                format!(r#"--mpiexec \"mpiexec --bind-to none\" {options}"#)
            }
            MpiImplementation::Mpich => options,
        }
    }

    fn base_image(&self) -> &str {
        if self.is_gpu() {
            &self.config.images.cuda_base
        } else {
            &self.config.images.base
        }
    }

    fn is_gpu(&self) -> bool {
        self.combination.gpu.is_some_and(|gpu| gpu.is_gpu())
    }

    fn branch_arg(&self) -> String {
        match self.combination.release.profile().branch {
            Some(branch) => format!(" -b {branch}"),
            None => String::new(),
        }
    }

    fn cuda_environment(&self) -> String {
        if !self.is_gpu() {
            return String::new();
        }
        format!(
            r#"# Setup CUDA environment
ENV CUDA_PATH {CUDA_PATH}
ENV LD_LIBRARY_PATH {CUDA_PATH}/lib64

# Disable JIT cache as there seems to be an issue with file locking on overlayfs
# See also https://github.com/cp2k/cp2k/pull/2337
ENV CUDA_CACHE_DISABLE 1

"#
        )
    }

    /// `export` lines of the entrypoint script, in order.
    fn entrypoint_exports(&self) -> Vec<(&'static str, String)> {
        let mut exports = Vec::new();
        if self.is_gpu() {
            exports.push(("CUDA_CACHE_DISABLE", "1".to_owned()));
            exports.push(("CUDA_PATH", CUDA_PATH.to_owned()));
            exports.push((
                "LD_LIBRARY_PATH",
                r"\${LD_LIBRARY_PATH}:\${CUDA_PATH}/lib64".to_owned(),
            ));
        }
        if self.combination.mpi == MpiImplementation::OpenMpi {
            exports.push(("OMPI_ALLOW_RUN_AS_ROOT", "1".to_owned()));
            exports.push(("OMPI_ALLOW_RUN_AS_ROOT_CONFIRM", "1".to_owned()));
            exports.push(("OMPI_MCA_btl_vader_single_copy_mechanism", "none".to_owned()));
        }
        exports.push(("OMP_STACKSIZE", self.config.build.omp_stacksize.clone()));
        exports.push(("PATH", r"/opt/cp2k/bin:/opt/spack/bin:\${PATH}".to_owned()));
        exports
    }

    pub fn render(&self) -> String {
        let profile = self.combination.release.profile();
        let exports: String = self
            .entrypoint_exports()
            .into_iter()
            .map(|(name, value)| format!("export {name}={value}\\n\\\n"))
            .collect();

        format!(
            r##"
# Usage: podman build --shm-size=1g -f ./{file_name} -t {user_name}/cp2k:{tag} .

# Stage 1: Build CP2K
ARG BASE_IMAGE="{base_image}"
FROM ${{BASE_IMAGE}} AS build_cp2k

# Install packages required to build the CP2K dependencies with Spack
RUN apt-get update -qq && apt-get install -qq --no-install-recommends \
    {required_packages} \
    automake \
    bzip2 \
    ca-certificates \
    cmake \
    git \
    libncurses-dev \
    libssh-dev \
    libssl-dev \
    libtool-bin \
    lsb-release \
    make \
    ninja-build \
    openssh-client \
    patch \
    pkgconf \
    python3-dev \
    python3-pip \
    python3-venv \
    unzip \
    wget \
    xxd \
    xz-utils \
    zstd && rm -rf /var/lib/apt/lists/*

# Download CP2K
RUN git clone --recursive{branch} https://github.com/{user_name}/cp2k.git /opt/cp2k

# Retrieve the number of available CPU cores
ARG NUM_PROCS
ENV NUM_PROCS=${{NUM_PROCS:-{ncores}}}

# Install Spack and Spack packages
WORKDIR /root/spack
ARG SPACK_VERSION
ENV SPACK_VERSION=${{SPACK_VERSION:-{spack_version}}}
ARG SPACK_PACKAGES_VERSION
ENV SPACK_PACKAGES_VERSION=${{SPACK_PACKAGES_VERSION:-{spack_packages_version}}}
ARG SPACK_REPO=https://github.com/spack/spack
ENV SPACK_ROOT=/opt/spack-${{SPACK_VERSION}}
ARG SPACK_PACKAGES_REPO=https://github.com/spack/spack-packages
ENV SPACK_PACKAGES_ROOT=/opt/spack-packages-${{SPACK_PACKAGES_VERSION}}
RUN mkdir -p ${{SPACK_ROOT}} && \
    wget -q ${{SPACK_REPO}}/archive/v${{SPACK_VERSION}}.tar.gz && \
    tar -xzf v${{SPACK_VERSION}}.tar.gz -C /opt && rm -f v${{SPACK_VERSION}}.tar.gz && \
    mkdir -p ${{SPACK_PACKAGES_ROOT}} && \
    wget -q ${{SPACK_PACKAGES_REPO}}/archive/v${{SPACK_PACKAGES_VERSION}}.tar.gz && \
    tar -xzf v${{SPACK_PACKAGES_VERSION}}.tar.gz -C /opt && rm -f v${{SPACK_PACKAGES_VERSION}}.tar.gz

ENV PATH="${{SPACK_ROOT}}/bin:${{PATH}}"

# Add Spack packages builtin repository
RUN spack repo add --scope site ${{SPACK_PACKAGES_ROOT}}/repos/spack_repo/builtin

# Find all compilers
RUN spack compiler find

# Find all external packages
RUN spack external find --all --not-buildable

# Copy Spack configuration and build recipes
ARG CP2K_VERSION
ENV CP2K_VERSION=${{CP2K_VERSION:-{variant}}}
RUN cp -a /opt/cp2k/tools/spack/cp2k_dev_repo ${{SPACK_PACKAGES_ROOT}}/repos/spack_repo && \
    spack repo add --scope site ${{SPACK_PACKAGES_ROOT}}/repos/spack_repo/cp2k_dev_repo
RUN {patch_command} && \
    cat {manifest} && \
    spack env create myenv {manifest} && \
    spack -e myenv repo list

# Install CP2K dependencies via Spack
RUN spack -e myenv concretize -f
ENV SPACK_ENV_VIEW="${{SPACK_ROOT}}/var/spack/environments/myenv/spack-env/view"
RUN spack -e myenv env depfile -o spack_makefile && \
    make -j${{NUM_PROCS}} --file=spack_makefile SPACK_COLOR=never --output-sync=recurse && \
    cp -ar ${{SPACK_ENV_VIEW}}/bin ${{SPACK_ENV_VIEW}}/include ${{SPACK_ENV_VIEW}}/lib /opt/spack

# Run CMake
WORKDIR /opt/cp2k
RUN /bin/bash -c -o pipefail "source ./cmake/cmake_cp2k.sh spack{build_type} ${{CP2K_VERSION}}"

# Compile CP2K for target CPU {target_cpu}
ARG LOG_LINES
ENV LOG_LINES=${{LOG_LINES:-{log_lines}}}
WORKDIR /opt/cp2k/build
RUN /bin/bash -c -o pipefail " \
    echo -e '\nCompiling CP2K ... \c'; \
    if ninja --verbose &>ninja.log; then \
      echo -e 'done\n'; \
      echo -e 'Installing CP2K ... \c'; \
      if ninja --verbose install &>install.log; then \
        echo -e 'done\n'; \
      else \
        echo -e 'failed\n'; \
        tail -n ${{LOG_LINES}} install.log; \
      fi; \
      cat cmake.log ninja.log install.log | gzip >build_cp2k.log.gz; \
    else \
      echo -e 'failed\n'; \
      tail -n ${{LOG_LINES}} ninja.log; \
      cat cmake.log ninja.log | gzip >build_cp2k.log.gz; \
    fi"

# Store build arguments from base image needed in next stage
RUN echo "${{CP2K_VERSION}}" >/CP2K_VERSION

# Stage 2: Install CP2K
FROM ${{BASE_IMAGE}} AS install_cp2k

# Install required packages
RUN apt-get update -qq && apt-get install -qq --no-install-recommends \
    {required_packages} && rm -rf /var/lib/apt/lists/*

{cuda_environment}# Import build arguments from base image
COPY --from=build_cp2k /CP2K_VERSION /

# Install CP2K dependencies built with Spack
WORKDIR /opt
COPY --from=build_cp2k /opt/spack ./spack

# Install CP2K binaries
WORKDIR /opt/cp2k
COPY --from=build_cp2k /opt/cp2k/bin ./bin

# Install CP2K libraries
COPY --from=build_cp2k /opt/cp2k/lib ./lib

# Install CP2K database files
COPY --from=build_cp2k /opt/cp2k/share ./share

# Install CP2K regression tests
COPY --from=build_cp2k /opt/cp2k/tests ./tests
COPY --from=build_cp2k /opt/cp2k/src/grid/sample_tasks ./src/grid/sample_tasks

# Install CP2K/Quickstep CI benchmarks
COPY --from=build_cp2k /opt/cp2k/benchmarks/CI ./benchmarks/CI

# Import compressed build log file
COPY --from=build_cp2k /opt/cp2k/build/build_cp2k.log.gz /opt/cp2k/build/build_cp2k.log.gz

# Create links to CP2K binaries
WORKDIR /opt/cp2k/bin
RUN CP2K_VERSION=$(cat /CP2K_VERSION) && \
    ln -sf cp2k.${{CP2K_VERSION}} cp2k && \
    ln -sf cp2k.${{CP2K_VERSION}} cp2k.$(echo ${{CP2K_VERSION}} | sed "s/smp/opt/") && \
    ln -sf cp2k.${{CP2K_VERSION}} cp2k_shell

# Update library search path
RUN echo "/opt/cp2k/lib\n/opt/spack/lib\n$(dirname $(find /opt/spack/lib -name libtorch.so 2>/dev/null || true) 2>/dev/null || true)" >/etc/ld.so.conf.d/cp2k.conf && ldconfig

# Create entrypoint script file
RUN printf "#!/bin/bash\n\
ulimit -c 0 -s unlimited\n\
{exports}\"\$@\"" \
>/opt/cp2k/bin/entrypoint.sh && chmod 755 /opt/cp2k/bin/entrypoint.sh

# Create shortcut for regression test
RUN printf "/opt/cp2k/tests/do_regtest.py {test_options} \$* /opt/cp2k/bin $(cat /CP2K_VERSION)" \
>/opt/cp2k/bin/run_tests && chmod 755 /opt/cp2k/bin/run_tests

# Define entrypoint
WORKDIR /mnt
ENTRYPOINT ["/opt/cp2k/bin/entrypoint.sh"]
CMD ["cp2k", "--help"]

# EOF
"##,
            file_name = self.combination.file_name(),
            user_name = self.options.user_name,
            tag = self.tag(),
            base_image = self.base_image(),
            required_packages = self.config.build.required_packages.join(" "),
            branch = self.branch_arg(),
            ncores = self.options.ncores,
            spack_version = self.config.spack.version,
            spack_packages_version = self.config.spack.packages_version,
            variant = self.combination.variant,
            patch_command = PatchPlan::for_combination(self.combination).render(),
            manifest = crate::patch::manifest_path(self.combination.release),
            build_type = profile.build_type,
            target_cpu = self.combination.cpu,
            log_lines = self.config.build.log_lines,
            cuda_environment = self.cuda_environment(),
            exports = exports,
            test_options = self.test_options(),
        )
    }
}
