use crate::profile::LoadProfile;
use crate::profiles::run_build_step;
use crate::spec::{SystemResources, WorkerSpec};
use async_trait::async_trait;
use rtbench_common::{BenchError, BenchResult};
use rtbench_process::{ChildOutput, CommandLine, StopSignal};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const KERNEL_PREFIX: &str = "linux-";

/// Kernel build load: repeated parallel `make` of an unpacked kernel tree.
#[derive(Debug, Clone)]
pub struct KcompileProfile {
    jobs_per_core: u32,
    tarball: Option<String>,
    source: Option<PathBuf>,
    kernel_dir: Option<PathBuf>,
}

impl Default for KcompileProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl KcompileProfile {
    pub fn new() -> Self {
        Self {
            jobs_per_core: 2,
            tarball: None,
            source: None,
            kernel_dir: None,
        }
    }

    pub fn with_jobs_per_core(mut self, jobs_per_core: u32) -> Self {
        self.jobs_per_core = jobs_per_core;
        self
    }

    /// Use this tarball (relative to the source directory) instead of the
    /// first `linux-*` file found there.
    pub fn with_tarball(mut self, tarball: impl Into<String>) -> Self {
        self.tarball = Some(tarball.into());
        self
    }

    /// `make` jobs: `jobs_per_core` per CPU with more than 1 GiB per CPU,
    /// otherwise one per CPU.
    pub fn jobs_for(&self, system: &SystemResources) -> usize {
        let ratio = system.memory_per_cpu_gib();
        if ratio > 1.0 {
            system.num_cpus * self.jobs_per_core as usize
        } else {
            debug!("Low memory system ({:.2} GiB/core), one make job per core", ratio);
            system.num_cpus
        }
    }

    pub fn kernel_dir(&self) -> Option<&Path> {
        self.kernel_dir.as_deref()
    }

    fn locate_tarball(&self, worker: &str, srcdir: &Path) -> BenchResult<PathBuf> {
        if let Some(name) = &self.tarball {
            let path = srcdir.join(name);
            if !path.is_file() {
                return Err(BenchError::setup(
                    worker,
                    format!("tarball {} does not exist", path.display()),
                ));
            }
            return Ok(path);
        }
        first_with_prefix(srcdir, |p| p.is_file())
            .ok_or_else(|| {
                BenchError::setup(
                    worker,
                    format!(
                        "no kernel tarball in {} and no unpacked kernel tree",
                        srcdir.display()
                    ),
                )
            })
    }
}

/// First directory entry (by name) starting with `linux-` that passes `keep`.
fn first_with_prefix(dir: &Path, keep: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(KERNEL_PREFIX))
        .map(|entry| entry.path())
        .filter(|path| keep(path))
        .collect();
    matches.sort();
    matches.into_iter().next()
}

fn tar_command(builddir: &Path, tarball: &Path) -> CommandLine {
    let name = tarball.to_string_lossy();
    let mut cmd = CommandLine::new("tar")
        .arg("-C")
        .arg(builddir.to_string_lossy())
        .arg("-x");
    if name.ends_with(".bz2") {
        cmd = cmd.arg("-j");
    } else if name.ends_with(".gz") || name.ends_with(".tgz") {
        cmd = cmd.arg("-z");
    } else if name.ends_with(".xz") {
        cmd = cmd.arg("-J");
    }
    cmd.arg("-f").arg(name)
}

#[async_trait]
impl LoadProfile for KcompileProfile {
    fn kind(&self) -> &'static str {
        "kcompile"
    }

    fn stop_signal(&self) -> StopSignal {
        StopSignal::Terminate
    }

    async fn setup(&mut self, spec: &WorkerSpec) -> BenchResult<()> {
        let worker = spec.name.as_str();
        if let Some(dir) = first_with_prefix(&spec.builddir, |p| p.is_dir()) {
            info!(worker, "Using unpacked kernel tree {}", dir.display());
            self.kernel_dir = Some(dir);
            return Ok(());
        }
        let tarball = self.locate_tarball(worker, &spec.srcdir)?;
        info!(worker, "Using kernel tarball {}", tarball.display());
        self.source = Some(tarball);
        Ok(())
    }

    async fn build(&mut self, spec: &WorkerSpec) -> BenchResult<()> {
        let worker = spec.name.as_str();
        let output = if spec.logging {
            let paths = spec.log_paths_for(&format!("{}-build", worker));
            ChildOutput::Append {
                stdout: paths.stdout,
                stderr: paths.stderr,
            }
        } else {
            ChildOutput::Discard
        };

        if self.kernel_dir.is_none() {
            let source = self.source.clone().ok_or_else(|| {
                BenchError::build(worker, "no kernel source located during setup")
            })?;
            tokio::fs::create_dir_all(&spec.builddir).await?;
            info!(worker, "Unpacking {}", source.display());
            run_build_step(worker, &tar_command(&spec.builddir, &source), &output).await?;
            self.kernel_dir = first_with_prefix(&spec.builddir, |p| p.is_dir());
        }

        let dir = self.kernel_dir.clone().ok_or_else(|| {
            BenchError::build(
                worker,
                format!("no kernel tree found in {}", spec.builddir.display()),
            )
        })?;

        let configure = CommandLine::new("make")
            .arg("-C")
            .arg(dir.to_string_lossy())
            .args(["mrproper", "allmodconfig"]);
        if let Err(e) = run_build_step(worker, &configure, &output).await {
            warn!(worker, "Kernel configuration failed");
            return Err(e);
        }
        Ok(())
    }

    fn command(&self, spec: &WorkerSpec) -> Option<CommandLine> {
        let dir = self.kernel_dir.as_ref()?;
        Some(
            CommandLine::new("make")
                .arg("-C")
                .arg(dir.to_string_lossy())
                .arg(format!("-j{}", self.jobs_for(&spec.system))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(cpus: usize, gib: u64) -> SystemResources {
        SystemResources {
            num_cpus: cpus,
            memory_bytes: gib * 1024 * 1024 * 1024,
            numa_nodes: 1,
            cpu_description: "cpu".to_string(),
        }
    }

    fn spec_in(root: &Path) -> WorkerSpec {
        let build = root.join("build");
        let src = root.join("src");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::create_dir_all(&src).unwrap();
        WorkerSpec::new("kcompile", system(4, 16)).with_dirs(build, src, root)
    }

    #[test]
    fn test_job_sizing() {
        let profile = KcompileProfile::new();
        assert_eq!(profile.jobs_for(&system(4, 16)), 8);
        // exactly 1 GiB per core is not enough
        assert_eq!(profile.jobs_for(&system(4, 4)), 4);
        assert_eq!(profile.with_jobs_per_core(3).jobs_for(&system(2, 8)), 6);
    }

    #[test]
    fn test_tar_flags() {
        let cmd = tar_command(Path::new("/b"), Path::new("/s/linux-6.1.tar.xz"));
        assert_eq!(cmd.describe(), "tar -C /b -x -J -f /s/linux-6.1.tar.xz");
        let cmd = tar_command(Path::new("/b"), Path::new("/s/linux-4.1.tar.bz2"));
        assert_eq!(cmd.describe(), "tar -C /b -x -j -f /s/linux-4.1.tar.bz2");
    }

    #[tokio::test]
    async fn test_setup_prefers_unpacked_tree() {
        let root = tempfile::tempdir().unwrap();
        let spec = spec_in(root.path());
        std::fs::create_dir(spec.builddir.join("linux-6.6")).unwrap();

        let mut profile = KcompileProfile::new();
        profile.setup(&spec).await.unwrap();
        assert_eq!(profile.kernel_dir(), Some(spec.builddir.join("linux-6.6").as_path()));

        let cmd = profile.command(&spec).unwrap();
        assert_eq!(
            cmd.describe(),
            format!("make -C {} -j8", spec.builddir.join("linux-6.6").display())
        );
    }

    #[tokio::test]
    async fn test_setup_finds_tarball() {
        let root = tempfile::tempdir().unwrap();
        let spec = spec_in(root.path());
        std::fs::write(spec.srcdir.join("linux-6.6.tar.xz"), b"").unwrap();
        std::fs::write(spec.srcdir.join("README"), b"").unwrap();

        let mut profile = KcompileProfile::new();
        profile.setup(&spec).await.unwrap();
        assert_eq!(profile.source, Some(spec.srcdir.join("linux-6.6.tar.xz")));
        // nothing to run until the build unpacks it
        assert!(profile.command(&spec).is_none());
    }

    #[tokio::test]
    async fn test_setup_without_sources_fails() {
        let root = tempfile::tempdir().unwrap();
        let spec = spec_in(root.path());

        let err = KcompileProfile::new().setup(&spec).await.unwrap_err();
        assert!(matches!(err, BenchError::Setup { .. }));

        let err = KcompileProfile::new()
            .with_tarball("linux-missing.tar.gz")
            .setup(&spec)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("linux-missing.tar.gz"));
    }

    #[tokio::test]
    async fn test_build_unpacks_tarball() {
        let root = tempfile::tempdir().unwrap();
        let spec = spec_in(root.path());

        // a tiny "kernel" whose Makefile accepts the configure targets
        let staging = root.path().join("staging");
        let tree = staging.join("linux-0.0");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("Makefile"), "mrproper:\n\t@true\nallmodconfig:\n\t@true\n").unwrap();
        let status = std::process::Command::new("tar")
            .arg("-C")
            .arg(&staging)
            .args(["-czf"])
            .arg(spec.srcdir.join("linux-0.0.tar.gz"))
            .arg("linux-0.0")
            .status()
            .unwrap();
        assert!(status.success());

        let mut profile = KcompileProfile::new();
        profile.setup(&spec).await.unwrap();
        if rtbench_process::find_executable("make").is_none() {
            return;
        }
        profile.build(&spec).await.unwrap();
        assert_eq!(profile.kernel_dir(), Some(spec.builddir.join("linux-0.0").as_path()));
    }

    #[tokio::test]
    async fn test_failed_configure_is_build_error() {
        let root = tempfile::tempdir().unwrap();
        let spec = spec_in(root.path());
        let tree = spec.builddir.join("linux-broken");
        std::fs::create_dir(&tree).unwrap();
        std::fs::write(tree.join("Makefile"), "mrproper:\n\t@false\n").unwrap();

        let mut profile = KcompileProfile::new();
        profile.setup(&spec).await.unwrap();
        let err = profile.build(&spec).await.unwrap_err();
        assert!(matches!(err, BenchError::Build { .. }));
    }
}
