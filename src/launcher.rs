use crate::cache::CacheLayout;
use crate::config::{Config, DENO_DIR_ENV};
use crate::download::{build_client, Downloader};
use crate::error::{LauncherError, Result};
use crate::fetch::{ArtifactFetcher, Fetched};
use crate::install::Installer;
use crate::models::{RuntimePlatform, RuntimeTarget};
use crate::signals::SignalRelay;
use crate::version::VersionResolver;
use reqwest::Client;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code when an interrupt arrives before the child is started.
///
/// Kept below the `128 + n` range so it never matches a child killed by a relayed signal.
pub const SETUP_INTERRUPTED_EXIT_CODE: i32 = 125;

/// Exit code for any launcher-level failure
pub const FAILURE_EXIT_CODE: i32 = 1;

/// What the process should exit with, and why if the launcher itself failed
#[derive(Debug)]
pub struct Outcome {
    pub exit_code: i32,
    pub error: Option<LauncherError>,
}

impl Outcome {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            error: None,
        }
    }

    pub fn failed(error: LauncherError) -> Self {
        Self {
            exit_code: FAILURE_EXIT_CODE,
            error: Some(error),
        }
    }

    fn interrupted() -> Self {
        Self::exited(SETUP_INTERRUPTED_EXIT_CODE)
    }
}

/// The executable ready to run and the directory it owns
struct Prepared {
    executable: PathBuf,
    layout: CacheLayout,
}

enum Setup {
    Ready(Result<Prepared>),
    Interrupted(i32),
}

pub struct Launcher {
    config: Config,
    host_os: String,
    host_arch: String,
}

impl Launcher {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Resolve the platform from these host identifiers instead of the compiled-in ones.
    #[cfg(test)]
    pub fn with_host(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.host_os = os.into();
        self.host_arch = arch.into();
        self
    }

    /// Prepare the pinned Deno and run it with `args`, producing the exit code to hand to the OS.
    pub async fn run(&self, args: Vec<OsString>) -> Outcome {
        // Nothing touches the network or disk before the platform is known to be supported.
        let platform = match RuntimePlatform::resolve(&self.host_os, &self.host_arch) {
            Ok(platform) => platform,
            Err(e) => return Outcome::failed(e),
        };

        let mut relay = match SignalRelay::install() {
            Ok(relay) => relay,
            Err(e) => return Outcome::failed(e),
        };

        let mut artifact: Option<PathBuf> = None;
        let outcome = self
            .supervise(platform, &mut relay, args, &mut artifact)
            .await;

        if let Err(e) = CacheLayout::release(&self.config.cache_dir, artifact.as_deref()) {
            warn!("Failed to clean download cache: {}", e);
        }

        outcome
    }

    async fn supervise(
        &self,
        platform: RuntimePlatform,
        relay: &mut SignalRelay,
        args: Vec<OsString>,
        artifact: &mut Option<PathBuf>,
    ) -> Outcome {
        let setup = tokio::select! {
            prepared = self.prepare(platform, artifact) => Setup::Ready(prepared),
            signal = relay.interrupted() => Setup::Interrupted(signal),
        };

        let prepared = match setup {
            Setup::Ready(Ok(prepared)) => prepared,
            Setup::Ready(Err(e)) => return Outcome::failed(e),
            Setup::Interrupted(signal) => {
                info!("Interrupted by signal {} during setup", signal);
                return Outcome::interrupted();
            }
        };

        relay.arm();
        if let Some(signal) = relay.interruption() {
            info!("Interrupted by signal {} before start", signal);
            return Outcome::interrupted();
        }

        match self.execute(&prepared, relay, args).await {
            Ok(status) => Outcome::exited(exit_code(status)),
            Err(e) => Outcome::failed(e),
        }
    }

    /// Setup phase: resolve the version, lay out directories, fetch and install.
    async fn prepare(
        &self,
        platform: RuntimePlatform,
        artifact: &mut Option<PathBuf>,
    ) -> Result<Prepared> {
        let client = build_client()?;

        let version = VersionResolver::new(client.clone(), &self.config.metadata_url)
            .resolve(self.config.version.as_deref())
            .await?;
        let target = RuntimeTarget::new(version, platform);

        let layout = CacheLayout::compute(&self.config, &target)?;

        let executable = match self.fetcher(client).fetch(&target, &layout, artifact).await? {
            Fetched::Installed(executable) => executable,
            Fetched::Downloaded(archive) => {
                let bin_dir = layout.bin_dir();
                tokio::task::spawn_blocking(move || {
                    Installer::new(platform).install(&archive, &bin_dir)
                })
                .await
                .map_err(|e| {
                    LauncherError::io("install into", &layout.bin_dir(), std::io::Error::other(e))
                })??
            }
        };

        Ok(Prepared { executable, layout })
    }

    fn fetcher(&self, client: Client) -> ArtifactFetcher {
        ArtifactFetcher::new(
            Downloader::new(client, self.config.show_progress),
            &self.config.release_url,
        )
    }

    /// Run the child to completion, relaying signals while it is alive.
    async fn execute(
        &self,
        prepared: &Prepared,
        relay: &SignalRelay,
        args: Vec<OsString>,
    ) -> Result<ExitStatus> {
        let path = prepared.executable.display().to_string();
        debug!("Starting {} with {} argument(s)", path, args.len());

        let mut child = Command::new(&prepared.executable)
            .args(args)
            .env(DENO_DIR_ENV, &prepared.layout.install_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| LauncherError::Spawn {
                path: path.clone(),
                source: e,
            })?;

        if let Some(pid) = child.id() {
            relay.running(pid);
        }

        let status = child.wait().await;
        relay.done();

        status.map_err(|e| LauncherError::Wait { path, source: e })
    }
}

/// The child's exit code, or `128 + n` when it was terminated by signal `n`
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    FAILURE_EXIT_CODE
}
