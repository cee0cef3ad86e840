//! One container's setup and launch entry point.

use std::fmt;
use std::path::PathBuf;

use hideaway_common::config::ShimConfig;
use hideaway_common::error::Result;
use hideaway_common::types::{ContainerDescriptor, ProcessSpec};

use crate::capability::{HostCapabilities, NativeHost, Strategy, select_strategy};
use crate::command::{self, HostEnv, Invocation};
use crate::filesystem::{self, LinkPlan, MountJournal, MountPlan, Mounter};

/// What setup would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupPlan {
    /// Bind mounts for a privileged container.
    Mounts(MountPlan),
    /// Symlinks for an unprivileged container.
    Links(LinkPlan),
}

impl fmt::Display for SetupPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mounts(plan) => write!(f, "{plan}"),
            Self::Links(plan) => write!(f, "{plan}"),
        }
    }
}

/// A container descriptor bound to a host, ready for setup and launches.
///
/// The descriptor is only ever borrowed; setup and launch consult the same
/// strategy gate so they always agree.
#[derive(Debug, Clone)]
pub struct Shim<H = NativeHost> {
    descriptor: ContainerDescriptor,
    host: H,
    config: ShimConfig,
    host_env: HostEnv,
}

impl Shim<NativeHost> {
    /// Creates a shim for the running host and its current environment.
    #[must_use]
    pub fn new(descriptor: ContainerDescriptor) -> Self {
        Self::with_host(descriptor, NativeHost)
    }
}

impl<H> Shim<H>
where
    H: HostCapabilities + Mounter,
{
    /// Creates a shim for an explicit host implementation.
    #[must_use]
    pub fn with_host(descriptor: ContainerDescriptor, host: H) -> Self {
        Self {
            descriptor,
            host,
            config: ShimConfig::default(),
            host_env: HostEnv::capture(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: ShimConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the captured host environment.
    #[must_use]
    pub fn host_env(mut self, host_env: HostEnv) -> Self {
        self.host_env = host_env;
        self
    }

    /// Returns the container descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ContainerDescriptor {
        &self.descriptor
    }

    /// Returns the host implementation.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Returns the strategy both setup and launch will use.
    ///
    /// # Errors
    ///
    /// Returns an error if privilege is requested but unsupported.
    pub fn strategy(&self) -> Result<Strategy> {
        select_strategy(&self.descriptor, &self.host)
    }

    /// Computes what setup would do.
    ///
    /// # Errors
    ///
    /// Returns the same planning errors setup would.
    pub fn plan(&self) -> Result<SetupPlan> {
        Ok(match self.strategy()? {
            Strategy::Privileged => {
                SetupPlan::Mounts(MountPlan::privileged(&self.descriptor, &self.config)?)
            }
            Strategy::Unprivileged => {
                SetupPlan::Links(LinkPlan::unprivileged(&self.descriptor, &self.config)?)
            }
        })
    }

    /// Prepares the filesystem view once, discarding the mount journal.
    ///
    /// # Errors
    ///
    /// Returns the first failure; see [`filesystem::setup`].
    pub fn setup(&self) -> Result<Strategy> {
        let mut journal = MountJournal::new();
        self.setup_with_journal(&mut journal)
    }

    /// Prepares the filesystem view once, recording every completed mount.
    ///
    /// # Errors
    ///
    /// Returns the first failure; see [`filesystem::setup`].
    pub fn setup_with_journal(&self, journal: &mut MountJournal) -> Result<Strategy> {
        filesystem::setup(&self.descriptor, &self.host, &self.config, journal)
    }

    /// Builds the invocation for one process.
    ///
    /// # Errors
    ///
    /// See [`command::build_command`].
    pub fn command(&self, spec: &ProcessSpec) -> Result<Invocation> {
        command::build_command(
            &self.descriptor,
            spec,
            &self.host,
            &self.host_env,
            &self.config,
        )
    }

    /// Resolves a bare program name as a launch would, returning the host path.
    ///
    /// # Errors
    ///
    /// Returns [`hideaway_common::error::HideawayError::ExecutableNotFound`].
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        command::resolve(&self.descriptor, name, &self.host_env, &self.config)
    }
}
