//! # hideaway-core
//!
//! Filesystem isolation for hosts where namespaces are unavailable.
//!
//! Two strategies prepare a container's view of the filesystem:
//! - **Privileged**: bind mounts into the working directory, then a
//!   filesystem-root change when the process is launched.
//! - **Unprivileged**: symbolic links standing in for bind mounts, with the
//!   process running against the host root.
//!
//! [`capability::select_strategy`] is the single gate both phases consult.
//! Nothing in this crate spawns processes; launching is left to whoever
//! consumes the [`command::Invocation`].

pub mod capability;
pub mod command;
pub mod filesystem;
pub mod path;
pub mod shim;

pub use capability::{HostCapabilities, NativeHost, StaticHost, Strategy};
pub use command::{HostEnv, Invocation};
pub use shim::Shim;
