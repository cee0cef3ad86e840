//! System-wide constants and default paths.

/// Search path assumed inside a container root filesystem when the
/// descriptor does not override `PATH`. Processes run as root.
pub const DEFAULT_ROOT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Host directories bind-mounted read-only into every root filesystem.
pub const SYSTEM_DIRS: [&str; 3] = ["/proc", "/dev", "/sys"];

/// Host files bind-mounted read-only into every root filesystem.
pub const SYSTEM_FILES: [&str; 2] = ["/etc/resolv.conf", "/etc/hosts"];

/// Permission bits for directories created as mount targets.
pub const MOUNT_DIR_MODE: u32 = 0o755;

/// Permission bits for empty files created as mount targets.
pub const MOUNT_FILE_MODE: u32 = 0o644;

/// Any of these bits marks a file as executable.
pub const EXECUTABLE_BITS: u32 = 0o111;

/// The only environment variable this subsystem interprets.
pub const PATH_VAR: &str = "PATH";

/// Working directory used inside a new root when none is requested.
pub const ROOT_DIR: &str = "/";

/// Command name of the CLI binary.
pub const APP_NAME: &str = "hideaway";
