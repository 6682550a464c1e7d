//! Names, paths, and environment variables shared across the pipeline.

/// Default location the driver archives are downloaded from.
pub const DEFAULT_BASE_URL: &str = "https://static.replay.io/downloads";

/// Stem shared by the archive, payload, and descriptor file names.
pub const ARTIFACT_STEM: &str = "recordreplay";

/// Length of the abbreviated revision hash embedded in build ids.
pub const SHORT_HASH_LEN: usize = 12;

/// Revision of the source tree the host half of the build id is taken from.
pub const HOST_REVISION: &str = "HEAD";

/// Generated source file, relative to the source root.
pub const EMBEDDED_SOURCE_PATH: &str = "src/node_record_replay_driver.cc";

/// Environment variable selecting a specific driver build instead of the latest.
pub const ENV_DRIVER_REVISION: &str = "DRIVER_REVISION";

/// Environment variable forcing the configure step before building.
pub const ENV_CONFIGURE_NODE: &str = "CONFIGURE_NODE";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const ENV_BASE_URL: &str = "DRIVERSTAMP_BASE_URL";

/// Environment variable overriding the build parallelism.
pub const ENV_JOBS: &str = "DRIVERSTAMP_JOBS";

/// Set on the build backend so the freshly built runtime does not record itself.
pub const ENV_DONT_RECORD: &str = "RECORD_REPLAY_DONT_RECORD";

/// Prefix of the scratch directory the driver archive is unpacked in.
pub const SCRATCH_PREFIX: &str = ".driverstamp-";
