//! driverstamp-lib: embed the record/replay driver into a runtime checkout
//!
//! A run fetches the prebuilt driver for the host platform, dates the
//! runtime checkout and the driver build, composes a build id from both,
//! compiles the driver bytes into a C++ source file inside the checkout,
//! and finally kicks off the runtime's own build.
//!
//! - `artifact`: download and unpack the driver archive
//! - `revision`: commit dates (UTC) and short hashes
//! - `build_id`: the `{platform}-node-{date}-{host}-{driver}` identifier
//! - `embed`: render the octal-escaped translation unit
//! - `backend`: configure/make invocation
//! - `pipeline`: the stages above, in order

pub mod artifact;
pub mod backend;
pub mod build_id;
pub mod config;
pub mod consts;
pub mod embed;
pub mod pipeline;
pub mod platform;
pub mod revision;
pub mod util;
