//! Fixed on-device paths and values
//!
//! The store and boot script locations are what the root solution's
//! `service.d` mechanism expects; they can be overridden in the `[paths]`
//! section but the defaults match the installed scripts of earlier runs.

pub const PATCH_STORE_DIR: &str = "/data/adb/Vanced/";
pub const SERVICE_SCRIPT_PATH: &str = "/data/adb/service.d/vanced.sh";

/// Name of the relocated binary inside the store
pub const PATCHED_BASE_NAME: &str = "base.apk";

pub const DEFAULT_TARGET_PACKAGE: &str = "com.google.android.youtube";

/// SELinux context the platform requires for installed application binaries
pub const APK_DATA_FILE_CONTEXT: &str = "u:object_r:apk_data_file:s0";

pub const SESSION_CHUNK_SIZE: usize = 64 * 1024;

/// Entry name used for single-apk sessions
pub const SINGLE_APK_ENTRY_NAME: &str = "install";
