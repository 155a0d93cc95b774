//! Environment constants and path utilities for taskview.
//!
//! This module centralizes endpoint paths, secret names, and configuration
//! file locations used throughout the crate, making them easier to maintain
//! and modify.

/// Main application directory name (hidden directory like .git, .vscode)
pub const TASKVIEW_DIR_NAME: &str = ".taskview";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Name under which the bearer token is stored in the secret store
pub const TOKEN_SECRET_NAME: &str = "taskview.bearer-token";

/// Remote service endpoint paths, relative to the configured base URL.
pub mod endpoints {
    /// Paginated task listing (`limit`, `after` query parameters)
    pub const TASKS: &str = "tasks";

    /// Entity lookup by id
    pub const ENTITIES: &str = "entities";

    /// Lineage graph for an entity (`upstreamDepth`, `downstreamDepth`)
    pub const LINEAGE: &str = "lineage";

    /// Full-text search (`q`, `index`, `from`, `size`)
    pub const SEARCH: &str = "search/query";

    /// Data-quality results for a test case (`startTs`, `endTs`)
    pub const TEST_CASE_RESULTS: &str = "dataQuality/testCases";

    /// Automation bot token lookup
    pub const BOTS: &str = "bots";

    /// Authenticated identity probe used to validate a token
    pub const WHOAMI: &str = "users/me";
}

/// Test-related constants
pub mod test {
    /// Default test directory path for temporary operations
    pub const DEFAULT_TEST_DIR: &str = "/tmp";
}

use std::path::{Path, PathBuf};

/// Build the main .taskview directory path from a base directory
pub fn taskview_dir_path(base: &Path) -> PathBuf {
    base.join(TASKVIEW_DIR_NAME)
}

/// Build the local config file path from a working directory
pub fn local_config_file_path(working_dir: &Path) -> PathBuf {
    taskview_dir_path(working_dir).join(CONFIG_FILE_NAME)
}

/// Build the user config file path from a home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    taskview_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the secrets directory path used by the file-backed secret store
pub fn secrets_dir_path(base: &Path) -> PathBuf {
    taskview_dir_path(base).join("secrets")
}
