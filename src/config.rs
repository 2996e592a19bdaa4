use std::env;
use std::path::PathBuf;

/// Overrides the data directory when `--data-dir` is not given.
pub const DATA_DIR_ENV: &str = "SONJU_HOME";
/// `env_logger` filter, e.g. `SONJU_LOG=debug`.
pub const LOG_ENV: &str = "SONJU_LOG";

const DATA_DIR_NAME: &str = ".sonju";

/// Resolves the data directory: the explicit flag, then `SONJU_HOME`, then
/// `~/.sonju`. Falls back to `./.sonju` if no home directory is found.
pub fn data_dir(flag: Option<PathBuf>) -> PathBuf {
    resolve_data_dir(flag, env::var_os(DATA_DIR_ENV).map(PathBuf::from), dirs::home_dir())
}

fn resolve_data_dir(flag: Option<PathBuf>, from_env: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    flag.or(from_env.filter(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| home.unwrap_or_else(|| PathBuf::from(".")).join(DATA_DIR_NAME))
}

/// Diagnostics go to stderr through `log`; warnings and errors by default.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV, "warn"))
        .format_timestamp(None)
        .init();
}
