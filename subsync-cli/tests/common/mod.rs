//! Runs the `subsync` binary in an isolated working directory.

use std::path::Path;

/// The `subsync` binary, isolated from any user or working-directory config.
pub fn subsync(cwd: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("subsync").expect("subsync binary");
    cmd.current_dir(cwd)
        .env("HOME", cwd)
        .env("XDG_CONFIG_HOME", cwd.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}
