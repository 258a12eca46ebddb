//! Shell completion generation (`completions` subcommand).

use clap::Command;
use clap_complete::{generate, Shell};
use std::io;

/// Write the completion script for `shell` to `writer`.
pub fn write_completions(shell: Shell, cmd: &mut Command, bin_name: &str, writer: &mut dyn io::Write) {
    generate(shell, cmd, bin_name, writer);
}
