//! Shell completion generation for chatflowctl
//!
//! - chatflowctl completion bash  > /etc/bash_completion.d/chatflowctl
//! - chatflowctl completion zsh   > ~/.zsh/completion/_chatflowctl
//! - chatflowctl completion fish  > ~/.config/fish/completions/chatflowctl.fish

use anyhow::Result;
use clap::{CommandFactory, ValueEnum};
use clap_complete::{generate, Shell as ClapShell};
use std::io;

use crate::cli::Cli;

/// Supported shells for completion
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Elvish,
}

impl From<Shell> for ClapShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::Powershell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }
}

/// Generate shell completion script
pub fn execute(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(ClapShell::from(shell), &mut cmd, name, &mut io::stdout());
    Ok(())
}
