//! Shell completions generation.

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use super::Cli;

/// Print completions for `shell` to stdout.
pub fn run(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "lanshare", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_bash() {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        generate(Shell::Bash, &mut cmd, "lanshare", &mut buf);

        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("lanshare"));
        assert!(script.contains("receive"));
    }
}
