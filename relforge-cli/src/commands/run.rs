//! `relforge run <action>` — run a named shell action from the main config.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Args;

use relforge_core::config::{self, expand_tilde};

/// Arguments for `relforge run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Action name from the `actions:` table in `main.yaml`.
    pub name: String,

    /// Extra arguments appended to the action's command line.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let main = config::load_main_at(&home)
            .context("failed to load main config — run `relforge init` first")?;

        let Some(action) = main.actions.get(&self.name) else {
            if main.actions.is_empty() {
                bail!("no actions configured — add an `actions:` table to main.yaml");
            }
            let known: Vec<&str> = main.actions.keys().map(String::as_str).collect();
            bail!(
                "unknown action '{}'; configured actions: {}",
                self.name,
                known.join(", ")
            );
        };

        let mut line = action.cmd.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&line);
        if let Some(cwd) = &action.cwd {
            cmd.current_dir(expand_tilde(cwd, &home));
        }
        for (key, value) in &action.env {
            cmd.env(key, value);
        }

        let status = cmd
            .status()
            .with_context(|| format!("failed to spawn action '{}'", self.name))?;
        if !status.success() {
            bail!("action '{}' exited with {status}", self.name);
        }
        Ok(())
    }
}

/// Quote one argument for interpolation into an `sh -c` line.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+".contains(c));
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_args_pass_through() {
        assert_eq!(shell_quote("release.v0.0.1"), "release.v0.0.1");
        assert_eq!(shell_quote("--flag=value"), "--flag=value");
    }

    #[test]
    fn spaces_and_metacharacters_get_quoted() {
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("a;b"), "'a;b'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn single_quotes_survive() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
