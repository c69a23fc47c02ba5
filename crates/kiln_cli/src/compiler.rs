//! Compiles units by running the command configured in `kiln.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use kiln_build::{CancelToken, CompileError, Compiler};
use kiln_common::UnitId;
use kiln_graph::Unit;
use tracing::debug;

/// How often a running command is checked for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A [`Compiler`] that spawns one external process per unit.
///
/// Arguments may contain `{unit}`, `{profile}` and `{target}` placeholders.
/// The process runs in the project root with `KILN_UNIT`, `KILN_PROFILE`,
/// `KILN_FEATURES` and `KILN_TARGET` set, and inherits stdout and stderr.
pub struct CommandCompiler {
    root: PathBuf,
    commands: BTreeMap<UnitId, Vec<String>>,
    quiet: bool,
}

impl CommandCompiler {
    /// Creates a compiler running `commands` from `root`.
    pub fn new(root: &Path, commands: BTreeMap<UnitId, Vec<String>>, quiet: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            commands,
            quiet,
        }
    }

    /// Returns the command line for `unit` with placeholders substituted.
    pub fn command_line(&self, unit: &Unit) -> Option<Vec<String>> {
        let template = self.commands.get(&unit.id)?;
        Some(template.iter().map(|arg| expand(arg, unit)).collect())
    }
}

fn expand(arg: &str, unit: &Unit) -> String {
    arg.replace("{unit}", unit.id.as_str())
        .replace("{profile}", &unit.config.profile)
        .replace("{target}", &unit.config.target)
}

impl Compiler for CommandCompiler {
    fn compile(&self, unit: &Unit, cancel: &CancelToken) -> Result<(), CompileError> {
        let argv = self
            .command_line(unit)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| {
                CompileError::failed(format!(
                    "no compile command configured for unit '{}'",
                    unit.id
                ))
            })?;
        let command_text = argv.join(" ");

        if !self.quiet {
            eprintln!("{:>12} {} ({})", "Compiling", unit.id, unit.config.profile);
        }
        debug!(unit = %unit.id, command = %command_text, "spawning");

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&self.root)
            .env("KILN_UNIT", unit.id.as_str())
            .env("KILN_PROFILE", &unit.config.profile)
            .env("KILN_FEATURES", unit.config.feature_list())
            .env("KILN_TARGET", &unit.config.target)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| CompileError::failed(format!("cannot run `{command_text}`: {e}")))?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(CompileError::failed(format!(
                        "`{command_text}` exited with {status}"
                    )))
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(CompileError::failed(format!(
                        "cannot wait for `{command_text}`: {e}"
                    )))
                }
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CompileError::Cancelled);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ConfigDescriptor;
    use std::time::Instant;

    fn unit() -> Unit {
        let mut config = ConfigDescriptor::new("tc", "wasm32-unknown-unknown", "release");
        config.features.insert("std".into());
        config.features.insert("alloc".into());
        Unit::new("core", config)
    }

    fn compiler(dir: &Path, argv: &[&str]) -> CommandCompiler {
        let commands = BTreeMap::from([(
            UnitId::new("core"),
            argv.iter().map(|a| a.to_string()).collect(),
        )]);
        CommandCompiler::new(dir, commands, true)
    }

    #[test]
    fn placeholders_expand() {
        let c = compiler(Path::new("."), &["build", "{unit}", "--{profile}", "{target}/{unit}"]);
        assert_eq!(
            c.command_line(&unit()).unwrap(),
            vec!["build", "core", "--release", "wasm32-unknown-unknown/core"]
        );
    }

    #[test]
    fn missing_command_fails() {
        let c = CommandCompiler::new(Path::new("."), BTreeMap::new(), true);
        let err = c.compile(&unit(), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("no compile command"));
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_decides_success() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        assert!(compiler(dir.path(), &["true"]).compile(&unit(), &token).is_ok());
        let err = compiler(dir.path(), &["false"])
            .compile(&unit(), &token)
            .unwrap_err();
        assert!(matches!(err, CompileError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn environment_and_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let script = "printf '%s|%s|%s|%s' \"$KILN_UNIT\" \"$KILN_PROFILE\" \"$KILN_FEATURES\" \"$KILN_TARGET\" > out.txt";
        compiler(dir.path(), &["sh", "-c", script])
            .compile(&unit(), &CancelToken::new())
            .unwrap();
        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out, "core|release|alloc,std|wasm32-unknown-unknown");
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let start = Instant::now();
        let result = compiler(dir.path(), &["sleep", "10"]).compile(&unit(), &token);
        canceller.join().unwrap();

        assert_eq!(result, Err(CompileError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unknown_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = compiler(dir.path(), &["kiln-test-no-such-program"])
            .compile(&unit(), &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("cannot run"));
    }
}
