use crate::error::LaunchError;
use crate::types::{ContentArgStyle, InstallTarget};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentArg {
    pub path: String,
    pub quoted: bool,
}

impl ContentArg {
    /// The argument as the emulator's own command-line parser should see it.
    pub fn render(&self) -> String {
        if self.quoted && needs_quotes(&self.path) {
            format!("\"{}\"", self.path)
        } else {
            self.path.clone()
        }
    }

    /// The argument exactly as the child receives it. Only Windows hands the
    /// quoted form through; elsewhere argv carries the path as one element.
    pub fn as_passed(&self) -> String {
        if cfg!(windows) {
            self.render()
        } else {
            self.path.clone()
        }
    }
}

fn needs_quotes(s: &str) -> bool {
    !(s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        && (s.is_empty() || s.chars().any(|c| c.is_whitespace()))
}

/// Program, fixed flags and the optional content argument, kept apart so
/// nothing is ever joined into a shell command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub flags: Vec<String>,
    pub content: Option<ContentArg>,
}

impl LaunchCommand {
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.flags.len() + 2);
        argv.push(self.program.to_string_lossy().to_string());
        argv.extend(self.flags.iter().cloned());
        if let Some(content) = &self.content {
            argv.push(content.as_passed());
        }
        argv
    }
}

pub fn compose(target: &InstallTarget, executable: &Path, content: Option<&str>) -> LaunchCommand {
    let content = match (target.content_arg, content) {
        (ContentArgStyle::None, _) | (_, None) => None,
        (ContentArgStyle::RawPath, Some(path)) => Some(ContentArg {
            path: path.to_string(),
            quoted: false,
        }),
        (ContentArgStyle::QuotedPath, Some(path)) => Some(ContentArg {
            path: path.to_string(),
            quoted: true,
        }),
    };
    LaunchCommand {
        program: executable.to_path_buf(),
        flags: target.launch_flags.clone(),
        content,
    }
}

pub trait ProcessRunner: Send + Sync {
    /// Runs the command to completion. `Ok(None)` means the child ended
    /// without an exit code.
    fn run(&self, command: &LaunchCommand) -> io::Result<Option<i32>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &LaunchCommand) -> io::Result<Option<i32>> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.flags);
        if let Some(content) = &command.content {
            push_content(&mut cmd, content);
        }
        if let Some(dir) = command.program.parent() {
            cmd.current_dir(dir);
        }
        let status = cmd.spawn()?.wait()?;
        Ok(status.code())
    }
}

#[cfg(windows)]
fn push_content(cmd: &mut Command, content: &ContentArg) {
    use std::os::windows::process::CommandExt;
    if content.quoted {
        cmd.raw_arg(content.render());
    } else {
        cmd.arg(&content.path);
    }
}

// argv needs no quoting here; the path always travels as one argument.
#[cfg(not(windows))]
fn push_content(cmd: &mut Command, content: &ContentArg) {
    cmd.arg(&content.path);
}

/// Runs the emulator and blocks until it exits. No retries.
pub fn launch(
    runner: &dyn ProcessRunner,
    target: &InstallTarget,
    executable: &Path,
    content: Option<&str>,
) -> Result<(), LaunchError> {
    let command = compose(target, executable, content);
    let program = command.program.display().to_string();
    tracing::info!("[{}] Launching {:?}", target.name, command.argv());

    match runner.run(&command) {
        Ok(Some(0)) => {
            tracing::info!("[{}] Finished running {}", target.name, program);
            Ok(())
        }
        Ok(code) => {
            tracing::error!("[{}] Failed running {} ({:?})", target.name, program, code);
            Err(LaunchError::NonZeroExit {
                target: target.name.clone(),
                program,
                code,
            })
        }
        Err(e) => {
            tracing::error!("[{}] Could not start {}: {}", target.name, program, e);
            Err(LaunchError::SpawnFailed {
                target: target.name.clone(),
                program,
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpdatePolicy;
    use std::sync::Mutex;

    fn target(style: ContentArgStyle) -> InstallTarget {
        InstallTarget {
            name: "rpcs3".to_string(),
            root_dir: PathBuf::from("/emu"),
            binary_pattern: "rpcs3*".to_string(),
            launch_flags: vec!["--no-gui".to_string()],
            content_arg: style,
            archive_name: "rpcs3.7z".to_string(),
            extra_dirs: vec![],
            update_policy: UpdatePolicy::Always,
        }
    }

    struct Recorder {
        result: fn() -> io::Result<Option<i32>>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ProcessRunner for Recorder {
        fn run(&self, command: &LaunchCommand) -> io::Result<Option<i32>> {
            self.seen.lock().unwrap().push(command.argv());
            (self.result)()
        }
    }

    #[test]
    fn quoted_path_with_spaces() {
        let cmd = compose(
            &target(ContentArgStyle::QuotedPath),
            Path::new("/emu/rpcs3"),
            Some("/games/My Game/EBOOT.BIN"),
        );
        let content = cmd.content.as_ref().unwrap();
        assert_eq!(content.render(), "\"/games/My Game/EBOOT.BIN\"");

        let expected = if cfg!(windows) {
            "\"/games/My Game/EBOOT.BIN\""
        } else {
            "/games/My Game/EBOOT.BIN"
        };
        assert_eq!(cmd.argv(), vec!["/emu/rpcs3", "--no-gui", expected]);
    }

    #[test]
    fn quoting_only_when_required() {
        let cmd = compose(
            &target(ContentArgStyle::QuotedPath),
            Path::new("/emu/rpcs3"),
            Some("/games/EBOOT.BIN"),
        );
        assert_eq!(cmd.argv().last().unwrap(), "/games/EBOOT.BIN");
    }

    #[test]
    fn raw_and_none_styles() {
        let raw = compose(&target(ContentArgStyle::RawPath), Path::new("/e"), Some("a b"));
        assert_eq!(raw.argv(), vec!["/e", "--no-gui", "a b"]);

        let none = compose(&target(ContentArgStyle::None), Path::new("/e"), Some("a b"));
        assert_eq!(none.argv(), vec!["/e", "--no-gui"]);
    }

    #[test]
    fn no_content_launches_flags_only() {
        let cmd = compose(&target(ContentArgStyle::QuotedPath), Path::new("/e"), None);
        assert_eq!(cmd.argv(), vec!["/e", "--no-gui"]);
    }

    #[test]
    fn exit_status_mapping() {
        let ok = Recorder {
            result: || Ok(Some(0)),
            seen: Mutex::new(vec![]),
        };
        assert!(launch(&ok, &target(ContentArgStyle::RawPath), Path::new("/e"), None).is_ok());
        assert_eq!(ok.seen.lock().unwrap().len(), 1);

        let failed = Recorder {
            result: || Ok(Some(3)),
            seen: Mutex::new(vec![]),
        };
        let err = launch(&failed, &target(ContentArgStyle::RawPath), Path::new("/e"), None)
            .unwrap_err();
        assert!(matches!(err, LaunchError::NonZeroExit { code: Some(3), .. }));

        let missing = Recorder {
            result: || Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
            seen: Mutex::new(vec![]),
        };
        let err = launch(&missing, &target(ContentArgStyle::RawPath), Path::new("/e"), None)
            .unwrap_err();
        assert!(matches!(err, LaunchError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_codes() {
        let mut t = target(ContentArgStyle::None);
        t.launch_flags = vec!["-c".to_string(), "exit 7".to_string()];
        let err = launch(&SystemRunner, &t, Path::new("/bin/sh"), None).unwrap_err();
        assert!(matches!(err, LaunchError::NonZeroExit { code: Some(7), .. }));

        t.launch_flags = vec!["-c".to_string(), "exit 0".to_string()];
        assert!(launch(&SystemRunner, &t, Path::new("/bin/sh"), None).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_passes_what_argv_shows() {
        let mut t = target(ContentArgStyle::QuotedPath);
        t.launch_flags = vec![
            "-c".to_string(),
            "[ \"$0\" = '/games/My Game.iso' ] || exit 9".to_string(),
        ];
        let cmd = compose(&t, Path::new("/bin/sh"), Some("/games/My Game.iso"));
        assert_eq!(cmd.argv().last().unwrap(), "/games/My Game.iso");
        assert_eq!(SystemRunner.run(&cmd).unwrap(), Some(0));
    }
}
