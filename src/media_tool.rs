//! External media tool (ffmpeg/ffprobe) invocation
//!
//! Every subprocess call is time-boxed. When the tool is not installed the
//! companion processor is disabled and nothing else is affected.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{
    EXTRACT_TIMEOUT, FRAME_CAPTURE_TIMEOUT, MAX_TOOL_TIMEOUT, STREAM_PROBE_TIMEOUT, TOOL_PROBE_TIMEOUT,
};
use crate::error::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Operations the companion processor needs from a media tool
pub trait MediaToolkit: Send + Sync {
    /// Absolute indices of the subtitle streams in a container
    fn subtitle_stream_indices(&self, video: &Path) -> Result<Vec<u32>, ToolError>;

    /// Extract one stream into `output`
    fn extract_stream(&self, video: &Path, index: u32, output: &Path) -> Result<(), ToolError>;

    /// Capture one frame at `offset_secs` into `output`
    fn capture_frame(&self, video: &Path, offset_secs: u32, output: &Path) -> Result<(), ToolError>;
}

/// ffmpeg/ffprobe found on the PATH
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTool {
    /// Locate both executables and confirm they answer a version probe
    pub fn detect() -> Result<Self, ToolError> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| ToolError::Unavailable("ffmpeg not found in PATH".into()))?;
        let ffprobe =
            which::which("ffprobe").map_err(|_| ToolError::Unavailable("ffprobe not found in PATH".into()))?;

        for program in [&ffmpeg, &ffprobe] {
            let output = run_with_timeout(Command::new(program).arg("-version"), TOOL_PROBE_TIMEOUT)?;
            if !output.status.success() {
                return Err(ToolError::Unavailable(format!("{} is not executable", program.display())));
            }
            let banner = String::from_utf8_lossy(&output.stdout);
            log::debug!("{}", banner.lines().next().unwrap_or_default());
        }

        log::info!("Media tool available: {} / {}", ffmpeg.display(), ffprobe.display());
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Detect the tool, logging why it is unavailable
    pub fn detect_optional() -> Option<Self> {
        match Self::detect() {
            Ok(tool) => Some(tool),
            Err(e) => {
                log::warn!("Companion processing disabled: {}", e);
                None
            }
        }
    }

    fn run_checked(&self, program: &Path, args: &[&OsStr], timeout: Duration) -> Result<Output, ToolError> {
        let mut command = Command::new(program);
        command.args(args);
        let output = run_with_timeout(&mut command, timeout)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed {
                program: program_name(program),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl MediaToolkit for FfmpegTool {
    fn subtitle_stream_indices(&self, video: &Path) -> Result<Vec<u32>, ToolError> {
        let output = self.run_checked(
            &self.ffprobe,
            &[
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-select_streams"),
                OsStr::new("s"),
                OsStr::new("-show_entries"),
                OsStr::new("stream=index"),
                OsStr::new("-of"),
                OsStr::new("csv=p=0"),
                video.as_os_str(),
            ],
            STREAM_PROBE_TIMEOUT,
        )?;
        Ok(parse_stream_indices(&String::from_utf8_lossy(&output.stdout)))
    }

    fn extract_stream(&self, video: &Path, index: u32, output: &Path) -> Result<(), ToolError> {
        let map = format!("0:{}", index);
        self.run_checked(
            &self.ffmpeg,
            &[
                OsStr::new("-y"),
                OsStr::new("-nostdin"),
                OsStr::new("-i"),
                video.as_os_str(),
                OsStr::new("-map"),
                OsStr::new(&map),
                output.as_os_str(),
            ],
            EXTRACT_TIMEOUT,
        )?;
        ensure_created(output)
    }

    fn capture_frame(&self, video: &Path, offset_secs: u32, output: &Path) -> Result<(), ToolError> {
        let offset = offset_secs.to_string();
        self.run_checked(
            &self.ffmpeg,
            &[
                OsStr::new("-y"),
                OsStr::new("-nostdin"),
                OsStr::new("-ss"),
                OsStr::new(&offset),
                OsStr::new("-i"),
                video.as_os_str(),
                OsStr::new("-frames:v"),
                OsStr::new("1"),
                OsStr::new("-q:v"),
                OsStr::new("2"),
                output.as_os_str(),
            ],
            FRAME_CAPTURE_TIMEOUT,
        )?;
        ensure_created(output)
    }
}

/// Parse ffprobe's `csv=p=0` index listing, skipping junk lines
pub fn parse_stream_indices(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().trim_end_matches(',').parse().ok())
        .collect()
}

fn ensure_created(output: &Path) -> Result<(), ToolError> {
    if output.is_file() {
        Ok(())
    } else {
        Err(ToolError::NoOutput(output.to_path_buf()))
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Run a command with piped output, killing it once `timeout` elapses
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output, ToolError> {
    let timeout = timeout.min(MAX_TOOL_TIMEOUT);
    let program = program_name(Path::new(command.get_program()));

    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(0x08000000); // CREATE_NO_WINDOW
    }

    let mut child = command.spawn()?;
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(Output {
                    status,
                    stdout: stdout_handle.join().unwrap_or_default(),
                    stderr: stderr_handle.join().unwrap_or_default(),
                });
            }
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                log::warn!("{} killed after {}s", program, timeout.as_secs());
                return Err(ToolError::TimedOut {
                    program,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(ToolError::Io(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indices_and_skips_noise() {
        assert_eq!(parse_stream_indices("2\n3,\n\nfoo\n 5 \n"), vec![2, 3, 5]);
        assert!(parse_stream_indices("").is_empty());
    }

    #[test]
    fn missing_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_created(&dir.path().join("none.srt")).unwrap_err();
        assert!(matches!(err, ToolError::NoOutput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn slow_commands_are_killed() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let err = run_with_timeout(&mut command, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn output_is_captured() {
        let mut command = Command::new("echo");
        command.arg("hello");
        let output = run_with_timeout(&mut command, Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
