//! Transform invocation: run ffmpeg with a crop/scale filter chain.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use poiframe_common::error::{PoiframeError, PoiframeResult};

/// Audio handling for a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Drop audio (`-an`).
    Drop,
    /// Stream-copy audio (`-c:a copy`).
    Copy,
}

/// Video rate control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateControl {
    /// Constant rate factor with an encoder preset.
    Crf { crf: u8, preset: String },
    /// Target bitrate (e.g. `20M`).
    Bitrate(String),
}

/// One transform: everything the invoker needs to produce an output file.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Output frame rate. `None` keeps the source rate.
    pub frame_rate: Option<f64>,
    /// Encoder or codec name. `None`/empty selects the default encoder.
    pub codec: Option<String>,
    /// The `-vf` filter chain.
    pub filter: String,
    /// Input seek offset (seconds).
    pub seek_secs: Option<f64>,
    /// Maximum output duration (seconds).
    pub max_duration_secs: Option<f64>,
    pub audio: AudioMode,
    pub rate_control: RateControl,
}

impl TransformRequest {
    /// The ffmpeg argument list (without the executable).
    pub fn ffmpeg_args(&self, default_codec: &str) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string(), "-y".to_string()];

        if let Some(seek) = self.seek_secs {
            args.push("-ss".to_string());
            args.push(seek.to_string());
        }

        args.push("-i".to_string());
        args.push(self.input.display().to_string());

        if let Some(duration) = self.max_duration_secs {
            args.push("-t".to_string());
            args.push(duration.to_string());
        }

        if let Some(fps) = self.frame_rate.filter(|fps| *fps > 0.0) {
            args.push("-r".to_string());
            args.push(fps.to_string());
        }

        args.push("-vf".to_string());
        args.push(self.filter.clone());

        if self.audio == AudioMode::Drop {
            args.push("-an".to_string());
        }

        args.push("-c:v".to_string());
        args.push(choose_codec(self.codec.as_deref(), default_codec));

        match &self.rate_control {
            RateControl::Crf { crf, preset } => {
                args.push("-crf".to_string());
                args.push(crf.to_string());
                args.push("-preset".to_string());
                args.push(preset.clone());
            }
            RateControl::Bitrate(bitrate) => {
                args.push("-b:v".to_string());
                args.push(bitrate.clone());
            }
        }

        if self.audio == AudioMode::Copy {
            args.push("-c:a".to_string());
            args.push("copy".to_string());
        }

        args.push(self.output.display().to_string());
        args
    }
}

/// Map a stored codec name to an encoder ffmpeg can write with.
///
/// Unset or empty selects `default_codec`; decoder names with a well-known
/// software encoder are translated.
pub fn choose_codec(codec: Option<&str>, default_codec: &str) -> String {
    match codec.map(str::trim).filter(|c| !c.is_empty()) {
        None => default_codec.to_string(),
        Some(codec) => match codec.to_ascii_lowercase().as_str() {
            "h264" => "libx264".to_string(),
            "hevc" | "h265" => "libx265".to_string(),
            _ => codec.to_string(),
        },
    }
}

/// Something that executes transforms.
pub trait TransformInvoker {
    /// Produce `request.output`. An error leaves no guarantee about the file.
    fn invoke(&mut self, request: &TransformRequest) -> PoiframeResult<()>;

    /// Check if this invoker can run on the system.
    fn is_available(&self) -> bool;

    /// Invoker name for logging.
    fn name(&self) -> &str;
}

/// Invoker backed by the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegInvoker {
    binary: String,
    default_codec: String,
    dry_run: bool,
    recorded: Vec<Vec<String>>,
}

impl FfmpegInvoker {
    pub fn new(binary: impl Into<String>, default_codec: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            default_codec: default_codec.into(),
            dry_run: false,
            recorded: vec![],
        }
    }

    /// Print and record invocations instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Full command lines (executable first) seen in dry-run mode.
    pub fn recorded(&self) -> &[Vec<String>] {
        &self.recorded
    }

    fn command_line(&self, request: &TransformRequest) -> Vec<String> {
        let mut line = vec![self.binary.clone()];
        line.extend(request.ffmpeg_args(&self.default_codec));
        line
    }
}

impl Default for FfmpegInvoker {
    fn default() -> Self {
        Self::new("ffmpeg", "libx264")
    }
}

impl TransformInvoker for FfmpegInvoker {
    fn invoke(&mut self, request: &TransformRequest) -> PoiframeResult<()> {
        let line = self.command_line(request);

        if self.dry_run {
            println!("DRY RUN: {}", display_command(&line));
            self.recorded.push(line);
            return Ok(());
        }

        tracing::debug!(args = ?line, "Running ffmpeg");
        let started = std::time::Instant::now();
        let mut child = Command::new(&line[0])
            .args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PoiframeError::invoker(format!("Failed to start {}: {e}", self.binary)))?;

        tracing::info!(
            pid = child.id(),
            output = %request.output.display(),
            width = request.width,
            height = request.height,
            "ffmpeg process started"
        );

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PoiframeError::invoker("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = std::io::BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let status = child
            .wait()
            .map_err(|e| PoiframeError::invoker(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(PoiframeError::invoker(format!(
                "ffmpeg failed (status {}): {}",
                status,
                stderr_tail(&stderr_output, 20)
            )));
        }

        tracing::info!(
            output = %request.output.display(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.dry_run || command_exists(&self.binary)
    }

    fn name(&self) -> &str {
        if self.dry_run {
            "ffmpeg (dry run)"
        } else {
            "ffmpeg"
        }
    }
}

/// Whether an executable is resolvable on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {} >/dev/null 2>&1", shell_quote(binary)))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Render a command line so it can be pasted into a POSIX shell.
pub fn display_command(line: &[String]) -> String {
    line.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.trim().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
