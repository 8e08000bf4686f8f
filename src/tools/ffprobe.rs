//! Stream facts from ffprobe's JSON output.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;

use super::command::run_with_timeout;
use super::ToolError;
use crate::media::{codec_label, StreamInfo};

/// Reports technical facts about a file's first audio stream.
pub trait MediaProbe: Send + Sync {
    /// # Errors
    ///
    /// [`ToolError`] if the probe cannot run, times out or fails on the file.
    fn probe(&self, path: &Path) -> Result<StreamInfo, ToolError>;
}

/// `ffprobe -v quiet -print_format json -show_format -show_streams <path>`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
    timeout: Duration,
}

impl FfprobeProbe {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe", Duration::from_secs(10))
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<StreamInfo, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                message: format!(
                    "exited with {} for {}{}",
                    output.status,
                    path.display(),
                    if output.stderr.trim().is_empty() {
                        String::new()
                    } else {
                        format!(": {}", output.stderr.trim())
                    }
                ),
            });
        }
        parse_probe_json(&output.stdout).map_err(|message| ToolError::Parse {
            program: self.program.clone(),
            message,
        })
    }
}

/// Pull [`StreamInfo`] out of ffprobe JSON.
///
/// Uses the first audio stream. Numbers may arrive as strings or numbers;
/// anything missing or unparsable is left as `None`.
///
/// # Errors
///
/// A message if the text is not JSON at all.
pub fn parse_probe_json(text: &str) -> Result<StreamInfo, String> {
    let doc: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;

    let streams = doc.get("streams").and_then(Value::as_array);
    let stream = streams.and_then(|streams| {
        streams
            .iter()
            .find(|s| s.get("codec_type").and_then(Value::as_str) == Some("audio"))
            .or_else(|| streams.first())
    });
    let format = doc.get("format");

    let field = |key: &str| stream.and_then(|s| s.get(key));
    let bit_depth = number(field("bits_per_raw_sample"))
        .filter(|&b| b > 0)
        .or_else(|| number(field("bits_per_sample")).filter(|&b| b > 0));
    let bitrate = number(field("bit_rate")).or_else(|| number(format.and_then(|f| f.get("bit_rate"))));

    Ok(StreamInfo {
        codec: field("codec_name").and_then(Value::as_str).map(codec_label),
        sample_rate: number(field("sample_rate")).and_then(|n| u32::try_from(n).ok()),
        channels: number(field("channels")).and_then(|n| u32::try_from(n).ok()),
        bit_depth: bit_depth.and_then(|n| u32::try_from(n).ok()),
        bitrate,
    })
}

fn number(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
