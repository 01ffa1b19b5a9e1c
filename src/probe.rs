/// Video metadata probing via `ffprobe`
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Reads media duration from a URL or path
#[async_trait]
pub trait VideoProber: Send + Sync {
    /// Duration in whole milliseconds
    async fn duration_ms(&self, source: &str) -> ApiResult<i64>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    /// Seconds as a decimal string
    duration: Option<String>,
}

/// Parse `ffprobe -show_format -print_format json` output into milliseconds
fn parse_duration_ms(output: &[u8]) -> ApiResult<i64> {
    let parsed: ProbeOutput = serde_json::from_slice(output)
        .map_err(|e| ApiError::Upstream(format!("Unreadable ffprobe output: {}", e)))?;

    let seconds: f64 = parsed
        .format
        .duration
        .as_deref()
        .ok_or_else(|| ApiError::Upstream("ffprobe reported no duration".to_string()))?
        .parse()
        .map_err(|e| ApiError::Upstream(format!("Invalid ffprobe duration: {}", e)))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ApiError::Upstream(format!(
            "Invalid ffprobe duration: {}",
            seconds
        )));
    }

    Ok((seconds * 1000.0) as i64)
}

/// `ffprobe` subprocess prober
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: String,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VideoProber for FfprobeProber {
    async fn duration_ms(&self, source: &str) -> ApiResult<i64> {
        debug!("Probing {}", source);

        let child = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ApiError::Upstream(format!("Failed to start {}: {}", self.binary, e)))?;

        // Dropping the future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ApiError::Upstream(format!("ffprobe timed out on {}", source)))?
            .map_err(|e| ApiError::Upstream(format!("ffprobe failed on {}: {}", source, e)))?;

        if !output.status.success() {
            return Err(ApiError::Upstream(format!(
                "ffprobe exited with {} on {}",
                output.status, source
            )));
        }

        parse_duration_ms(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let output = br#"{"format": {"filename": "clip.mp4", "duration": "12.345678"}}"#;
        assert_eq!(parse_duration_ms(output).unwrap(), 12_345);
    }

    #[test]
    fn test_parse_missing_duration() {
        let output = br#"{"format": {"filename": "clip.mp4"}}"#;
        assert!(matches!(parse_duration_ms(output), Err(ApiError::Upstream(_))));
        assert!(parse_duration_ms(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_upstream_error() {
        let prober = FfprobeProber::new("/nonexistent/ffprobe", Duration::from_secs(1));
        let err = prober.duration_ms("clip.mp4").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
