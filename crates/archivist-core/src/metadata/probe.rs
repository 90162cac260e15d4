use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Result of running an external metadata tool against a file.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The tool is not installed. Not a problem with the file.
    Unavailable,
    /// The tool ran but could not read the file.
    Failed(String),
    Output(Value),
}

/// Run `program args... path` and parse its stdout as JSON.
pub fn run_json_tool(program: &str, args: &[&str], path: &Path) -> ProbeOutcome {
    if program.is_empty() {
        return ProbeOutcome::Unavailable;
    }

    let output = match Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
    {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, skipping probe of {}", program, path.display());
            return ProbeOutcome::Unavailable;
        }
        Err(e) => return ProbeOutcome::Failed(format!("{program} could not start: {e}")),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return ProbeOutcome::Failed(format!("{program} failed: {}", stderr.trim()));
    }

    match serde_json::from_slice(&output.stdout) {
        Ok(value) => ProbeOutcome::Output(value),
        Err(e) => ProbeOutcome::Failed(format!("{program} returned invalid JSON: {e}")),
    }
}

/// String field, ignoring empty values.
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

/// Numeric field that tools sometimes emit as a string.
pub fn f64_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn u32_field(value: &Value, key: &str) -> Option<u32> {
    f64_field(value, key)
        .filter(|v| *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_tool_is_unavailable() {
        let outcome = run_json_tool(
            "archivist-definitely-not-installed",
            &["-json"],
            Path::new("/nonexistent"),
        );
        assert!(matches!(outcome, ProbeOutcome::Unavailable));
        assert!(matches!(
            run_json_tool("", &[], Path::new("/nonexistent")),
            ProbeOutcome::Unavailable
        ));
    }

    #[test]
    fn test_field_helpers() {
        let v = json!({"a": " text ", "b": "", "c": 12, "d": "29.97", "e": -1});
        assert_eq!(str_field(&v, "a"), Some("text".to_string()));
        assert_eq!(str_field(&v, "b"), None);
        assert_eq!(str_field(&v, "c"), Some("12".to_string()));
        assert_eq!(f64_field(&v, "d"), Some(29.97));
        assert_eq!(u32_field(&v, "c"), Some(12));
        assert_eq!(u32_field(&v, "e"), None);
        assert_eq!(u32_field(&v, "missing"), None);
    }
}
