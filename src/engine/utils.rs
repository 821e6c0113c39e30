use crate::error::{TabqlError, TabqlResult};

/// Maximum allowed regex pattern length to prevent DoS from generated specs
const MAX_REGEX_PATTERN_LEN: usize = 1024;

/// Maximum regex compiled size (1MB) to prevent memory exhaustion
const MAX_REGEX_SIZE: usize = 1 << 20;

/// Create a regex with safety limits. The regex crate is ReDoS-resistant by
/// construction, but pattern size and compiled size are still capped so a
/// machine-generated spec cannot exhaust memory.
pub fn safe_regex(pattern: &str, case_insensitive: bool) -> TabqlResult<regex::Regex> {
    if pattern.len() > MAX_REGEX_PATTERN_LEN {
        return Err(TabqlError::ExecutionError(format!(
            "Regex pattern too long: {} bytes (max {})",
            pattern.len(),
            MAX_REGEX_PATTERN_LEN
        )));
    }

    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(MAX_REGEX_SIZE)
        .build()
        .map_err(|e| TabqlError::ExecutionError(format!("Invalid regex pattern: {}", e)))
}

/// Convert f64 to serde_json::Number, returning 0 for NaN/Infinity instead of panicking
pub fn number_from_f64(f: f64) -> serde_json::Number {
    if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
        return serde_json::Number::from(f as i64);
    }
    serde_json::Number::from_f64(f).unwrap_or_else(|| serde_json::Number::from(0))
}
