// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Durations written as `1m30s`, `240s`, `500ms`.
//!
//! This is the notation used in the preference file and in
//! `PODMAN_CMD_INIT_TIMEOUT`, so values written by older releases keep parsing.

use crate::shared::error::{AstraError, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static FULL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\d+(?:\.\d+)?|\.\d+)(?:ns|us|µs|ms|s|m|h))+$").expect("valid duration pattern")
});
static PART_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?|\.\d+)(ns|us|µs|ms|s|m|h)").expect("valid duration pattern")
});

/// Parse a duration such as `1h2m3s` or `1.5s`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let value = input.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }
    if value.is_empty() || !FULL_PATTERN.is_match(value) {
        return Err(AstraError::config_error(format!(
            "invalid duration {:?}, expected a value like \"90s\" or \"1m30s\"",
            input
        )));
    }

    let mut nanos: f64 = 0.0;
    for caps in PART_PATTERN.captures_iter(value) {
        let amount: f64 = caps[1]
            .parse()
            .map_err(|_| AstraError::config_error(format!("invalid duration {:?}", input)))?;
        let unit = match &caps[2] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            _ => 3600.0 * 1e9,
        };
        nanos += amount * unit;
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Format a duration the way it is written in the preference file (`4m0s`, `1s`, `500ms`).
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    if duration < Duration::from_secs(1) {
        let nanos = duration.subsec_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}µs", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    let frac = duration.subsec_nanos();

    let secs = if frac == 0 {
        format!("{}s", seconds)
    } else {
        let text = format!("{}.{:09}", seconds, frac);
        format!("{}s", text.trim_end_matches('0'))
    };

    if hours > 0 {
        format!("{}h{}m{}", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}", minutes, secs)
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1s");
        assert_eq!(format_duration(Duration::from_secs(240)), "4m0s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(20)), "20ms");
    }
}
