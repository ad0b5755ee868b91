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

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map a klog-style verbosity (0-9) or a level name to a tracing directive.
pub fn level_directive(level: &str) -> String {
    match level.trim().parse::<u8>() {
        Ok(0..=1) => "warn".to_string(),
        Ok(2..=3) => "info".to_string(),
        Ok(4..=5) => "debug".to_string(),
        Ok(_) => "trace".to_string(),
        Err(_) => level.trim().to_lowercase(),
    }
}

/// Install the global subscriber.
///
/// `astra_LOG_LEVEL` wins over the hidden `-v` flag, and both fall back to `warn`.
/// Output goes to stderr so that `-o json` keeps stdout clean.
pub fn init_logging(env_level: Option<&str>, verbosity: Option<u8>) {
    let directive = match (env_level, verbosity) {
        (Some(level), _) if !level.trim().is_empty() => level_directive(level),
        (_, Some(v)) => level_directive(&v.to_string()),
        _ => "warn".to_string(),
    };

    let filter = EnvFilter::try_new(format!("astra={0},{0}", directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests driving `run` twice) is not an error worth surfacing.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("0"), "warn");
        assert_eq!(level_directive("3"), "info");
        assert_eq!(level_directive("4"), "debug");
        assert_eq!(level_directive("9"), "trace");
        assert_eq!(level_directive("DEBUG"), "debug");
    }
}
