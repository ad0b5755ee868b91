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

//! Devfile variables passed on the command line (`--var`, `--var-file`).

use crate::shared::error::{AstraError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parse `KEY=VALUE` pairs. Later keys override earlier ones.
pub fn parse_key_value(entries: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for entry in entries {
        let parts: Vec<&str> = entry.splitn(2, '=').collect();
        if parts.len() != 2 {
            return Err(AstraError::validation(format!(
                "Invalid variable format: '{}'. Expected 'KEY=VALUE'",
                entry
            )));
        }

        let key = parts[0].trim();
        let value = parts[1].trim();

        if key.is_empty() {
            return Err(AstraError::validation(format!(
                "Empty key in variable: '{}'",
                entry
            )));
        }

        map.insert(key.to_string(), value.to_string());
    }

    Ok(map)
}

/// Read a dotenv-style file. Blank lines and `#` comments are skipped.
pub fn load_var_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AstraError::config_error(format!(
            "unable to read variables file {}: {}",
            path.display(),
            e
        ))
    })?;

    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    parse_key_value(&lines)
}

/// Variables from `--var-file`, overridden by `--var`.
pub fn merge_variables(
    var_file: Option<&Path>,
    vars: &[String],
) -> Result<HashMap<String, String>> {
    let mut merged = match var_file {
        Some(path) => load_var_file(path)?,
        None => HashMap::new(),
    };
    merged.extend(parse_key_value(vars)?);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_key_value() {
        let vars = vec!["PORT=8080".to_string(), "NAME = web ".to_string()];
        let map = parse_key_value(&vars).unwrap();
        assert_eq!(map.get("PORT"), Some(&"8080".to_string()));
        assert_eq!(map.get("NAME"), Some(&"web".to_string()));

        assert!(parse_key_value(&["novalue".to_string()]).is_err());
        assert!(parse_key_value(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_var_file_is_overridden_by_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "PORT=3000").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "MODE=debug").unwrap();

        let merged = merge_variables(Some(file.path()), &["PORT=8080".to_string()]).unwrap();
        assert_eq!(merged.get("PORT"), Some(&"8080".to_string()));
        assert_eq!(merged.get("MODE"), Some(&"debug".to_string()));
    }
}
