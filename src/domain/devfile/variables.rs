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

use regex::{Captures, Regex};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)\s*\}\}").expect("valid variable pattern")
});

/// Devfile `variables`, with command-line values taking precedence.
pub fn effective_variables(
    declared: &BTreeMap<String, String>,
    overrides: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = declared.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Replace `{{NAME}}` references in one string. Unknown names are left as written
/// and added to `missing`.
pub fn substitute(
    content: &str,
    variables: &BTreeMap<String, String>,
    missing: &mut BTreeSet<String>,
) -> String {
    VARIABLE_PATTERN
        .replace_all(content, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                missing.insert(caps[1].to_string());
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Substitute inside every string scalar of a parsed document. Keys and the
/// `variables` section itself are left untouched.
pub fn substitute_value(
    value: &mut Value,
    variables: &BTreeMap<String, String>,
    missing: &mut BTreeSet<String>,
) {
    match value {
        Value::String(text) => *text = substitute(text, variables, missing),
        Value::Sequence(items) => {
            for item in items {
                substitute_value(item, variables, missing);
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                if key.as_str() == Some("variables") {
                    continue;
                }
                substitute_value(item, variables, missing);
            }
        }
        Value::Tagged(tagged) => substitute_value(&mut tagged.value, variables, missing),
        _ => {}
    }
}
