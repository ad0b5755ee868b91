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

//! Interactive questions.

use crate::shared::error::{AstraError, Result};
use dialoguer::{Confirm, Input, Password, Select};
use std::io::IsTerminal;

pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Ask a yes/no question. Defaults to "no".
pub fn proceed(question: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| AstraError::config_error(format!("Failed to get user input: {}", e)))
}

/// Ask a yes/no question that defaults to "yes".
pub fn proceed_default_yes(question: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(question)
        .default(true)
        .interact()
        .map_err(|e| AstraError::config_error(format!("Failed to get user input: {}", e)))
}

pub fn input(question: &str, default: Option<&str>) -> Result<String> {
    let mut prompt = Input::<String>::new().with_prompt(question);
    if let Some(default) = default {
        prompt = prompt.default(default.to_string());
    }
    prompt
        .interact_text()
        .map_err(|e| AstraError::config_error(format!("Failed to get user input: {}", e)))
}

pub fn password(question: &str) -> Result<String> {
    Password::new()
        .with_prompt(question)
        .interact()
        .map_err(|e| AstraError::config_error(format!("Failed to get user input: {}", e)))
}

/// Pick one entry and return its index.
pub fn select<T: ToString>(question: &str, items: &[T]) -> Result<usize> {
    Select::new()
        .with_prompt(question)
        .items(items)
        .default(0)
        .interact()
        .map_err(|e| AstraError::config_error(format!("Failed to get user input: {}", e)))
}
