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

//! Devfile validation

use super::model::{CommandGroupKind, CommandType, ComponentType, DevfileData};
use crate::shared::error::{AstraError, Result};
use std::collections::HashSet;

pub struct DevfileValidator;

impl DevfileValidator {
    /// Run every check and report the first failure.
    pub fn validate(data: &DevfileData) -> Result<()> {
        Self::validate_components(data)?;
        Self::validate_unique_names(data)?;
        Self::validate_commands(data)?;
        Ok(())
    }

    pub fn validate_components(data: &DevfileData) -> Result<()> {
        if data.components.is_empty() {
            return Err(AstraError::NoComponents);
        }
        if !data
            .components
            .iter()
            .any(|c| c.component_type() == ComponentType::Container)
        {
            return Err(AstraError::NoContainerComponent);
        }
        Ok(())
    }

    fn validate_unique_names(data: &DevfileData) -> Result<()> {
        let mut seen = HashSet::new();
        for component in &data.components {
            if !seen.insert(component.name.as_str()) {
                return Err(AstraError::devfile_error(format!(
                    "duplicate component name {:?}",
                    component.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for command in &data.commands {
            if !seen.insert(command.id.to_lowercase()) {
                return Err(AstraError::devfile_error(format!(
                    "duplicate command id {:?}",
                    command.id
                )));
            }
        }
        Ok(())
    }

    /// Commands in dev-time groups must be exec or composite, and every reference must resolve.
    pub fn validate_commands(data: &DevfileData) -> Result<()> {
        let component_names: HashSet<&str> =
            data.components.iter().map(|c| c.name.as_str()).collect();
        let command_ids: HashSet<String> =
            data.commands.iter().map(|c| c.id.to_lowercase()).collect();

        for command in &data.commands {
            let dev_time = command
                .group()
                .map(|g| g.kind != CommandGroupKind::Deploy)
                .unwrap_or(false);
            let kind = command.command_type();

            if dev_time && !matches!(kind, CommandType::Exec | CommandType::Composite) {
                return Err(AstraError::UnsupportedCommand {
                    id: command.id.clone(),
                });
            }

            if let Some(exec) = &command.exec {
                if !component_names.contains(exec.component.as_str()) {
                    return Err(AstraError::devfile_error(format!(
                        "command {:?} references unknown component {:?}",
                        command.id, exec.component
                    )));
                }
            }
            if let Some(apply) = &command.apply {
                if !component_names.contains(apply.component.as_str()) {
                    return Err(AstraError::devfile_error(format!(
                        "command {:?} references unknown component {:?}",
                        command.id, apply.component
                    )));
                }
            }
            if let Some(composite) = &command.composite {
                for sub in &composite.commands {
                    if !command_ids.contains(&sub.to_lowercase()) {
                        return Err(AstraError::devfile_error(format!(
                            "composite command {:?} references unknown command {:?}",
                            command.id, sub
                        )));
                    }
                }
            }
            if kind == CommandType::Unknown {
                return Err(AstraError::UnsupportedCommand {
                    id: command.id.clone(),
                });
            }
        }
        Ok(())
    }
}
