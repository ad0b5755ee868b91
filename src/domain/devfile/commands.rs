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

use super::model::{Command, CommandGroupKind, Component, ComponentType, DevfileData};
use crate::shared::error::{AstraError, Result};

impl DevfileData {
    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(id))
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn components_of(&self, kind: ComponentType) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(move |c| c.component_type() == kind)
    }

    /// The command of a group: the single member, or the one flagged `isDefault`.
    pub fn default_command(&self, kind: CommandGroupKind) -> Result<Option<&Command>> {
        let in_group: Vec<&Command> = self
            .commands
            .iter()
            .filter(|c| c.group().map(|g| g.kind) == Some(kind))
            .collect();

        match in_group.len() {
            0 => Ok(None),
            1 => Ok(Some(in_group[0])),
            n => {
                let defaults: Vec<&Command> = in_group
                    .into_iter()
                    .filter(|c| c.group().and_then(|g| g.is_default).unwrap_or(false))
                    .collect();
                if defaults.len() == 1 {
                    Ok(Some(defaults[0]))
                } else {
                    Err(AstraError::devfile_error(format!(
                        "there should be exactly one default command for command group {}, currently there are {}",
                        kind.as_str(),
                        if defaults.is_empty() { n } else { defaults.len() }
                    )))
                }
            }
        }
    }

    /// `explicit` when given, else the group default.
    pub fn resolve_command(
        &self,
        kind: CommandGroupKind,
        explicit: Option<&str>,
    ) -> Result<Option<&Command>> {
        match explicit {
            Some(id) => self.command(id).map(Some).ok_or_else(|| {
                AstraError::devfile_error(format!(
                    "no command named {:?} found in the devfile",
                    id
                ))
            }),
            None => self.default_command(kind),
        }
    }

    /// Expand composites into the leaf commands, in order.
    pub fn flatten_command<'a>(&'a self, command: &'a Command) -> Result<Vec<&'a Command>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.flatten_into(command, &mut stack, &mut out)?;
        Ok(out)
    }

    fn flatten_into<'a>(
        &'a self,
        command: &'a Command,
        stack: &mut Vec<String>,
        out: &mut Vec<&'a Command>,
    ) -> Result<()> {
        let Some(composite) = &command.composite else {
            out.push(command);
            return Ok(());
        };

        let id = command.id.to_lowercase();
        if stack.contains(&id) {
            return Err(AstraError::devfile_error(format!(
                "composite command {:?} references itself",
                command.id
            )));
        }
        stack.push(id);
        for sub in &composite.commands {
            let child = self.command(sub).ok_or_else(|| {
                AstraError::devfile_error(format!(
                    "composite command {:?} references unknown command {:?}",
                    command.id, sub
                ))
            })?;
            self.flatten_into(child, stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVFILE: &str = r#"
schemaVersion: 2.2.0
components:
- name: runtime
  container:
    image: node
commands:
- id: install
  exec:
    component: runtime
    commandLine: npm install
    group:
      kind: build
- id: start
  exec:
    component: runtime
    commandLine: npm start
    group:
      kind: run
      isDefault: true
- id: debug-start
  exec:
    component: runtime
    commandLine: npm run debug
    group:
      kind: run
- id: all
  composite:
    commands: [install, start]
"#;

    fn data() -> DevfileData {
        serde_yaml::from_str(DEVFILE).unwrap()
    }

    #[test]
    fn test_default_command() {
        let data = data();
        assert_eq!(
            data.default_command(CommandGroupKind::Build).unwrap().unwrap().id,
            "install"
        );
        assert_eq!(
            data.default_command(CommandGroupKind::Run).unwrap().unwrap().id,
            "start"
        );
        assert!(data.default_command(CommandGroupKind::Deploy).unwrap().is_none());
    }

    #[test]
    fn test_resolve_explicit_command() {
        let data = data();
        let cmd = data
            .resolve_command(CommandGroupKind::Run, Some("DEBUG-START"))
            .unwrap()
            .unwrap();
        assert_eq!(cmd.id, "debug-start");
        assert!(data.resolve_command(CommandGroupKind::Run, Some("nope")).is_err());
    }

    #[test]
    fn test_flatten_composite() {
        let data = data();
        let all = data.command("all").unwrap();
        let ids: Vec<&str> = data
            .flatten_command(all)
            .unwrap()
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["install", "start"]);
    }

    #[test]
    fn test_flatten_detects_cycles() {
        let yaml = r#"
schemaVersion: 2.2.0
commands:
- id: a
  composite:
    commands: [b]
- id: b
  composite:
    commands: [a]
"#;
        let data: DevfileData = serde_yaml::from_str(yaml).unwrap();
        assert!(data.flatten_command(data.command("a").unwrap()).is_err());
    }
}
