//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::api::{Component, DevfileStack, Namespace, ResourcesList, ServiceBinding};
use crate::domain::devfile::ComponentType;
use crate::domain::preference::{PreferenceItem, Registry};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
        );
    table
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "None"
    } else {
        value
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Components of `astra list component`, the devfile component marked with `*`.
    pub fn render_components(&self, list: &ResourcesList) -> String {
        if list.components.is_empty() {
            return "There are no components deployed.".to_string();
        }

        let mut table = new_table(&["NAME", "PROJECT TYPE", "RUNNING IN", "MANAGED", "PLATFORM"]);
        for component in &list.components {
            let is_current = list.component_in_devfile.as_deref() == Some(component.name.as_str());
            let name = if is_current {
                format!("{} {}", StatusIcon::CURRENT, component.name)
            } else {
                component.name.clone()
            };
            let managed = if component.managed_by_version.is_empty() {
                or_none(&component.managed_by).to_string()
            } else {
                format!("{} ({})", component.managed_by, component.managed_by_version)
            };
            let name_cell = if is_current {
                Cell::new(name).fg(self.theme.info)
            } else {
                Cell::new(name)
            };
            table.add_row(vec![
                name_cell,
                Cell::new(or_none(&component.project_type)),
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::running_icon(&component.running_in),
                    component.running_in
                ))
                .fg(self.theme.running_color(&component.running_in)),
                Cell::new(managed),
                Cell::new(or_none(&component.running_on)),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Components {} ─╮\n",
            format!("[{} components]", list.components.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// Bindings of the devfile and of the namespace, devfile ones marked with `*`.
    pub fn render_bindings(&self, in_devfile: &[String], bindings: &[ServiceBinding]) -> String {
        if bindings.is_empty() {
            return "No bindings found.".to_string();
        }

        let mut table = new_table(&["NAME", "APPLICATION", "SERVICES", "BIND AS FILES"]);
        for binding in bindings {
            let name = if in_devfile.contains(&binding.name) {
                format!("{} {}", StatusIcon::CURRENT, binding.name)
            } else {
                binding.name.clone()
            };
            let application = format!(
                "{} ({})",
                binding.spec.application.name, binding.spec.application.kind
            );
            let services = binding
                .spec
                .services
                .iter()
                .map(|s| format!("{} ({}.{})", s.name, s.kind, s.api_version))
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![
                Cell::new(name),
                Cell::new(application),
                Cell::new(services),
                Cell::new(StatusIcon::yes_no(binding.spec.bind_as_files))
                    .fg(self.theme.flag_color(binding.spec.bind_as_files)),
            ]);
        }
        table.to_string()
    }

    pub fn render_namespaces(&self, namespaces: &[Namespace]) -> String {
        if namespaces.is_empty() {
            return "No namespaces found.".to_string();
        }
        let mut table = new_table(&["ACTIVE", "NAME"]);
        for namespace in namespaces {
            let active = if namespace.active { StatusIcon::CURRENT } else { "" };
            let mut name = Cell::new(&namespace.name);
            if namespace.active {
                name = name.fg(self.theme.success);
            }
            table.add_row(vec![
                Cell::new(active).set_alignment(CellAlignment::Center),
                name,
            ]);
        }
        table.to_string()
    }

    /// Stacks of `astra registry`, one row each or a detail block each.
    pub fn render_stacks(&self, stacks: &[DevfileStack], details: bool) -> String {
        if stacks.is_empty() {
            return "There are no devfile stacks matching your search.".to_string();
        }

        if details {
            return stacks
                .iter()
                .map(|stack| self.render_stack_details(stack))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let mut table = new_table(&["NAME", "REGISTRY", "DESCRIPTION", "VERSIONS"]);
        for stack in stacks {
            let versions = stack
                .versions
                .iter()
                .map(|v| v.version.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(&stack.name),
                Cell::new(&stack.registry.name),
                Cell::new(&stack.description),
                Cell::new(versions),
            ]);
        }
        table.to_string()
    }

    fn render_stack_details(&self, stack: &DevfileStack) -> String {
        let versions = stack
            .versions
            .iter()
            .map(|v| {
                if v.is_default {
                    format!("{} (default)", v.version)
                } else {
                    v.version.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let starters = if stack.starter_projects.is_empty() {
            "None".to_string()
        } else {
            stack
                .starter_projects
                .iter()
                .map(|s| format!("\n  - {}", s))
                .collect()
        };
        format!(
            "{} {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n",
            "Name:".bold(),
            stack.name,
            "Display Name".bold(),
            stack.display_name,
            "Registry".bold(),
            stack.registry.name,
            "Registry URL".bold(),
            stack.registry.url,
            "Description".bold(),
            stack.description,
            "Language".bold(),
            or_none(&stack.language),
            "Project Type".bold(),
            or_none(&stack.project_type),
            "Versions".bold(),
            versions,
        ) + &format!("{}: {}\n", "Starter Projects".bold(), starters)
    }

    pub fn render_preferences(&self, items: &[PreferenceItem]) -> String {
        let mut table = new_table(&["PARAMETER", "VALUE"]);
        for item in items {
            let value = match &item.value {
                Some(value) => Cell::new(json_text(value)),
                None => Cell::new(format!("{} (default)", json_text(&item.default)))
                    .fg(self.theme.muted),
            };
            table.add_row(vec![Cell::new(&item.name), value]);
        }
        table.to_string()
    }

    pub fn render_registries(&self, registries: &[Registry]) -> String {
        if registries.is_empty() {
            return "No devfile registries added to the configuration.".to_string();
        }
        let mut table = new_table(&["NAME", "URL", "SECURE"]);
        for registry in registries {
            table.add_row(vec![
                Cell::new(&registry.name),
                Cell::new(&registry.url),
                Cell::new(if registry.secure { "Yes" } else { "No" }),
            ]);
        }
        table.to_string()
    }

    /// `astra describe component`
    pub fn render_component(&self, name: &str, component: &Component) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} {}\n", "Name:".bold(), name));

        if let Some(data) = &component.devfile_data {
            let metadata = &data.devfile.metadata;
            if let Some(display_name) = &metadata.display_name {
                out.push_str(&format!("{} {}\n", "Display Name:".bold(), display_name));
            }
            if let Some(project_type) = &metadata.project_type {
                out.push_str(&format!("{} {}\n", "Project Type:".bold(), project_type));
            }
            if let Some(language) = &metadata.language {
                out.push_str(&format!("{} {}\n", "Language:".bold(), language));
            }
            if let Some(version) = &metadata.version {
                out.push_str(&format!("{} {}\n", "Version:".bold(), version));
            }
            if let Some(description) = &metadata.description {
                out.push_str(&format!("{} {}\n", "Description:".bold(), description));
            }
        }

        out.push_str(&format!("{} {}\n", "Running in:".bold(), component.running_in));
        if !component.running_on.is_empty() {
            out.push_str(&format!("{}\n", "Running on:".bold()));
            for (platform, modes) in &component.running_on {
                out.push_str(&format!(" •  {}: {}\n", platform, modes));
            }
        }

        if !component.dev_forwarded_ports.is_empty() {
            out.push_str(&format!("{}\n", "Forwarded ports:".bold()));
            for port in &component.dev_forwarded_ports {
                let prefix = if port.platform.is_empty() {
                    String::new()
                } else {
                    format!("[{}] ", port.platform)
                };
                out.push_str(&format!(
                    " •  {}{}:{} -> {}:{}\n",
                    prefix, port.local_address, port.local_port, port.container_name, port.container_port
                ));
            }
        }

        if let Some(data) = &component.devfile_data {
            let features = &data.supported_astra_features;
            out.push_str(&format!("\n{}\n", "Supported astra features:".bold()));
            out.push_str(&format!(" •  Dev: {}\n", if features.dev { "true" } else { "false" }));
            out.push_str(&format!(" •  Deploy: {}\n", if features.deploy { "true" } else { "false" }));
            out.push_str(&format!(" •  Debug: {}\n", if features.debug { "true" } else { "false" }));

            let containers: Vec<_> = data
                .devfile
                .components
                .iter()
                .filter(|c| c.component_type() == ComponentType::Container)
                .collect();
            if !containers.is_empty() {
                out.push_str(&format!("\n{}\n", "Container components:".bold()));
                for component in containers {
                    let Some(container) = &component.container else {
                        continue;
                    };
                    out.push_str(&format!(" •  {}\n", component.name));
                    out.push_str(&format!("    Image: {}\n", container.image));
                    for endpoint in &container.endpoints {
                        out.push_str(&format!(
                            "    Endpoint: {} ({})\n",
                            endpoint.name, endpoint.target_port
                        ));
                    }
                }
            }

            let manifests: Vec<_> = data
                .devfile
                .components
                .iter()
                .filter(|c| c.manifest().is_some())
                .map(|c| c.name.as_str())
                .collect();
            if !manifests.is_empty() {
                out.push_str(&format!("\n{}\n", "Kubernetes components:".bold()));
                for name in manifests {
                    out.push_str(&format!(" •  {}\n", name));
                }
            }
        }
        out
    }

    /// `astra describe binding`
    pub fn render_binding(&self, binding: &ServiceBinding) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} {}\n", "ServiceBinding used by the current component:".bold(), binding.name));
        out.push_str(&format!(
            "{} {} ({})\n",
            "Application:".bold(),
            binding.spec.application.name,
            binding.spec.application.kind
        ));
        out.push_str(&format!("{}\n", "Services:".bold()));
        for service in &binding.spec.services {
            out.push_str(&format!(" •  {} ({}.{})\n", service.name, service.kind, service.api_version));
        }
        out.push_str(&format!("{} {}\n", "Bind as files:".bold(), binding.spec.bind_as_files));
        out.push_str(&format!(
            "{} {}\n",
            "Detect binding resources:".bold(),
            binding.spec.detect_binding_resources
        ));
        if !binding.spec.naming_strategy.is_empty() {
            out.push_str(&format!("{} {}\n", "Naming strategy:".bold(), binding.spec.naming_strategy));
        }
        match &binding.status {
            Some(status) => {
                let items = if binding.spec.bind_as_files {
                    &status.binding_files
                } else {
                    &status.binding_env_vars
                };
                let label = if binding.spec.bind_as_files {
                    "Available binding files:"
                } else {
                    "Available environment variables:"
                };
                out.push_str(&format!("{}\n", label.bold()));
                for item in items {
                    out.push_str(&format!(" •  {}\n", item));
                }
            }
            None => out.push_str("Binding information for one or more ServiceBinding is not available because they don't exist on the cluster yet.\n"),
        }
        out
    }
}
