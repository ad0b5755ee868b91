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

//! Project detection from the files present in a directory.

use crate::domain::api::{DetectionResult, DevfileStack};
use crate::domain::devfile::sanitize_name;
use crate::infrastructure::filesystem::Filesystem;
use crate::infrastructure::registry::{RegistryClient, StackFilter};
use crate::shared::error::{AstraError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

static POM_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<artifactId>\s*([^<\s]+)\s*</artifactId>").expect("valid pom pattern")
});
static POM_PARENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<parent>.*?</parent>").expect("valid pom pattern"));

/// What the files of a project look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectGuess {
    pub language: String,
    pub framework: Option<String>,
    /// Registry stacks that fit, best first.
    pub stack_candidates: Vec<&'static str>,
}

/// The registry stack picked for a project.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFramework {
    pub stack: DevfileStack,
    pub guess: ProjectGuess,
}

struct Rule {
    marker: &'static str,
    language: &'static str,
    frameworks: &'static [(&'static str, &'static str, &'static [&'static str])],
    fallback: &'static [&'static str],
}

/// Marker file, language, then `(content needle, framework, stacks)` checked in order.
const RULES: &[Rule] = &[
    Rule {
        marker: "package.json",
        language: "JavaScript",
        frameworks: &[
            ("\"@angular/core\"", "Angular", &["nodejs-angular"]),
            ("\"next\"", "Next", &["nodejs-nextjs"]),
            ("\"nuxt\"", "Nuxt", &["nodejs-nuxtjs"]),
            ("\"react\"", "React", &["nodejs-react"]),
            ("\"svelte\"", "Svelte", &["nodejs-svelte"]),
            ("\"vue\"", "Vue", &["nodejs-vue"]),
            ("\"express\"", "Express", &["nodejs"]),
        ],
        fallback: &["nodejs"],
    },
    Rule {
        marker: "pom.xml",
        language: "Java",
        frameworks: &[
            ("io.quarkus", "Quarkus", &["java-quarkus"]),
            ("spring-boot", "Spring", &["java-springboot"]),
            ("io.vertx", "Vertx", &["java-vertx"]),
            ("openliberty", "OpenLiberty", &["java-openliberty"]),
            ("wildfly", "WildFly", &["java-wildfly"]),
        ],
        fallback: &["java-maven"],
    },
    Rule {
        marker: "build.gradle",
        language: "Java",
        frameworks: &[("org.springframework.boot", "Spring", &["java-springboot"])],
        fallback: &["java-gradle"],
    },
    Rule {
        marker: "go.mod",
        language: "Go",
        frameworks: &[],
        fallback: &["go"],
    },
    Rule {
        marker: "requirements.txt",
        language: "Python",
        frameworks: &[
            ("django", "Django", &["python-django"]),
            ("flask", "Flask", &["python"]),
        ],
        fallback: &["python"],
    },
    Rule {
        marker: "pyproject.toml",
        language: "Python",
        frameworks: &[("django", "Django", &["python-django"])],
        fallback: &["python"],
    },
    Rule {
        marker: "composer.json",
        language: "PHP",
        frameworks: &[("laravel", "Laravel", &["php-laravel"])],
        fallback: &["php-laravel"],
    },
    Rule {
        marker: "Gemfile",
        language: "Ruby",
        frameworks: &[],
        fallback: &["ruby"],
    },
];

/// Guess the language and framework of the project in `dir`.
pub fn detect_project(fs: &dyn Filesystem, dir: &Path) -> Result<Option<ProjectGuess>> {
    for rule in RULES {
        let marker = dir.join(rule.marker);
        if !fs.exists(&marker) {
            continue;
        }
        let content = fs.read_to_string(&marker).unwrap_or_default().to_lowercase();
        let matched = rule
            .frameworks
            .iter()
            .find(|(needle, _, _)| content.contains(&needle.to_lowercase()));
        return Ok(Some(match matched {
            Some((_, framework, stacks)) => ProjectGuess {
                language: rule.language.to_string(),
                framework: Some(framework.to_string()),
                stack_candidates: stacks.to_vec(),
            },
            None => ProjectGuess {
                language: rule.language.to_string(),
                framework: None,
                stack_candidates: rule.fallback.to_vec(),
            },
        }));
    }

    let has_csproj = fs
        .read_dir(dir)?
        .iter()
        .any(|p| p.extension().and_then(|e| e.to_str()) == Some("csproj"));
    if has_csproj {
        return Ok(Some(ProjectGuess {
            language: "C#".to_string(),
            framework: Some(".NET".to_string()),
            stack_candidates: vec!["dotnet60", "dotnet50"],
        }));
    }
    Ok(None)
}

/// Name declared by the project manifest, else the directory name.
pub fn detect_name(fs: &dyn Filesystem, dir: &Path) -> Result<String> {
    let package = dir.join("package.json");
    if fs.exists(&package) {
        let parsed: serde_json::Value = serde_json::from_str(&fs.read_to_string(&package)?)?;
        if let Some(name) = parsed.get("name").and_then(|n| n.as_str()) {
            if let Ok(name) = sanitize_name(name) {
                return Ok(name);
            }
        }
    }

    let go_mod = dir.join("go.mod");
    if fs.exists(&go_mod) {
        let content = fs.read_to_string(&go_mod)?;
        let module = content
            .lines()
            .find_map(|l| l.trim().strip_prefix("module "))
            .and_then(|m| m.trim().rsplit('/').next());
        if let Some(Ok(name)) = module.map(sanitize_name) {
            return Ok(name);
        }
    }

    let pom = dir.join("pom.xml");
    if fs.exists(&pom) {
        let content = fs.read_to_string(&pom)?;
        // The first artifactId may belong to <parent>.
        let without_parent = POM_PARENT.replace(&content, "");
        if let Some(caps) = POM_ARTIFACT.captures(&without_parent) {
            if let Ok(name) = sanitize_name(&caps[1]) {
                return Ok(name);
            }
        }
    }

    let dir_name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "component".to_string());
    sanitize_name(&dir_name)
}

/// Ports exposed by a Dockerfile or declared as `PORT=` in `.env`.
pub fn detect_ports(fs: &dyn Filesystem, dir: &Path) -> Result<Vec<i32>> {
    let mut ports = BTreeSet::new();

    for name in ["Dockerfile", "Containerfile"] {
        let path = dir.join(name);
        if !fs.exists(&path) {
            continue;
        }
        for line in fs.read_to_string(&path)?.lines() {
            let line = line.trim();
            if let Some(rest) = line
                .strip_prefix("EXPOSE ")
                .or_else(|| line.strip_prefix("expose "))
            {
                for port in rest.split_whitespace() {
                    if let Ok(p) = port.split('/').next().unwrap_or_default().parse::<i32>() {
                        ports.insert(p);
                    }
                }
            }
        }
    }

    let env = dir.join(".env");
    if fs.exists(&env) {
        for line in fs.read_to_string(&env)?.lines() {
            if let Some(value) = line.trim().strip_prefix("PORT=") {
                if let Ok(p) = value.trim().trim_matches('"').parse::<i32>() {
                    ports.insert(p);
                }
            }
        }
    }
    Ok(ports.into_iter().collect())
}

#[async_trait::async_trait]
pub trait AlizerClient: Send + Sync {
    /// The registry stack matching the project in `dir`.
    async fn detect_framework(&self, dir: &Path) -> Result<DetectedFramework>;

    fn detect_name(&self, dir: &Path) -> Result<String>;

    fn detect_ports(&self, dir: &Path) -> Result<Vec<i32>>;

    /// Everything `astra analyze` reports.
    async fn analyze(&self, dir: &Path) -> Result<DetectionResult> {
        let framework = self.detect_framework(dir).await?;
        Ok(DetectionResult {
            devfile: framework.stack.name,
            devfile_registry: framework.stack.registry.name,
            devfile_version: framework.stack.version,
            application_ports: self.detect_ports(dir)?,
            name: self.detect_name(dir)?,
        })
    }
}

pub struct Alizer {
    registry: Arc<dyn RegistryClient>,
    fs: Arc<dyn Filesystem>,
}

impl Alizer {
    pub fn new(registry: Arc<dyn RegistryClient>, fs: Arc<dyn Filesystem>) -> Self {
        Self { registry, fs }
    }
}

#[async_trait::async_trait]
impl AlizerClient for Alizer {
    async fn detect_framework(&self, dir: &Path) -> Result<DetectedFramework> {
        let guess = detect_project(self.fs.as_ref(), dir)?.ok_or_else(|| {
            AstraError::validation(format!(
                "unable to detect the type of the project in {}",
                dir.display()
            ))
        })?;
        let stacks = self.registry.list_stacks(&StackFilter::default()).await?;

        let stack = guess
            .stack_candidates
            .iter()
            .find_map(|candidate| stacks.iter().find(|s| s.name == *candidate))
            .cloned()
            .ok_or_else(|| {
                AstraError::validation(format!(
                    "no devfile stack found for a {} project in the configured registries",
                    guess.framework.as_deref().unwrap_or(&guess.language)
                ))
            })?;
        tracing::debug!("detected stack {} from registry {}", stack.name, stack.registry.name);
        Ok(DetectedFramework { stack, guess })
    }

    fn detect_name(&self, dir: &Path) -> Result<String> {
        detect_name(self.fs.as_ref(), dir)
    }

    fn detect_ports(&self, dir: &Path) -> Result<Vec<i32>> {
        detect_ports(self.fs.as_ref(), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::filesystem::DefaultFs;

    #[test]
    fn test_detect_node_framework_and_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "My_Shop", "dependencies": {"react": "^18.0.0"}}"#,
        )
        .unwrap();

        let guess = detect_project(&DefaultFs, dir.path()).unwrap().unwrap();
        assert_eq!(guess.language, "JavaScript");
        assert_eq!(guess.framework.as_deref(), Some("React"));
        assert_eq!(guess.stack_candidates, vec!["nodejs-react"]);
        assert_eq!(detect_name(&DefaultFs, dir.path()).unwrap(), "my-shop");
    }

    #[test]
    fn test_detect_maven_name_skips_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pom.xml"),
            "<project><parent><artifactId>spring-boot-starter-parent</artifactId></parent>\
             <artifactId>orders</artifactId></project>",
        )
        .unwrap();
        let guess = detect_project(&DefaultFs, dir.path()).unwrap().unwrap();
        assert_eq!(guess.stack_candidates, vec!["java-springboot"]);
        assert_eq!(detect_name(&DefaultFs, dir.path()).unwrap(), "orders");
    }

    #[test]
    fn test_detect_ports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM node\nEXPOSE 8080 9090/tcp\n").unwrap();
        std::fs::write(dir.path().join(".env"), "PORT=3000\n").unwrap();
        assert_eq!(detect_ports(&DefaultFs, dir.path()).unwrap(), vec![3000, 8080, 9090]);
    }

    #[test]
    fn test_unknown_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();
        assert!(detect_project(&DefaultFs, dir.path()).unwrap().is_none());
    }
}
