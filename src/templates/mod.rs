//! Template registry module
//!
//! Compiles every `.html` file under the configured template directory
//! into an immutable [`TemplateSet`] at startup. Rendering is a minimal
//! `{{ name }}` substitution; the contract that matters here is the
//! registry one: load once, fail fast on syntax errors, read-only while
//! serving.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RequestError, StartupError};

/// A single compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Var(String),
}

impl Template {
    /// Compile template source into literal and placeholder segments.
    ///
    /// Placeholders use `{{ name }}` syntax. An unclosed or empty
    /// placeholder is a syntax error.
    pub fn compile(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if !rest[..start].is_empty() {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err("unclosed '{{' placeholder".to_string());
            };
            let name = after_open[..end].trim();
            if name.is_empty() {
                return Err("empty placeholder name".to_string());
            }
            if name.contains("{{") {
                return Err(format!("nested placeholder in '{name}'"));
            }
            segments.push(Segment::Var(name.to_string()));
            rest = &after_open[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Render the template with the given variables.
    ///
    /// Placeholders with no matching variable render as the empty string.
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    if let Some(value) = vars.get(name.as_str()) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

/// The compiled template set, shared read-only across requests.
#[derive(Debug, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Compile all `.html` files under `dir` (recursively).
    ///
    /// Template names are paths relative to `dir`, e.g. `user/profile.html`.
    pub fn load(dir: &Path) -> Result<Self, StartupError> {
        let mut templates = HashMap::new();
        collect_templates(dir, dir, &mut templates)?;
        debug!(count = templates.len(), dir = %dir.display(), "template set compiled");
        Ok(Self { templates })
    }

    /// Render the named template, failing if it was never compiled.
    pub fn render(
        &self,
        name: &str,
        vars: &HashMap<&str, String>,
    ) -> Result<String, RequestError> {
        self.templates
            .get(name)
            .map(|template| template.render(vars))
            .ok_or_else(|| RequestError::MissingTemplate(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    #[cfg(test)]
    pub fn from_sources(sources: &[(&str, &str)]) -> Self {
        let templates = sources
            .iter()
            .map(|(name, source)| {
                ((*name).to_string(), Template::compile(source).expect("test template compiles"))
            })
            .collect();
        Self { templates }
    }
}

fn collect_templates(
    root: &Path,
    dir: &Path,
    templates: &mut HashMap<String, Template>,
) -> Result<(), StartupError> {
    let entries = fs::read_dir(dir).map_err(|e| StartupError::Template {
        file: dir.display().to_string(),
        reason: format!("cannot read template directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StartupError::Template {
            file: dir.display().to_string(),
            reason: format!("cannot read directory entry: {e}"),
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_templates(root, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let source = fs::read_to_string(&path).map_err(|e| StartupError::Template {
                file: path.display().to_string(),
                reason: format!("cannot read template: {e}"),
            })?;
            let template = Template::compile(&source).map_err(|reason| StartupError::Template {
                file: path.display().to_string(),
                reason,
            })?;
            templates.insert(template_name(root, &path), template);
        }
    }
    Ok(())
}

fn template_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
