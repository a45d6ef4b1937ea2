//! Project descriptor (`pom.xml`) parsing.
//!
//! [`Descriptor::parse`] turns one descriptor into its raw, uninherited
//! contents. Inheritance, placeholder expansion and validation happen in the
//! graph builder. [`is_aggregator`] is a narrow scan that stops at the first
//! `packaging` element.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use minibuild_schema::{AGGREGATOR_PACKAGING, Coordinate, Scope};

use crate::error::ResolveError;
use crate::paths::normalize_repository_url;
use crate::xml::{ElementEvents, XmlError, XmlEvent};

const DEPENDENCY: &str = "project/dependencies/dependency";
const MANAGED_DEPENDENCY: &str = "project/dependencyManagement/dependencies/dependency";
const PROPERTIES: &str = "project/properties/";
const IMPLEMENTATION_BUILD: &str = "manifestEntries/Implementation-Build";

/// Raw contents of one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Declared coordinate; missing fields are left empty.
    pub coordinate: Coordinate,
    /// Declared parent, if any.
    pub parent: Option<Coordinate>,
    /// `project/parent/relativePath`.
    pub parent_relative_path: Option<String>,
    /// `project/packaging` (`jar` when absent).
    pub packaging: Option<String>,
    /// Module directories in declaration order.
    pub modules: Vec<String>,
    /// Dependencies in declaration order.
    pub dependencies: Vec<Coordinate>,
    /// `dependencyManagement` entries.
    pub managed_dependencies: Vec<Coordinate>,
    /// `project/properties/*`.
    pub properties: BTreeMap<String, String>,
    /// `project/repositories/repository/url`, normalised to end in `/`.
    pub repositories: Vec<String>,
    /// `project/build/sourceDirectory`.
    pub source_directory: Option<String>,
    /// `project/build/outputDirectory`.
    pub output_directory: Option<String>,
    /// A manifest entry named `Implementation-Build` is present.
    pub include_implementation_build: bool,
}

impl Descriptor {
    /// Parse a descriptor file.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Descriptor`] if the file cannot be read or is not
    /// well-formed XML.
    pub fn parse_file(path: &Path) -> Result<Self, ResolveError> {
        let file = File::open(path).map_err(|e| ResolveError::Descriptor {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::parse(BufReader::new(file), path)
    }

    /// Parse a descriptor stream. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Descriptor`] if the stream is not well-formed XML.
    pub fn parse<R: BufRead>(reader: R, path: &Path) -> Result<Self, ResolveError> {
        let mut descriptor = Self::default();
        for event in ElementEvents::new(reader) {
            let event = event.map_err(|e| ResolveError::Descriptor {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            match event {
                XmlEvent::Open(path) => descriptor.open(&path),
                XmlEvent::Text { path, text } => descriptor.text(&path, text),
                XmlEvent::Close(_) => {}
            }
        }
        Ok(descriptor)
    }

    fn open(&mut self, path: &str) {
        match path {
            DEPENDENCY => self.dependencies.push(Coordinate::default()),
            MANAGED_DEPENDENCY => self.managed_dependencies.push(Coordinate::default()),
            "project/parent" => self.parent = Some(Coordinate::default()),
            _ if path.ends_with(IMPLEMENTATION_BUILD) => self.include_implementation_build = true,
            _ => {}
        }
    }

    fn text(&mut self, path: &str, text: String) {
        if let Some(field) = strip_field(path, DEPENDENCY) {
            if let Some(dependency) = self.dependencies.last_mut() {
                set_dependency_field(dependency, field, text);
            }
            return;
        }
        if let Some(field) = strip_field(path, MANAGED_DEPENDENCY) {
            if let Some(dependency) = self.managed_dependencies.last_mut() {
                set_dependency_field(dependency, field, text);
            }
            return;
        }
        if let Some(name) = path.strip_prefix(PROPERTIES).filter(|n| !n.contains('/')) {
            self.properties.insert(name.to_string(), text);
            return;
        }

        match path {
            "project/groupId" => self.coordinate.group_id = text,
            "project/artifactId" => self.coordinate.artifact_id = text,
            "project/version" => self.coordinate.version = Some(text),
            "project/packaging" => self.packaging = Some(text),
            "project/parent/groupId" => {
                self.parent.get_or_insert_with(Coordinate::default).group_id = text;
            }
            "project/parent/artifactId" => {
                self.parent.get_or_insert_with(Coordinate::default).artifact_id = text;
            }
            "project/parent/version" => {
                self.parent.get_or_insert_with(Coordinate::default).version = Some(text);
            }
            "project/parent/relativePath" => self.parent_relative_path = Some(text),
            "project/modules/module" => self.modules.push(text),
            "project/repositories/repository/url" => {
                self.repositories.push(normalize_repository_url(&text));
            }
            "project/build/sourceDirectory" => self.source_directory = Some(text),
            "project/build/outputDirectory" => self.output_directory = Some(text),
            _ => {}
        }
    }
}

fn strip_field<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)?.strip_prefix('/')
}

fn set_dependency_field(dependency: &mut Coordinate, field: &str, text: String) {
    match field {
        "groupId" => dependency.group_id = text,
        "artifactId" => dependency.artifact_id = text,
        "version" => dependency.version = Some(text),
        "classifier" => dependency.classifier = Some(text),
        "scope" => dependency.scope = Scope::parse(&text),
        "optional" => dependency.optional = text.eq_ignore_ascii_case("true"),
        "systemPath" => dependency.system_path = Some(text),
        _ => {}
    }
}

/// Scan a descriptor just far enough to learn whether `packaging == pom`.
///
/// Returns as soon as the `project/packaging` text is seen, without reading
/// the rest of the document.
///
/// # Errors
///
/// Any XML error encountered before the answer is known.
pub fn is_aggregator<R: BufRead>(reader: R) -> Result<bool, XmlError> {
    for event in ElementEvents::new(reader) {
        match event? {
            XmlEvent::Text { path, text } if path == "project/packaging" => {
                return Ok(text == AGGREGATOR_PACKAGING);
            }
            _ => {}
        }
    }
    Ok(false)
}

/// [`is_aggregator`] for a file; unreadable files count as non-aggregators.
pub fn is_aggregator_file(path: &Path) -> bool {
    let result = File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|f| is_aggregator(BufReader::new(f)).map_err(|e| e.to_string()));
    match result {
        Ok(aggregate) => aggregate,
        Err(e) => {
            tracing::debug!("Could not scan {}: {e}", path.display());
            false
        }
    }
}
