//! Static resource hierarchy.
//!
//! Loaded once at start-up and read-only afterwards. The text form has one
//! resource per line:
//!
//! ```text
//! % name  max_consumable  max_renewable  [weight child]*
//! arm     1.0             1.0            1.0 shoulder 0.5 wrist
//! ```
//!
//! Lines starting with `%` or `#` and blank lines are ignored.

use super::request::{ResourceRequest, ResourceUsage};
use crate::error::{PlexecError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// Capacity of a resource the hierarchy does not define.
pub const DEFAULT_CAPACITY: f64 = 1.0;

/// A child usage: requesting the parent implies `weight` units of the child
/// per unit of the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildResource {
    /// Child resource name.
    pub name: String,
    /// Units of the child per unit of the parent.
    pub weight: f64,
}

/// A resource definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    /// Resource name.
    pub name: String,
    /// Capacity for usages that are never returned.
    pub max_consumable: f64,
    /// Capacity for usages returned at command termination.
    pub max_renewable: f64,
    /// Implied child usages.
    pub children: Vec<ChildResource>,
}

impl ResourceNode {
    /// Define a resource without children.
    pub fn new(name: impl Into<String>, max_consumable: f64, max_renewable: f64) -> Self {
        Self {
            name: name.into(),
            max_consumable,
            max_renewable,
            children: Vec::new(),
        }
    }

    /// Add an implied child usage.
    pub fn with_child(mut self, weight: f64, child: impl Into<String>) -> Self {
        self.children.push(ChildResource {
            name: child.into(),
            weight,
        });
        self
    }
}

/// The resource hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ResourceHierarchy {
    resources: HashMap<String, ResourceNode>,
}

impl ResourceHierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource definition (builder form).
    pub fn with(mut self, resource: ResourceNode) -> Self {
        self.define(resource);
        self
    }

    /// Add or replace a resource definition.
    pub fn define(&mut self, resource: ResourceNode) {
        self.resources.insert(resource.name.clone(), resource);
    }

    /// Look up a resource definition.
    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.resources.get(name)
    }

    /// Number of defined resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if no resources are defined.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Capacity that bounds a usage of the named resource.
    pub fn capacity(&self, name: &str, release: bool) -> f64 {
        match self.resources.get(name) {
            Some(node) if release => node.max_renewable,
            Some(node) => node.max_consumable,
            None => DEFAULT_CAPACITY,
        }
    }

    /// Load and validate a hierarchy file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PlexecError::ResourceFile {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Parse and validate the text form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut hierarchy = Self::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(PlexecError::ResourceParse {
                    line,
                    cause: "expected name, consumable and renewable capacities".to_string(),
                });
            }
            let name = fields[0];
            if hierarchy.resources.contains_key(name) {
                return Err(PlexecError::ResourceParse {
                    line,
                    cause: format!("resource '{}' defined twice", name),
                });
            }
            let mut node = ResourceNode::new(
                name,
                parse_amount(fields[1], line)?,
                parse_amount(fields[2], line)?,
            );
            let rest = &fields[3..];
            if rest.len() % 2 != 0 {
                return Err(PlexecError::ResourceParse {
                    line,
                    cause: "child weight without a child name".to_string(),
                });
            }
            for pair in rest.chunks(2) {
                node = node.with_child(parse_amount(pair[0], line)?, pair[1]);
            }
            hierarchy.define(node);
        }
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Check that every child is defined and the hierarchy has no cycles.
    pub fn validate(&self) -> Result<()> {
        for node in self.resources.values() {
            if let Some(child) = node
                .children
                .iter()
                .find(|c| !self.resources.contains_key(&c.name))
            {
                return Err(PlexecError::ResourceHierarchy {
                    resource: node.name.clone(),
                    cause: format!("child '{}' is not defined", child.name),
                });
            }
        }

        // Depth-first colouring; a grey node reached again closes a cycle.
        let mut done: HashSet<&str> = HashSet::new();
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        for start in names {
            let mut path: Vec<&str> = Vec::new();
            self.visit(start, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if path.contains(&name) {
            return Err(PlexecError::ResourceHierarchy {
                resource: name.to_string(),
                cause: format!("cycle through {}", path.join(" -> ")),
            });
        }
        path.push(name);
        if let Some(node) = self.resources.get(name) {
            for child in &node.children {
                self.visit(&child.name, path, done)?;
            }
        }
        path.pop();
        done.insert(name);
        Ok(())
    }

    /// Expand a command's requests into every resource they touch.
    ///
    /// Descendants are reached breadth-first with the amount scaled by the
    /// weights along the path. An explicit request overrides an implied
    /// usage; among implied usages the first one reached is kept.
    pub fn expand(&self, requests: &[ResourceRequest]) -> Vec<ResourceUsage> {
        let mut usages: Vec<ResourceUsage> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for request in requests {
            let usage = ResourceUsage {
                name: request.name.clone(),
                amount: request.upper_bound,
                release: request.release_at_termination,
            };
            match index.get(&request.name) {
                Some(&i) => usages[i] = usage,
                None => {
                    index.insert(request.name.clone(), usages.len());
                    usages.push(usage);
                }
            }
        }

        for request in requests {
            let mut queue: VecDeque<(&str, f64)> = VecDeque::new();
            queue.push_back((request.name.as_str(), request.upper_bound));
            while let Some((name, amount)) = queue.pop_front() {
                let Some(node) = self.resources.get(name) else {
                    continue;
                };
                for child in &node.children {
                    let implied = amount * child.weight;
                    if !index.contains_key(&child.name) {
                        index.insert(child.name.clone(), usages.len());
                        usages.push(ResourceUsage {
                            name: child.name.clone(),
                            amount: implied,
                            release: request.release_at_termination,
                        });
                    }
                    queue.push_back((child.name.as_str(), implied));
                }
            }
        }
        usages
    }
}

fn parse_amount(field: &str, line: usize) -> Result<f64> {
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(PlexecError::ResourceParse {
            line,
            cause: format!("'{}' is not a non-negative number", field),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
% robot resources
arm 2 1 1.0 shoulder 0.5 wrist

shoulder 1 1
# joints
wrist 1 1 2 gripper
gripper 1 1
";

    #[test]
    fn parses_and_expands() {
        let hierarchy = ResourceHierarchy::parse(SAMPLE).unwrap();
        assert_eq!(hierarchy.len(), 4);
        assert_eq!(hierarchy.capacity("arm", false), 2.0);
        assert_eq!(hierarchy.capacity("arm", true), 1.0);
        assert_eq!(hierarchy.capacity("camera", true), DEFAULT_CAPACITY);

        let usages = hierarchy.expand(&[ResourceRequest::new("arm")]);
        let names: Vec<&str> = usages.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["arm", "shoulder", "wrist", "gripper"]);
        assert_eq!(usages[2].amount, 0.5);
        assert_eq!(usages[3].amount, 1.0);
    }

    #[test]
    fn explicit_request_overrides_implied() {
        let hierarchy = ResourceHierarchy::parse(SAMPLE).unwrap();
        let usages = hierarchy.expand(&[
            ResourceRequest::new("arm"),
            ResourceRequest::new("wrist").with_amount(0.25),
        ]);
        let wrist = usages.iter().find(|u| u.name == "wrist").unwrap();
        assert_eq!(wrist.amount, 0.25);
        assert_eq!(usages.iter().filter(|u| u.name == "wrist").count(), 1);
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(matches!(
            ResourceHierarchy::parse("arm one 1"),
            Err(PlexecError::ResourceParse { line: 1, .. })
        ));
        assert!(matches!(
            ResourceHierarchy::parse("arm 1 1 1 leg"),
            Err(PlexecError::ResourceHierarchy { .. })
        ));
        assert!(matches!(
            ResourceHierarchy::parse("a 1 1 1 b\nb 1 1 1 a"),
            Err(PlexecError::ResourceHierarchy { .. })
        ));
        assert!(matches!(
            ResourceHierarchy::parse("a 1 1 1"),
            Err(PlexecError::ResourceParse { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let hierarchy = ResourceHierarchy::from_file(file.path()).unwrap();
        assert!(hierarchy.get("gripper").is_some());

        assert!(matches!(
            ResourceHierarchy::from_file("/nonexistent/resources.data"),
            Err(PlexecError::ResourceFile { .. })
        ));
    }
}
