//! Resource filtering engine
//!
//! Filters come from `--filter` expressions and are parsed per service. A
//! resource survives a cleanup pass only if every filter that targets its type
//! finds one of its acceptable values at the filter's field path.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::error::{ImportError, ImportResult};
use super::resource::Resource;
use super::service::Service;

/// A predicate restricting which discovered resources are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Resource type the filter targets (empty = every type)
    pub service_name: String,
    /// Dotted path into the resource attributes
    pub field_path: String,
    /// Values accepted at the field path (empty = nothing matches)
    pub acceptable_values: Vec<String>,
}

impl ResourceFilter {
    pub fn new(
        service_name: impl Into<String>,
        field_path: impl Into<String>,
        acceptable_values: Vec<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            field_path: field_path.into(),
            acceptable_values,
        }
    }

    /// Whether this filter constrains the given resource at all
    pub fn applies_to(&self, resource: &Resource) -> bool {
        self.service_name.is_empty()
            || self.service_name == resource.resource_type
            || self.service_name == resource.service_name()
    }

    /// Whether the resource passes this filter
    ///
    /// Resources of other types always pass; a missing field path fails.
    pub fn matches(&self, resource: &Resource) -> bool {
        if !self.applies_to(resource) {
            return true;
        }

        resource
            .values_at(&self.field_path)
            .iter()
            .any(|value| self.acceptable_values.contains(value))
    }
}

/// When a cleanup pass runs relative to the provider refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// Before refresh, on the freshly enumerated resources
    Initial,
    /// After refresh, on the refreshed attributes
    PostRefresh,
}

impl fmt::Display for FilterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPhase::Initial => write!(f, "initial"),
            FilterPhase::PostRefresh => write!(f, "post-refresh"),
        }
    }
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub phase: FilterPhase,
    pub before: usize,
    pub after: usize,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Drop every resource of the service that fails its filter set
///
/// The relative order of retained resources is preserved. Duplicate
/// (type, id) pairs are collapsed onto their first occurrence, with or
/// without filters, so an empty filter set leaves the list unchanged only
/// when IDs are already unique per type.
pub fn filter_cleanup(service: &mut Service, phase: FilterPhase) -> CleanupReport {
    let before = service.resources.len();
    let filters = &service.filter;
    let mut seen: HashSet<(String, String)> = HashSet::new();

    service.resources.retain(|resource| {
        filters.iter().all(|filter| filter.matches(resource))
            && seen.insert((resource.resource_type.clone(), resource.id.clone()))
    });

    CleanupReport {
        phase,
        before,
        after: service.resources.len(),
    }
}

/// Split a raw value list on `:`, honouring single-quoted values
///
/// `'a:b':c` yields `["a:b", "c"]`. Empty segments are skipped.
pub fn parse_filter_values(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in raw.chars() {
        match c {
            '\'' => quoted = !quoted,
            ':' if !quoted => {
                if !current.is_empty() {
                    values.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        values.push(current);
    }

    values
}

/// Parse a filter expression in the shared grammar
///
/// - `<type>=<id>:<id>` filters a type by ID
/// - `Name=<path>;Value=<values>` filters every type on an attribute
/// - `Type=<type>;Name=<path>;Value=<values>` filters one type on an attribute
pub fn parse_filter_expression(raw: &str) -> ImportResult<Vec<ResourceFilter>> {
    let raw = raw.trim();

    if !raw.contains(';') {
        return match raw.split_once('=') {
            Some((service_name, ids))
                if !service_name.is_empty() && !ids.contains('=') =>
            {
                Ok(vec![ResourceFilter::new(
                    service_name,
                    "id",
                    parse_filter_values(ids),
                )])
            }
            _ => Err(invalid_filter(raw)),
        };
    }

    let parts: Vec<&str> = raw.split(';').collect();
    let (service_name, field_path, values) = match parts.as_slice() {
        [field_path, values] => ("", *field_path, *values),
        [service_name, field_path, values] => (
            service_name.strip_prefix("Type=").unwrap_or(*service_name),
            *field_path,
            *values,
        ),
        _ => return Err(invalid_filter(raw)),
    };

    let field_path = field_path.strip_prefix("Name=").unwrap_or(field_path);
    if field_path.is_empty() {
        return Err(invalid_filter(raw));
    }

    Ok(vec![ResourceFilter::new(
        service_name,
        field_path,
        parse_filter_values(values.strip_prefix("Value=").unwrap_or(values)),
    )])
}

fn invalid_filter(raw: &str) -> ImportError {
    ImportError::InvalidInput(format!(
        "invalid filter '{}', expected <type>=<ids> or [Type=<type>;]Name=<path>;Value=<values>",
        raw
    ))
}
