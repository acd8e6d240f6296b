//! Property bags attached to elements and components.
//!
//! A bag carries four groups that are mounted and diffed independently:
//! plain attributes, class tokens, inline styles and event handlers, plus
//! an optional identity key.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::events::Handler;
use crate::host::{Host, HostError, HostNodeId};

/// Class value as written by the caller.
///
/// Both forms normalize to the same ordered set of non-blank tokens, so
/// `"a b"` and `["a", "b"]` describe the same classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassList {
    Tokens(String),
    List(Vec<String>),
}

impl ClassList {
    pub fn tokens(&self) -> IndexSet<String> {
        match self {
            ClassList::Tokens(tokens) => tokens.split_whitespace().map(str::to_string).collect(),
            ClassList::List(list) => list
                .iter()
                .map(|token| token.trim())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl From<&str> for ClassList {
    fn from(tokens: &str) -> Self {
        ClassList::Tokens(tokens.to_string())
    }
}

impl From<String> for ClassList {
    fn from(tokens: String) -> Self {
        ClassList::Tokens(tokens)
    }
}

impl From<Vec<String>> for ClassList {
    fn from(list: Vec<String>) -> Self {
        ClassList::List(list)
    }
}

impl From<Vec<&str>> for ClassList {
    fn from(list: Vec<&str>) -> Self {
        ClassList::List(list.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ClassList {
    fn from(list: [&str; N]) -> Self {
        ClassList::List(list.iter().map(|token| token.to_string()).collect())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Props {
    attrs: IndexMap<String, Value>,
    class: IndexSet<String>,
    style: IndexMap<String, String>,
    on: IndexMap<String, Handler>,
    key: Option<String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag whose attributes are the entries of a JSON object.
    /// Anything other than an object yields an empty bag.
    pub fn from_json(value: Value) -> Self {
        let mut props = Self::new();
        if let Value::Object(entries) = value {
            props.attrs.extend(entries);
        }
        props
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn class(mut self, class: impl Into<ClassList>) -> Self {
        self.class = class.into().tokens();
        self
    }

    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn on(mut self, event: impl Into<String>, handler: Handler) -> Self {
        self.on.insert(event.into(), handler);
        self
    }

    pub fn key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn attrs(&self) -> &IndexMap<String, Value> {
        &self.attrs
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn classes(&self) -> &IndexSet<String> {
        &self.class
    }

    pub fn styles(&self) -> &IndexMap<String, String> {
        &self.style
    }

    pub fn events(&self) -> &IndexMap<String, Handler> {
        &self.on
    }

    pub fn key_value(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Attributes as a JSON object, the form components receive them in.
    pub fn to_object(&self) -> Value {
        Value::Object(
            self.attrs
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs
            && self.class == other.class
            && self.style == other.style
            && self.key == other.key
            && self.on.len() == other.on.len()
            && self.on.iter().all(|(event, handler)| {
                other
                    .on
                    .get(event)
                    .is_some_and(|candidate| candidate.ptr_eq(handler))
            })
    }
}

/// Host string form of an attribute value, or `None` when the attribute
/// should be absent. Strings are used verbatim; arrays and objects are
/// written as compact JSON.
pub(crate) fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn apply_props(
    host: &mut dyn Host,
    node: HostNodeId,
    props: &Props,
) -> Result<(), HostError> {
    for (name, value) in &props.attrs {
        if let Some(value) = attribute_value(value) {
            host.set_attribute(node, name, &value)?;
        }
    }
    for token in &props.class {
        host.add_class(node, token)?;
    }
    for (property, value) in &props.style {
        host.set_style(node, property, value)?;
    }
    Ok(())
}

/// Apply attribute, class and style differences between two bags to a
/// mounted element. Removals go out before additions in every group.
pub(crate) fn patch_props(
    host: &mut dyn Host,
    node: HostNodeId,
    old: &Props,
    new: &Props,
) -> Result<(), HostError> {
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            host.remove_attribute(node, name)?;
        }
    }
    for (name, value) in &new.attrs {
        if old.attrs.get(name) == Some(value) {
            continue;
        }
        match attribute_value(value) {
            Some(value) => host.set_attribute(node, name, &value)?,
            None => host.remove_attribute(node, name)?,
        }
    }

    for token in old.class.difference(&new.class) {
        host.remove_class(node, token)?;
    }
    for token in new.class.difference(&old.class) {
        host.add_class(node, token)?;
    }

    for property in old.style.keys() {
        if !new.style.contains_key(property) {
            host.remove_style(node, property)?;
        }
    }
    for (property, value) in &new.style {
        if old.style.get(property) != Some(value) {
            host.set_style(node, property, value)?;
        }
    }
    Ok(())
}
