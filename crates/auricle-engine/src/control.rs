//! Named, typed control variables with nested subtrees.
//!
//! Commands take the forms `name=value`, `name?`, `name?val`, `name?help`,
//! `name?perm`, `?`, `?ls`, `?read:<file>` and `sub.rest`, where `rest` is
//! handed to the subtree `sub` unchanged.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Invalid variable name \"{0}\".")]
    UnknownVariable(String),
    #[error("The variable \"{0}\" is locked.")]
    Locked(String),
    #[error("The variable \"{0}\" is a monitor and cannot be written.")]
    ReadOnly(String),
    #[error("Invalid value \"{value}\" for \"{name}\": {reason}.")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error("Invalid query \"{0}\".")]
    InvalidQuery(String),
    #[error("The entry \"{0}\" already exists.")]
    Duplicate(String),
    #[error("{0}")]
    Subtree(String),
    #[error("{0}")]
    Action(String),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// A subtree that accepts commands relative to its own root.
pub trait ControlNode: Send {
    fn parse(&mut self, command: &str) -> ControlResult<String>;
}

/// Typed value of a setting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int { value: i64, min: i64 },
    Float { value: f64, min: f64 },
    Bool(bool),
    Text(String),
    Keyword { choices: Vec<String>, index: usize },
}

impl Value {
    pub fn int(value: i64, min: i64) -> Self {
        Value::Int { value, min }
    }

    pub fn float(value: f64, min: f64) -> Self {
        Value::Float { value, min }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn keyword<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Keyword {
            choices: choices.into_iter().map(Into::into).collect(),
            index: 0,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float { value, .. } => Some(*value),
            Value::Int { value, .. } => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            Value::Keyword { choices, index } => choices.get(*index).map(String::as_str),
            _ => None,
        }
    }

    fn assign(&mut self, name: &str, text: &str) -> ControlResult<()> {
        let invalid = |reason: &str| ControlError::InvalidValue {
            name: name.to_owned(),
            value: text.to_owned(),
            reason: reason.to_owned(),
        };
        match self {
            Value::Int { value, min } => {
                let parsed: i64 = text.parse().map_err(|_| invalid("not an integer"))?;
                if parsed < *min {
                    return Err(invalid(&format!("below the minimum {min}")));
                }
                *value = parsed;
            }
            Value::Float { value, min } => {
                let parsed: f64 = text.parse().map_err(|_| invalid("not a number"))?;
                if !parsed.is_finite() || parsed < *min {
                    return Err(invalid(&format!("below the minimum {min}")));
                }
                *value = parsed;
            }
            Value::Bool(value) => {
                *value = match text {
                    "yes" | "true" | "1" => true,
                    "no" | "false" | "0" => false,
                    _ => return Err(invalid("expected yes or no")),
                };
            }
            Value::Text(value) => *value = text.to_owned(),
            Value::Keyword { choices, index } => {
                *index = choices
                    .iter()
                    .position(|choice| choice == text)
                    .ok_or_else(|| invalid(&format!("expected one of [{}]", choices.join(" "))))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int { value, .. } => write!(f, "{value}"),
            Value::Float { value, .. } => write!(f, "{value}"),
            Value::Bool(true) => f.write_str("yes"),
            Value::Bool(false) => f.write_str("no"),
            Value::Text(value) => f.write_str(value),
            Value::Keyword { choices, index } => {
                f.write_str(choices.get(*index).map(String::as_str).unwrap_or(""))
            }
        }
    }
}

type Reader = Box<dyn FnMut() -> String + Send>;

enum Node {
    Setting {
        value: Value,
        help: String,
        locked: bool,
    },
    Monitor {
        read: Reader,
        help: String,
    },
    Subtree(Box<dyn ControlNode>),
}

/// Result of one successfully parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Text to return to the caller.
    Reply(String),
    /// A setting was written. `previous` allows the owner to undo the write
    /// when acting on it fails.
    Written { name: String, previous: Value },
    /// `?read:<file>` was requested.
    Include(String),
}

/// Flat list of control entries kept in insertion order.
#[derive(Default)]
pub struct ControlTree {
    entries: Vec<(String, Node)>,
}

impl ControlTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_setting(
        &mut self,
        name: &str,
        help: &str,
        value: Value,
    ) -> ControlResult<()> {
        self.insert(
            name,
            Node::Setting {
                value,
                help: help.to_owned(),
                locked: false,
            },
        )
    }

    /// Read-only entry whose text is produced by `read` on every query.
    pub fn insert_monitor(
        &mut self,
        name: &str,
        help: &str,
        read: impl FnMut() -> String + Send + 'static,
    ) -> ControlResult<()> {
        self.insert(
            name,
            Node::Monitor {
                read: Box::new(read),
                help: help.to_owned(),
            },
        )
    }

    pub fn insert_subtree(&mut self, name: &str, node: Box<dyn ControlNode>) -> ControlResult<()> {
        self.insert(name, Node::Subtree(node))
    }

    /// Removes `name`. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| entry != name);
        before != self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Locks or unlocks a setting against writes.
    pub fn set_locked(&mut self, name: &str, lock: bool) -> ControlResult<()> {
        match self.node_mut(name)? {
            Node::Setting { locked, .. } => {
                *locked = lock;
                Ok(())
            }
            _ => Err(ControlError::UnknownVariable(name.to_owned())),
        }
    }

    pub fn is_locked(&self, name: &str) -> bool {
        matches!(self.node(name), Some(Node::Setting { locked: true, .. }))
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.node(name) {
            Some(Node::Setting { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Overwrites a setting without the lock check, for the owner of the
    /// tree.
    pub fn set_value(&mut self, name: &str, text: &str) -> ControlResult<()> {
        match self.node_mut(name)? {
            Node::Setting { value, .. } => value.assign(name, text),
            _ => Err(ControlError::ReadOnly(name.to_owned())),
        }
    }

    pub fn restore(&mut self, name: &str, previous: Value) {
        if let Ok(Node::Setting { value, .. }) = self.node_mut(name) {
            *value = previous;
        }
    }

    pub fn parse(&mut self, command: &str) -> ControlResult<Parsed> {
        let command = command.trim();
        let split = command.find(|c| c == '=' || c == '?').unwrap_or(command.len());
        let (path, operation) = command.split_at(split);
        let path = path.trim();

        if path.is_empty() {
            return self.parse_root_query(operation);
        }
        if let Some((head, rest)) = path.split_once('.') {
            return match self.node_mut(head)? {
                Node::Subtree(node) => node
                    .parse(&format!("{}{}", rest, operation))
                    .map(Parsed::Reply),
                _ => Err(ControlError::UnknownVariable(path.to_owned())),
            };
        }
        if let Some(text) = operation.strip_prefix('=') {
            return self.write(path, text.trim());
        }
        let query = operation.strip_prefix('?').unwrap_or(operation);
        self.query(path, query).map(Parsed::Reply)
    }

    fn parse_root_query(&mut self, operation: &str) -> ControlResult<Parsed> {
        let query = operation
            .strip_prefix('?')
            .ok_or_else(|| ControlError::InvalidQuery(operation.to_owned()))?;
        if let Some(file) = query.strip_prefix("read:") {
            return Ok(Parsed::Include(file.trim().to_owned()));
        }
        match query {
            "" => Ok(Parsed::Reply(self.dump())),
            "ls" => Ok(Parsed::Reply(format!("[{}]", self.names().join(" ")))),
            other => Err(ControlError::InvalidQuery(other.to_owned())),
        }
    }

    fn write(&mut self, name: &str, text: &str) -> ControlResult<Parsed> {
        match self.node_mut(name)? {
            Node::Setting { locked: true, .. } => Err(ControlError::Locked(name.to_owned())),
            Node::Setting { value, .. } => {
                let previous = value.clone();
                value.assign(name, text)?;
                Ok(Parsed::Written {
                    name: name.to_owned(),
                    previous,
                })
            }
            Node::Monitor { .. } => Err(ControlError::ReadOnly(name.to_owned())),
            Node::Subtree(node) => node.parse(&format!("={text}")).map(Parsed::Reply),
        }
    }

    fn query(&mut self, name: &str, query: &str) -> ControlResult<String> {
        let node = self.node_mut(name)?;
        if let Node::Subtree(node) = node {
            return node.parse(&format!("?{query}"));
        }
        match (query, node) {
            ("" | "val", Node::Setting { value, .. }) => Ok(value.to_string()),
            ("" | "val", Node::Monitor { read, .. }) => Ok(read()),
            ("help", Node::Setting { help, .. } | Node::Monitor { help, .. }) => Ok(help.clone()),
            ("perm", Node::Setting { locked: true, .. }) => Ok("locked".to_owned()),
            ("perm", Node::Setting { .. }) => Ok("setting".to_owned()),
            ("perm", Node::Monitor { .. }) => Ok("monitor".to_owned()),
            _ => Err(ControlError::InvalidQuery(format!("{name}?{query}"))),
        }
    }

    /// `name = value` lines for every setting, in insertion order.
    fn dump(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(name, node)| match node {
                Node::Setting { value, .. } => Some(format!("{name} = {value}")),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn insert(&mut self, name: &str, node: Node) -> ControlResult<()> {
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || "=?.".contains(c)) {
            return Err(ControlError::UnknownVariable(name.to_owned()));
        }
        if self.contains(name) {
            return Err(ControlError::Duplicate(name.to_owned()));
        }
        self.entries.push((name.to_owned(), node));
        Ok(())
    }

    fn node(&self, name: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, node)| node)
    }

    fn node_mut(&mut self, name: &str) -> ControlResult<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| entry == name)
            .map(|(_, node)| node)
            .ok_or_else(|| ControlError::UnknownVariable(name.to_owned()))
    }
}

impl fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlTree")
            .field("entries", &self.names())
            .finish()
    }
}
