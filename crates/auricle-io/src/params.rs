use crate::error::DriverError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Param {
    Text(String),
    Count(u64),
    Flag(bool),
}

impl Param {
    fn assign(&mut self, name: &str, text: &str) -> Result<(), DriverError> {
        let invalid = |reason| DriverError::InvalidValue {
            name: name.to_owned(),
            value: text.to_owned(),
            reason,
        };
        match self {
            Param::Text(value) => *value = text.to_owned(),
            Param::Count(value) => {
                *value = text
                    .parse()
                    .map_err(|_| invalid("expected a non-negative integer"))?;
            }
            Param::Flag(value) => {
                *value = match text {
                    "yes" | "true" | "1" => true,
                    "no" | "false" | "0" => false,
                    _ => return Err(invalid("expected yes or no")),
                }
            }
        }
        Ok(())
    }

    fn render(&self) -> String {
        match self {
            Param::Text(value) => value.clone(),
            Param::Count(value) => value.to_string(),
            Param::Flag(true) => "yes".to_owned(),
            Param::Flag(false) => "no".to_owned(),
        }
    }
}

struct Entry {
    name: &'static str,
    help: &'static str,
    value: Param,
}

/// Driver parameters, writable until the driver is prepared.
#[derive(Default)]
pub(crate) struct Params {
    entries: Vec<Entry>,
    locked: bool,
}

impl Params {
    pub(crate) fn with(mut self, name: &'static str, help: &'static str, value: Param) -> Self {
        self.entries.push(Entry { name, help, value });
        self
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn text(&self, name: &str) -> &str {
        match self.get(name) {
            Some(Param::Text(value)) => value,
            _ => "",
        }
    }

    pub(crate) fn count(&self, name: &str) -> u64 {
        match self.get(name) {
            Some(Param::Count(value)) => *value,
            _ => 0,
        }
    }

    pub(crate) fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Param::Flag(true)))
    }

    /// Handles `name=value`, `name?`, `name?help`, `?` and `?ls`.
    pub(crate) fn parse(&mut self, command: &str) -> Result<String, DriverError> {
        let command = command.trim();
        let split = command
            .find(|c| c == '=' || c == '?')
            .unwrap_or(command.len());
        let (name, operation) = command.split_at(split);
        let name = name.trim();

        if name.is_empty() {
            return match operation {
                "?" => Ok(self
                    .entries
                    .iter()
                    .map(|entry| format!("{} = {}", entry.name, entry.value.render()))
                    .collect::<Vec<_>>()
                    .join("\n")),
                "?ls" => Ok(format!(
                    "[{}]",
                    self.entries
                        .iter()
                        .map(|entry| entry.name)
                        .collect::<Vec<_>>()
                        .join(" ")
                )),
                other => Err(DriverError::InvalidQuery(other.to_owned())),
            };
        }

        let locked = self.locked;
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.name == name)
            .ok_or_else(|| DriverError::UnknownParameter(name.to_owned()))?;
        if let Some(text) = operation.strip_prefix('=') {
            if locked {
                return Err(DriverError::Locked(name.to_owned()));
            }
            entry.value.assign(name, text.trim())?;
            return Ok(String::new());
        }
        match operation {
            "" | "?" | "?val" => Ok(entry.value.render()),
            "?help" => Ok(entry.help.to_owned()),
            "?perm" if locked => Ok("locked".to_owned()),
            "?perm" => Ok("setting".to_owned()),
            other => Err(DriverError::InvalidQuery(format!("{name}{other}"))),
        }
    }

    fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }
}
