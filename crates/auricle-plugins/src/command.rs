use auricle_sdk::{ModuleError, ModuleResult};

/// One parameter command, split at the first `=` or `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Write { name: &'a str, value: &'a str },
    Query { name: &'a str, query: &'a str },
}

impl<'a> Command<'a> {
    pub(crate) fn split(command: &'a str) -> Self {
        let command = command.trim();
        let at = command
            .find(|c| c == '=' || c == '?')
            .unwrap_or(command.len());
        let (name, operation) = command.split_at(at);
        let name = name.trim();
        match operation.strip_prefix('=') {
            Some(value) => Command::Write {
                name,
                value: value.trim(),
            },
            None => Command::Query {
                name,
                query: operation.strip_prefix('?').unwrap_or(operation),
            },
        }
    }
}

/// Elements of `[a b c]`. A value without brackets is a single element.
pub(crate) fn list(text: &str) -> ModuleResult<Vec<&str>> {
    let text = text.trim();
    let inner = match (text.strip_prefix('['), text.ends_with(']')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (None, false) => text,
        _ => {
            return Err(ModuleError::msg(format!(
                "Unbalanced brackets in \"{text}\"."
            )))
        }
    };
    Ok(inner
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|item| !item.is_empty())
        .collect())
}

pub(crate) fn float_list(name: &str, text: &str) -> ModuleResult<Vec<f32>> {
    list(text)?
        .into_iter()
        .map(|item| {
            item.parse().map_err(|_| ModuleError::InvalidValue {
                name: name.to_owned(),
                value: text.to_owned(),
                reason: format!("\"{item}\" is not a number"),
            })
        })
        .collect()
}

pub(crate) fn float(name: &str, text: &str) -> ModuleResult<f32> {
    text.trim().parse().map_err(|_| ModuleError::InvalidValue {
        name: name.to_owned(),
        value: text.to_owned(),
        reason: "not a number".to_owned(),
    })
}

pub(crate) fn render_list<T: ToString>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(" "))
}
