use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::HostError;

/// Parsed form of `library[:instance][<config-file]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpecifier {
    pub library: String,
    pub instance: String,
    pub config_file: Option<PathBuf>,
}

impl ModuleSpecifier {
    pub fn new(library: impl Into<String>) -> Self {
        let library = library.into();
        Self {
            instance: library.clone(),
            library,
            config_file: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, HostError> {
        let (name, config_file) = match text.split_once('<') {
            Some((name, file)) => (name, Some(file.trim())),
            None => (text, None),
        };
        let (library, instance) = match name.split_once(':') {
            Some((library, instance)) => (library.trim(), instance.trim()),
            None => (name.trim(), ""),
        };
        if library.is_empty() {
            return Err(HostError::EmptyLibraryName);
        }
        let instance = if instance.is_empty() { library } else { instance };
        Ok(Self {
            library: library.to_owned(),
            instance: instance.to_owned(),
            config_file: config_file
                .filter(|file| !file.is_empty())
                .map(PathBuf::from),
        })
    }
}

impl FromStr for ModuleSpecifier {
    type Err = HostError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.library)?;
        if self.instance != self.library {
            write!(f, ":{}", self.instance)?;
        }
        if let Some(file) = &self.config_file {
            write!(f, "<{}", file.display())?;
        }
        Ok(())
    }
}
