use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use auricle_sdk::{
    symbols, AbiVersion, DriverExport, DriverFactory, ModuleContext, ModuleDescriptor,
    ModuleExport, ModuleFactory, Registry, ABI_VERSION,
};
use libloading::{Library, Symbol};

use crate::error::{HostError, Result};

/// Environment variable holding extra library directories.
pub const LIBRARY_PATH_ENV: &str = "AURICLE_LIBRARY_PATH";

type VersionFn = unsafe extern "C" fn() -> u32;
type ModuleEntryFn = fn() -> ModuleExport;
type DriverEntryFn = fn() -> DriverExport;

/// Where an instantiated module or driver came from. Dynamic libraries stay
/// mapped for as long as this value lives.
#[derive(Clone)]
pub enum LibraryOrigin {
    Registry,
    Dynamic { path: PathBuf, library: Arc<Library> },
}

impl LibraryOrigin {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LibraryOrigin::Registry => None,
            LibraryOrigin::Dynamic { path, .. } => Some(path),
        }
    }
}

impl fmt::Debug for LibraryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryOrigin::Registry => f.write_str("Registry"),
            LibraryOrigin::Dynamic { path, .. } => {
                f.debug_tuple("Dynamic").field(path).finish()
            }
        }
    }
}

/// Resolves library names against the static registry first and the search
/// path second.
#[derive(Clone)]
pub struct LibraryResolver {
    registry: Arc<Registry>,
    search_path: Vec<PathBuf>,
}

impl LibraryResolver {
    /// Resolver over `registry` with the default search path: the
    /// directories in `AURICLE_LIBRARY_PATH` followed by the per-user module
    /// directory.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            search_path: default_search_path(),
        }
    }

    /// Rebuilds the resolver a module was created from.
    pub fn from_context(context: &ModuleContext) -> Self {
        Self {
            registry: Arc::clone(&context.registry),
            search_path: context.library_path.clone(),
        }
    }

    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Puts `dirs` in front of the current search path.
    pub fn prepend_search_dirs(&mut self, dirs: impl IntoIterator<Item = PathBuf>) {
        let mut search_path: Vec<PathBuf> = dirs.into_iter().collect();
        search_path.append(&mut self.search_path);
        self.search_path = search_path;
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Finds the shared object for `name`. A name containing a path
    /// separator is taken as a path.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.components().count() > 1 {
            return direct.is_file().then(|| direct.to_path_buf());
        }
        let file_name = libloading::library_filename(name);
        self.search_path
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    /// Creates the context handed to modules resolved through `self`.
    pub fn context(&self, context: ModuleContext) -> ModuleContext {
        context
            .with_registry(Arc::clone(&self.registry))
            .with_library_path(self.search_path.clone())
    }

    pub(crate) fn module_factory(
        &self,
        name: &str,
    ) -> Result<FactoryHandle<'_, dyn ModuleFactory + '_>> {
        if let Some(factory) = self.registry.module(name) {
            return Ok(FactoryHandle::Static(factory));
        }
        let path = self.require(name)?;
        let library = open(&path)?;
        check_version(&library, name, symbols::MODULE_VERSION)?;
        let factory = {
            let entry: Symbol<'_, ModuleEntryFn> = unsafe { library.get(symbols::MODULE_ENTRY) }
                .map_err(|_| missing_entry(name, symbols::MODULE_ENTRY))?;
            entry().into_factory()
        };
        tracing::debug!(library = name, path = %path.display(), "loaded module library");
        Ok(FactoryHandle::Dynamic {
            factory,
            origin: LibraryOrigin::Dynamic {
                path,
                library: Arc::new(library),
            },
        })
    }

    pub(crate) fn driver_factory(
        &self,
        name: &str,
    ) -> Result<FactoryHandle<'_, dyn DriverFactory + '_>> {
        if let Some(factory) = self.registry.driver(name) {
            return Ok(FactoryHandle::Static(factory));
        }
        let path = self.require(name)?;
        let library = open(&path)?;
        check_version(&library, name, symbols::DRIVER_VERSION)?;
        let factory = {
            let entry: Symbol<'_, DriverEntryFn> = unsafe { library.get(symbols::DRIVER_ENTRY) }
                .map_err(|_| missing_entry(name, symbols::DRIVER_ENTRY))?;
            entry().into_factory()
        };
        tracing::debug!(library = name, path = %path.display(), "loaded driver library");
        Ok(FactoryHandle::Dynamic {
            factory,
            origin: LibraryOrigin::Dynamic {
                path,
                library: Arc::new(library),
            },
        })
    }

    fn require(&self, name: &str) -> Result<PathBuf> {
        self.locate(name).ok_or_else(|| HostError::LibraryNotFound {
            name: name.to_owned(),
            searched: self.search_path.clone(),
        })
    }
}

impl fmt::Debug for LibraryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryResolver")
            .field("modules", &self.registry.module_names())
            .field("drivers", &self.registry.driver_names())
            .field("search_path", &self.search_path)
            .finish()
    }
}

/// A factory borrowed from the registry or owned by a freshly opened
/// library. The owned factory is declared before the origin so it is
/// dropped while the library is still mapped.
pub(crate) enum FactoryHandle<'r, F: ?Sized + 'r> {
    Static(&'r F),
    Dynamic { factory: Box<F>, origin: LibraryOrigin },
}

impl<'r, F: ?Sized + 'r> FactoryHandle<'r, F> {
    pub(crate) fn factory(&self) -> &F {
        match self {
            FactoryHandle::Static(factory) => factory,
            FactoryHandle::Dynamic { factory, .. } => factory,
        }
    }

    /// Drops an owned factory and keeps its library mapped.
    pub(crate) fn into_origin(self) -> LibraryOrigin {
        match self {
            FactoryHandle::Static(_) => LibraryOrigin::Registry,
            FactoryHandle::Dynamic { factory, origin } => {
                drop(factory);
                origin
            }
        }
    }
}

/// Resolves the factory, instantiates with `create` and returns the instance
/// together with the descriptor and the keep-alive origin.
pub(crate) fn instantiate<F, T>(
    handle: FactoryHandle<'_, F>,
    create: impl FnOnce(&F) -> Result<T>,
) -> Result<(T, ModuleDescriptor, LibraryOrigin)>
where
    F: ?Sized + Describe,
{
    let descriptor = handle.factory().describe();
    let instance = create(handle.factory())?;
    Ok((instance, descriptor, handle.into_origin()))
}

/// Common access to the descriptor of module and driver factories.
pub(crate) trait Describe {
    fn describe(&self) -> ModuleDescriptor;
}

impl<'a> Describe for dyn ModuleFactory + 'a {
    fn describe(&self) -> ModuleDescriptor {
        self.descriptor()
    }
}

impl<'a> Describe for dyn DriverFactory + 'a {
    fn describe(&self) -> ModuleDescriptor {
        self.descriptor()
    }
}

fn open(path: &Path) -> Result<Library> {
    unsafe { Library::new(path) }.map_err(|source| HostError::LibraryLoad {
        path: path.to_path_buf(),
        source,
    })
}

fn check_version(library: &Library, name: &str, symbol: &[u8]) -> Result<()> {
    let version: Symbol<'_, VersionFn> =
        unsafe { library.get(symbol) }.map_err(|_| missing_entry(name, symbol))?;
    let module = AbiVersion::unpack(unsafe { version() });
    ABI_VERSION
        .check_compatible(module)
        .map_err(|reason| HostError::IncompatibleVersion {
            library: name.to_owned(),
            reason,
        })
}

fn missing_entry(name: &str, symbol: &[u8]) -> HostError {
    let symbol = symbol.strip_suffix(b"\0").unwrap_or(symbol);
    HostError::MissingEntry {
        library: name.to_owned(),
        symbol: String::from_utf8_lossy(symbol).into_owned(),
    }
}

fn default_search_path() -> Vec<PathBuf> {
    let mut search_path: Vec<PathBuf> = env::var_os(LIBRARY_PATH_ENV)
        .map(|value| env::split_paths(&value).collect())
        .unwrap_or_default();
    if let Some(data) = dirs::data_local_dir() {
        search_path.push(data.join("auricle").join("modules"));
    }
    search_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_library_reports_the_search_path() {
        let resolver = LibraryResolver::new(Arc::new(Registry::new()))
            .with_search_path(vec![PathBuf::from("/nonexistent/auricle")]);
        let err = resolver
            .module_factory("nothing_here")
            .err()
            .expect("not found");
        match err {
            HostError::LibraryNotFound { name, searched } => {
                assert_eq!(name, "nothing_here");
                assert_eq!(searched, vec![PathBuf::from("/nonexistent/auricle")]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn prepended_dirs_are_searched_first() {
        let mut resolver = LibraryResolver::new(Arc::new(Registry::new()))
            .with_search_path(vec![PathBuf::from("b")]);
        resolver.prepend_search_dirs([PathBuf::from("a")]);
        assert_eq!(
            resolver.search_path(),
            &[PathBuf::from("a"), PathBuf::from("b")]
        );
    }

    #[test]
    fn garbage_file_fails_to_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_name = libloading::library_filename("broken");
        std::fs::write(dir.path().join(&file_name), b"not a shared object").expect("write");
        let resolver = LibraryResolver::new(Arc::new(Registry::new()))
            .with_search_path(vec![dir.path().to_path_buf()]);
        assert!(matches!(
            resolver.module_factory("broken").err(),
            Some(HostError::LibraryLoad { .. })
        ));
    }
}
