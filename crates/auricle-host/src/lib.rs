//! Loading and negotiation layer of the Auricle host.
//!
//! [`ModuleLoader`] turns a specifier such as `gain:left<left.cfg` into a
//! running module instance, negotiates its signal format and dispatches
//! block processing to the callback matching the negotiated domains.
//! [`DriverLibrary`] does the same for audio drivers. Both resolve names
//! through [`LibraryResolver`], which consults the static registry before
//! opening shared objects from the search path.

mod chain;
mod compare;
mod driver;
mod error;
mod library;
mod loader;
mod specifier;

pub use chain::ProcessingChain;
pub use compare::compare_formats;
pub use driver::DriverLibrary;
pub use error::{HostError, Result};
pub use library::{LibraryOrigin, LibraryResolver, LIBRARY_PATH_ENV};
pub use loader::{ModuleLoader, Negotiation};
pub use specifier::ModuleSpecifier;
