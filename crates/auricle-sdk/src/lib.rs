//! Auricle SDK
//! ===========
//!
//! Types shared between the Auricle host and the processing modules and
//! audio drivers it loads: signal formats and blocks, the algorithm
//! communication space, the [`Module`] and [`Driver`] traits, and the export
//! macros used by dynamically loaded libraries.

pub mod ac;
mod driver;
mod format;
mod module;
mod registry;
mod signal;
mod version;

pub use ac::{
    AcAddress, AcBuffer, AcDataType, AcElement, AcError, AcSpace, AcVariable, AcView,
    SpectrumView, StructureGate, WaveformView,
};
pub use driver::{
    Driver, DriverContext, DriverFactory, DriverResult, ErrorCode, FnDriverFactory, StreamEvents,
};
pub use format::{Domain, FormatMismatch, SignalFormat};
pub use module::{
    Capabilities, Configurable, FnModuleFactory, Module, ModuleContext, ModuleDescriptor,
    ModuleError, ModuleFactory, ModuleResult, SpecToSpec, SpecToWave, Transition, WaveToSpec,
    WaveToWave,
};
pub use num_complex::Complex32;
pub use registry::{DriverExport, ModuleExport, Registry};
pub use signal::{SignalMut, Spectrum, Waveform};
pub use version::{
    layout_tag, AbiVersion, VersionMismatch, ABI_VERSION, LAYOUT_COMPLETE, VERSION_MAJOR,
    VERSION_MINOR, VERSION_RELEASE,
};

/// Symbol names looked up in dynamic libraries.
pub mod symbols {
    pub const MODULE_VERSION: &[u8] = b"auricle_module_version\0";
    pub const MODULE_ENTRY: &[u8] = b"auricle_module_entry\0";
    pub const DRIVER_VERSION: &[u8] = b"auricle_driver_version\0";
    pub const DRIVER_ENTRY: &[u8] = b"auricle_driver_entry\0";
}

/// Common imports for module and driver authors.
pub mod prelude {
    pub use crate::{
        AcBuffer, AcDataType, AcSpace, AcVariable, Capabilities, Complex32, Configurable, Domain,
        Driver, DriverContext, DriverFactory, DriverResult, ErrorCode, Module, ModuleContext,
        ModuleDescriptor, ModuleError, ModuleFactory, ModuleResult, SignalFormat, SpecToSpec,
        SpecToWave, Spectrum, StreamEvents, WaveToSpec, WaveToWave, Waveform,
    };
}

/// Declare the entry points of a dynamic module library.
///
/// The macro expects an expression evaluating to a type implementing
/// [`ModuleFactory`]. It exports the version tag, checked by the host before
/// anything else, and the entry point returning the factory.
///
/// # Example
///
/// ```ignore
/// use auricle_sdk::{declare_auricle_module, ModuleFactory};
///
/// struct MyFactory;
///
/// impl ModuleFactory for MyFactory { /* ... */ }
///
/// declare_auricle_module!(MyFactory);
/// ```
#[macro_export]
macro_rules! declare_auricle_module {
    ($factory:expr) => {
        #[no_mangle]
        pub extern "C" fn auricle_module_version() -> u32 {
            $crate::ABI_VERSION.pack()
        }

        #[no_mangle]
        pub fn auricle_module_entry() -> $crate::ModuleExport {
            $crate::ModuleExport::new(Box::new($factory))
        }
    };
}

/// Declare the entry points of a dynamic driver library.
#[macro_export]
macro_rules! declare_auricle_driver {
    ($factory:expr) => {
        #[no_mangle]
        pub extern "C" fn auricle_driver_version() -> u32 {
            $crate::ABI_VERSION.pack()
        }

        #[no_mangle]
        pub fn auricle_driver_entry() -> $crate::DriverExport {
            $crate::DriverExport::new(Box::new($factory))
        }
    };
}
