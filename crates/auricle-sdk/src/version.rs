use std::fmt;
use std::mem::size_of;

use num_complex::Complex32;
use thiserror::Error;

use crate::format::SignalFormat;
use crate::signal::{Spectrum, Waveform};

pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;
pub const VERSION_RELEASE: u8 = 0;

const LAYOUT_REAL: u8 = 0x01;
const LAYOUT_COMPLEX: u8 = 0x02;
const LAYOUT_WAVEFORM: u8 = 0x04;
const LAYOUT_SPECTRUM: u8 = 0x08;
const LAYOUT_FORMAT: u8 = 0x10;

/// Every layout check passed.
pub const LAYOUT_COMPLETE: u8 =
    LAYOUT_REAL | LAYOUT_COMPLEX | LAYOUT_WAVEFORM | LAYOUT_SPECTRUM | LAYOUT_FORMAT;

const fn flag(matches: bool, bit: u8) -> u8 {
    if matches {
        bit
    } else {
        0
    }
}

/// Bitmask of size checks over the types shared across the module boundary,
/// evaluated in the crate that calls it.
pub const fn layout_tag() -> u8 {
    let word = size_of::<usize>();
    flag(size_of::<f32>() == 4, LAYOUT_REAL)
        | flag(size_of::<Complex32>() == 8, LAYOUT_COMPLEX)
        | flag(size_of::<Waveform>() == 5 * word, LAYOUT_WAVEFORM)
        | flag(size_of::<Spectrum>() == 5 * word, LAYOUT_SPECTRUM)
        | flag(size_of::<SignalFormat>() == 24, LAYOUT_FORMAT)
}

/// Version tag exchanged before any module code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiVersion {
    pub major: u8,
    pub minor: u8,
    pub release: u8,
    pub layout: u8,
}

/// Version of the SDK this crate was compiled against.
pub const ABI_VERSION: AbiVersion = AbiVersion {
    major: VERSION_MAJOR,
    minor: VERSION_MINOR,
    release: VERSION_RELEASE,
    layout: layout_tag(),
};

impl AbiVersion {
    pub const fn pack(self) -> u32 {
        (self.major as u32) << 24
            | (self.minor as u32) << 16
            | (self.release as u32) << 8
            | self.layout as u32
    }

    pub const fn unpack(packed: u32) -> Self {
        Self {
            major: (packed >> 24) as u8,
            minor: (packed >> 16) as u8,
            release: (packed >> 8) as u8,
            layout: packed as u8,
        }
    }

    /// Checks that a module built with `module` can be hosted by `self`.
    /// Major and minor must agree and the module's layout mask must be
    /// complete.
    pub fn check_compatible(&self, module: AbiVersion) -> Result<(), VersionMismatch> {
        if self.major != module.major || self.minor != module.minor {
            return Err(VersionMismatch::Version {
                host: *self,
                module,
            });
        }
        let wrong = LAYOUT_COMPLETE ^ module.layout;
        if wrong != 0 {
            return Err(VersionMismatch::Layout {
                types: layout_names(wrong),
            });
        }
        Ok(())
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}rc{}", self.major, self.minor, self.release)
    }
}

fn layout_names(bits: u8) -> Vec<&'static str> {
    [
        (LAYOUT_REAL, "f32"),
        (LAYOUT_COMPLEX, "Complex32"),
        (LAYOUT_WAVEFORM, "Waveform"),
        (LAYOUT_SPECTRUM, "Spectrum"),
        (LAYOUT_FORMAT, "SignalFormat"),
    ]
    .into_iter()
    .filter(|(bit, _)| bits & bit != 0)
    .map(|(_, name)| name)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionMismatch {
    #[error("version conflict: host is {host}, module is {module}")]
    Version { host: AbiVersion, module: AbiVersion },
    #[error("invalid size of {}; the module was built with a different toolchain or SDK", .types.join(", "))]
    Layout { types: Vec<&'static str> },
}
