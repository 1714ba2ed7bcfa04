use std::fmt;

use serde::{Deserialize, Serialize};

/// Representation carried by a module's input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Waveform,
    Spectrum,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Waveform => "waveform",
            Domain::Spectrum => "spectrum",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal dimensions exchanged between the host and a module during
/// preparation.
///
/// `wndlen` and `fftlen` only carry meaning in the spectral domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalFormat {
    pub channels: u32,
    pub domain: Domain,
    pub fragsize: u32,
    pub wndlen: u32,
    pub fftlen: u32,
    pub srate: f32,
}

impl SignalFormat {
    pub fn waveform(channels: u32, fragsize: u32, srate: f32) -> Self {
        Self {
            channels,
            domain: Domain::Waveform,
            fragsize,
            wndlen: 0,
            fftlen: 0,
            srate,
        }
    }

    pub fn spectrum(channels: u32, fragsize: u32, srate: f32, fftlen: u32, wndlen: u32) -> Self {
        Self {
            channels,
            domain: Domain::Spectrum,
            fragsize,
            wndlen,
            fftlen,
            srate,
        }
    }

    /// Number of frequency bins of a spectral block, `fftlen / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.fftlen as usize / 2 + 1
    }

    /// Returns every field in which `available` differs from `self`, in
    /// reporting order. Window and FFT length are only compared when the
    /// required domain is spectral.
    pub fn mismatches(&self, available: &SignalFormat) -> Vec<FormatMismatch> {
        let mut found = Vec::new();
        if self.channels != available.channels {
            found.push(FormatMismatch::Channels {
                required: self.channels,
                available: available.channels,
            });
        }
        if self.domain != available.domain {
            found.push(FormatMismatch::Domain {
                required: self.domain,
                available: available.domain,
            });
        }
        if self.fragsize != available.fragsize {
            found.push(FormatMismatch::Fragsize {
                required: self.fragsize,
                available: available.fragsize,
            });
        }
        if self.srate != available.srate {
            found.push(FormatMismatch::Srate {
                required: self.srate,
                available: available.srate,
            });
        }
        if self.domain == Domain::Spectrum {
            if self.fftlen != available.fftlen {
                found.push(FormatMismatch::Fftlen {
                    required: self.fftlen,
                    available: available.fftlen,
                });
            }
            if self.wndlen != available.wndlen {
                found.push(FormatMismatch::Wndlen {
                    required: self.wndlen,
                    available: available.wndlen,
                });
            }
        }
        found
    }

    /// Equality as used by negotiation.
    pub fn matches(&self, other: &SignalFormat) -> bool {
        self.mismatches(other).is_empty()
    }
}

impl Default for SignalFormat {
    fn default() -> Self {
        Self::waveform(1, 200, 44_100.0)
    }
}

/// A single field that differs between a required and an available format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatMismatch {
    Channels { required: u32, available: u32 },
    Domain { required: Domain, available: Domain },
    Fragsize { required: u32, available: u32 },
    Srate { required: f32, available: f32 },
    Fftlen { required: u32, available: u32 },
    Wndlen { required: u32, available: u32 },
}

impl FormatMismatch {
    pub fn field(&self) -> &'static str {
        match self {
            FormatMismatch::Channels { .. } => "channels",
            FormatMismatch::Domain { .. } => "domain",
            FormatMismatch::Fragsize { .. } => "fragsize",
            FormatMismatch::Srate { .. } => "srate",
            FormatMismatch::Fftlen { .. } => "fftlen",
            FormatMismatch::Wndlen { .. } => "wndlen",
        }
    }
}

impl fmt::Display for FormatMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatMismatch::Channels {
                required,
                available,
            } => write!(f, "{required} channels required, {available} available."),
            FormatMismatch::Domain {
                required,
                available,
            } => write!(f, "domain {required} required, {available} available."),
            FormatMismatch::Fragsize {
                required,
                available,
            } => write!(
                f,
                "a fragsize of {required} samples required, {available} available."
            ),
            FormatMismatch::Srate {
                required,
                available,
            } => write!(
                f,
                "a sample rate of {required} Hz required, {available} Hz available."
            ),
            FormatMismatch::Fftlen {
                required,
                available,
            } => write!(
                f,
                "a FFT length of {required} samples required, {available} available."
            ),
            FormatMismatch::Wndlen {
                required,
                available,
            } => write!(
                f,
                "a window length of {required} samples required, {available} available."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_comparison_ignores_window_fields() {
        let a = SignalFormat::waveform(2, 64, 16_000.0);
        let mut b = a;
        b.fftlen = 512;
        b.wndlen = 400;
        assert!(a.matches(&b));
    }

    #[test]
    fn spectrum_comparison_checks_window_fields() {
        let a = SignalFormat::spectrum(2, 64, 16_000.0, 256, 128);
        let mut b = a;
        b.wndlen = 192;
        let found = a.mismatches(&b);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field(), "wndlen");
    }

    #[test]
    fn mismatches_are_reported_in_field_order() {
        let required = SignalFormat::waveform(2, 64, 16_000.0);
        let available = SignalFormat::spectrum(1, 32, 16_000.0, 64, 64);
        let fields: Vec<_> = required
            .mismatches(&available)
            .iter()
            .map(FormatMismatch::field)
            .collect();
        assert_eq!(fields, vec!["channels", "domain", "fragsize"]);
    }

    #[test]
    fn mismatch_messages_name_both_values() {
        let mismatch = FormatMismatch::Domain {
            required: Domain::Waveform,
            available: Domain::Spectrum,
        };
        assert_eq!(
            mismatch.to_string(),
            "domain waveform required, spectrum available."
        );
    }
}
