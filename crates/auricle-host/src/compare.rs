use auricle_sdk::SignalFormat;

use crate::error::{HostError, Result};

/// Fails when `available` differs from `required` in any field negotiation
/// cares about. `prefix` names the link being checked in the message.
pub fn compare_formats(
    required: &SignalFormat,
    available: &SignalFormat,
    prefix: &str,
) -> Result<()> {
    let mismatches = required.mismatches(available);
    if mismatches.is_empty() {
        return Ok(());
    }
    Err(HostError::FormatMismatch {
        prefix: prefix.to_owned(),
        mismatches,
    })
}
