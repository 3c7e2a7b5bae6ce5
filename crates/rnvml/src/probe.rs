//! Version probe: bind every operation to the newest symbol the loaded
//! library exports.

use tracing::{debug, trace};

use crate::dl::{DlError, SymbolSource};
use crate::symbols::{Binding, ResolutionTable, DESCRIPTORS};

/// Summary of one probe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Operations bound to something newer than their default candidate.
    pub upgraded: usize,
    /// Operations with no candidate exported at all.
    pub missing: usize,
}

/// Walk every descriptor's candidates oldest → newest, rebinding on each hit.
///
/// Later hits overwrite earlier ones, so the table ends up holding the newest
/// exported version. Absent symbols leave the current binding alone; a lookup
/// fault aborts the probe.
pub fn probe<S: SymbolSource + ?Sized>(
    library: &S,
    table: &mut ResolutionTable,
) -> Result<ProbeSummary, DlError> {
    let mut summary = ProbeSummary::default();

    for descriptor in DESCRIPTORS.iter() {
        for candidate in descriptor.candidates {
            match library.lookup(candidate.symbol)? {
                Some(symbol) => {
                    table.rebind(descriptor.operation, Binding::resolved(candidate, symbol));
                }
                None => trace!("symbol {} not exported", candidate.symbol),
            }
        }

        let binding = table.resolve(descriptor.operation);
        if !binding.is_resolved() {
            summary.missing += 1;
            debug!("{:?}: no candidate exported", descriptor.operation);
        } else if binding.version() != descriptor.default_candidate().version {
            summary.upgraded += 1;
            debug!(
                "{:?}: bound to {} ({:?})",
                descriptor.operation,
                binding.symbol_name(),
                binding.version()
            );
        }
    }

    Ok(summary)
}
