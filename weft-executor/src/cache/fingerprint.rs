//! Invocation fingerprints.

use weft_core::registry::OpInputs;
use weft_core::store::ObjectRef;
use weft_core::types::{Digester, Fingerprint};

/// Hash of (canonical op name, input references) keying the run ledger.
pub(crate) fn fingerprint<'a, I>(op: &str, refs: I) -> Fingerprint
where
    I: IntoIterator<Item = (&'a str, &'a ObjectRef)>,
{
    keyed("run", op, refs)
}

/// Key of a refined output type in the cross-request type cache.
pub(crate) fn refinement_key<'a, I>(op: &str, refs: I) -> Fingerprint
where
    I: IntoIterator<Item = (&'a str, &'a ObjectRef)>,
{
    keyed("refine", op, refs)
}

/// Fingerprint of an invocation from content references of its inputs.
///
/// Used where nothing is written to the store (memo, folding); agrees with
/// [`fingerprint`] for content-addressed stores.
pub(crate) fn memo_key(op: &str, inputs: &OpInputs) -> Fingerprint {
    let refs: Vec<(&str, ObjectRef)> = inputs
        .iter()
        .map(|(name, output)| (name, output.reference()))
        .collect();
    fingerprint(op, refs.iter().map(|(name, r)| (*name, r)))
}

fn keyed<'a, I>(domain: &str, op: &str, refs: I) -> Fingerprint
where
    I: IntoIterator<Item = (&'a str, &'a ObjectRef)>,
{
    let mut digester = Digester::new(domain);
    digester.field(op);
    for (name, reference) in refs {
        digester.field(name).field(reference.digest());
    }
    Fingerprint::from_hex(digester.finish())
}
