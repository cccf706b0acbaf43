// ABOUTME: Maps AlgorithmOptions onto russh's negotiation preferences.
// ABOUTME: Requested names are matched against what russh supports, in request order.

use crate::ssh::config::AlgorithmOptions;
use crate::ssh::error::TransportError;
use russh::Preferred;
use std::borrow::Cow;

/// Build the russh preference lists for `options`.
pub(crate) fn preferred(options: &AlgorithmOptions) -> Result<Preferred, TransportError> {
    let defaults = Preferred::DEFAULT;
    Ok(Preferred {
        kex: select("kex", &options.kex, &defaults.kex, |n| AsRef::<str>::as_ref(n))?,
        key: select("hostkey", &options.hostkey, &defaults.key, |a| a.as_str())?,
        cipher: select("cipher", &options.cipher, &defaults.cipher, |n| AsRef::<str>::as_ref(n))?,
        mac: select("mac", &options.mac, &defaults.mac, |n| AsRef::<str>::as_ref(n))?,
        compression: select(
            "compression",
            &options.compression,
            &defaults.compression,
            |n| AsRef::<str>::as_ref(n),
        )?,
        ..defaults
    })
}

/// Pick the supported algorithms named in `requested`, keeping request order.
///
/// An empty request keeps `supported` as is. Unknown names are skipped; a
/// request that matches nothing is an error.
fn select<N, F>(
    slot: &str,
    requested: &[String],
    supported: &[N],
    name: F,
) -> Result<Cow<'static, [N]>, TransportError>
where
    N: Clone,
    F: Fn(&N) -> &str,
{
    if requested.is_empty() {
        return Ok(Cow::Owned(supported.to_vec()));
    }

    let mut chosen = Vec::new();
    for wanted in requested {
        match supported.iter().find(|alg| name(alg) == wanted.as_str()) {
            Some(alg) => chosen.push(alg.clone()),
            None => tracing::warn!("Ignoring unsupported {} algorithm: {}", slot, wanted),
        }
    }

    if chosen.is_empty() {
        return Err(TransportError::Config(format!(
            "none of the requested {} algorithms are supported: {}",
            slot,
            requested.join(", ")
        )));
    }
    Ok(Cow::Owned(chosen))
}
