//! Optional logging bootstrap. The library itself never calls this —
//! every `log::debug!`/`warn!` call here and in `providers/*` goes through
//! whatever subscriber the host process installs; this is just a
//! ready-made one for callers who don't already have their own, built on
//! `logforth`'s builder/dispatch/`EnvFilter`.

use std::str::FromStr;
use std::sync::Once;

use logforth::append::Stderr;
use logforth::filter::EnvFilter;

static INIT: Once = Once::new();

/// Installs a colored stderr logger filtered by `directive` (an
/// `env_logger`-style filter string, e.g. `"info"` or
/// `"llm_client=debug,warn"`). Idempotent: only the first call in a
/// process takes effect.
pub fn init_logging(directive: &str) {
    let directive = directive.to_owned();
    INIT.call_once(move || {
        let filter = EnvFilter::from_str(&directive).unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter is valid"));
        logforth::builder()
            .dispatch(move |d| d.filter(filter).append(Stderr::default()))
            .apply();
    });
}
