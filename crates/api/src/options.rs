//! Transport-level query parameters of the JSON-RPC endpoint.
//!
//! ```text
//! signature  base64 HMAC of the body (required)
//! async      enqueue for the worker instead of running inline
//! tmpdir     workspace identifier, or an absolute path override
//! log        write request, result and environment to jsonrpc.log
//! diag       return a diagnostics report instead of executing
//! ```
//!
//! A key given more than once keeps its first value; unknown keys are
//! ignored. Parsing never fails, so every rejection downstream carries a
//! JSON-RPC error code.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayOptions {
    pub signature: Option<String>,
    pub run_async: Option<String>,
    pub tmpdir: Option<String>,
    pub log: Option<String>,
    pub diag: Option<String>,
}

impl GatewayOptions {
    /// Build options from decoded query pairs, first value per key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "signature" => &mut options.signature,
                "async" => &mut options.run_async,
                "tmpdir" => &mut options.tmpdir,
                "log" => &mut options.log,
                "diag" => &mut options.diag,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        options
    }

    pub fn is_async(&self) -> bool {
        is_set(self.run_async.as_deref())
    }

    pub fn wants_log(&self) -> bool {
        is_set(self.log.as_deref())
    }

    pub fn wants_diagnostics(&self) -> bool {
        is_set(self.diag.as_deref())
    }

    /// Requested workspace, ignoring blank values.
    pub fn workspace(&self) -> Option<&str> {
        self.tmpdir.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A flag is on when present with a value other than blank, `0` or `false`.
fn is_set(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(v) => !v.eq_ignore_ascii_case("false"),
    }
}
