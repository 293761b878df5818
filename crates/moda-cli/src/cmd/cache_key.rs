//! `moda cache-key`: compute the cache key an integration would use for a
//! request.

use anyhow::Result;
use clap::Args;
use moda_core::error::ErrorCode;
use moda_core::integration::CacheKeyBuilder;
use serde::Serialize;
use std::io::Write;

use crate::output::{CliError, OutputMode, fail, render};

#[derive(Args, Debug)]
pub struct CacheKeyArgs {
    /// Integration namespace (e.g. `azdo`).
    pub namespace: String,

    /// Operation name (e.g. `work-items`).
    pub operation: String,

    /// Single-valued parameter as NAME=VALUE (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// List parameter as NAME=V1,V2,... (repeatable).
    #[arg(long = "list", value_name = "NAME=V1,V2")]
    pub lists: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CacheKeyReport {
    key: String,
    namespace: String,
    operation: String,
    fingerprint: String,
    canonical: String,
}

/// Execute `moda cache-key`. Needs no store.
///
/// # Errors
///
/// Returns an error for malformed parameters or a blank namespace/operation.
pub fn run_cache_key(args: &CacheKeyArgs, output: OutputMode) -> Result<()> {
    let builder = match build(args) {
        Ok(builder) => builder,
        Err(message) => return fail(output, &CliError::new(message)),
    };
    let canonical = builder.canonical_params();

    let key = match builder.build() {
        Ok(key) => key,
        Err(err) => return fail(output, &CliError::coded(ErrorCode::InvalidCacheKey, err.to_string())),
    };

    let report = CacheKeyReport {
        key: key.to_string(),
        namespace: key.namespace,
        operation: key.operation,
        fingerprint: key.fingerprint,
        canonical,
    };
    render(output, &report, |r, w| writeln!(w, "{}", r.key))
}

fn build(args: &CacheKeyArgs) -> Result<CacheKeyBuilder, String> {
    let mut builder = CacheKeyBuilder::new(&args.namespace).operation(&args.operation);
    for raw in &args.params {
        let (name, value) = split_pair(raw)?;
        builder = builder.param(name, value);
    }
    for raw in &args.lists {
        let (name, values) = split_pair(raw)?;
        builder = builder.param_list(name, values.split(','));
    }
    Ok(builder)
}

fn split_pair(raw: &str) -> Result<(&str, &str), String> {
    raw.split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}
