//! Structured observability hooks for configuration lifecycle events.
//!
//! This module provides:
//! - Reload-scoped tracing spans via the `ReloadSpan` RAII guard
//! - Emission functions for checkins, merge conflicts, validation, partial
//!   fallback and GC
//!
//! Events are emitted at `info!` level unless noted; filter with `RUST_LOG`.

use tracing::{info, warn};

/// RAII guard that enters a reload-scoped span.
///
/// ```ignore
/// let _span = ReloadSpan::enter("partial-refresh");
/// // merge and validation events now carry trigger = "partial-refresh"
/// ```
pub struct ReloadSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReloadSpan {
    pub fn enter(trigger: &str) -> Self {
        let span = tracing::info_span!("pipeconf.reload", trigger = %trigger);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_revision_checked_in(md5: &str, commit: Option<&str>, user: &str) {
    info!(
        event = "revision.checked_in",
        md5 = %md5,
        commit = commit.unwrap_or("unchanged"),
        user = %user,
        created = commit.is_some(),
    );
}

/// Warning level: an editor has to refresh.
pub fn emit_merge_conflict(base_md5: &str) {
    warn!(event = "revision.merge_conflict", base_md5 = %base_md5);
}

pub fn emit_validation_completed(pipelines: usize, errors: usize, valid: bool) {
    info!(
        event = "validation.completed",
        pipelines = pipelines,
        errors = errors,
        valid = valid,
    );
}

/// Warning level: the merge aborted on a cycle or missing reference.
pub fn emit_graph_rejected(error: &dyn std::fmt::Display) {
    warn!(event = "validation.graph_rejected", error = %error);
}

/// Warning level: the last-known partials were replaced by the last-valid set.
pub fn emit_partials_fallback(known: usize, valid: usize, primary_errors: usize) {
    warn!(
        event = "partials.fallback",
        last_known = known,
        last_valid = valid,
        primary_errors = primary_errors,
    );
}

pub fn emit_gc_completed(ran: bool, loose_objects: u64) {
    info!(event = "store.gc", ran = ran, loose_objects = loose_objects);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_span_enters_without_subscriber() {
        let _span = ReloadSpan::enter("test");
        emit_validation_completed(3, 0, true);
        emit_revision_checked_in("md5", None, "admin");
    }
}
