//! Metric names.
//!
//! Every counter the engine emits is named here so dashboards and tests agree
//! on spelling. Call sites use `metrics::counter!(NAME).increment(n)`.
//!
//! # Naming
//!
//! - prefix: `logan_`
//! - component: `engine_`
//! - suffix: `_total` for counters

// ─── label keys ─────────────────────────────────────────────────────

/// Warning kind label key (multiple_parents, orphan_children, ...)
pub const LABEL_WARNING_KIND: &str = "kind";

// ─── engine metrics ─────────────────────────────────────────────────

/// Lines delivered to the rule engine (counter)
pub const ENGINE_LINES_PROCESSED_TOTAL: &str = "logan_engine_lines_processed_total";

/// Bytes read from all sources (counter)
pub const ENGINE_BYTES_READ_TOTAL: &str = "logan_engine_bytes_read_total";

/// Objects that went through `create` (counter)
pub const ENGINE_OBJECTS_CREATED_TOTAL: &str = "logan_engine_objects_created_total";

/// `create` on an already created object, resolved by implicit destroy (counter)
pub const ENGINE_OBJECTS_RECREATED_TOTAL: &str = "logan_engine_objects_recreated_total";

/// Lines consumed from a stream blocked on a rendezvous because every stream was blocked (counter)
pub const ENGINE_FORCED_DISPATCH_TOTAL: &str = "logan_engine_forced_dispatch_total";

/// Receives still waiting for a send at end of parse (counter)
pub const ENGINE_SYNC_UNMATCHED_TOTAL: &str = "logan_engine_sync_unmatched_total";

/// Soft warnings reported to the sink (counter, label: kind)
pub const ENGINE_WARNINGS_TOTAL: &str = "logan_engine_warnings_total";
