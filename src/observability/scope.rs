//! ObservationScope for begin/complete logging around one operation
//!
//! - `{name}_BEGIN` on creation (INFO)
//! - `{name}_COMPLETE` from `complete` (INFO)
//! - `{name}_FAILED` from `fail` (ERROR)
//! - `{name}_INCOMPLETE` when dropped unfinished (WARN)

use std::time::Instant;

use super::logger::{Logger, Severity};

/// Logs the lifecycle of one operation. Owns its fields so it can live
/// inside a stream state across await points.
#[derive(Debug)]
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    enabled: bool,
    finished: bool,
}

impl ObservationScope {
    /// Open a scope and log `{name}_BEGIN` with `fields`
    pub fn begin(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            enabled: true,
            finished: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    /// A scope that never logs
    pub fn silent(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            started: Instant::now(),
            enabled: false,
            finished: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed_us(&self) -> u128 {
        self.started.elapsed().as_micros()
    }

    /// Log `{name}_COMPLETE` with the opening fields plus `extra`
    pub fn complete(mut self, extra: &[(&str, String)]) {
        self.finished = true;
        self.emit(Severity::Info, "COMPLETE", extra);
    }

    /// Log `{name}_FAILED` with the error code and reason
    pub fn fail(mut self, code: &str, reason: &str) {
        self.finished = true;
        self.emit(
            Severity::Error,
            "FAILED",
            &[("code", code.to_string()), ("reason", reason.to_string())],
        );
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, String)]) {
        if !self.enabled || !Logger::enabled(severity) {
            return;
        }
        let event = format!("{}_{}", self.name, suffix);
        let elapsed = self.elapsed_us().to_string();
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        fields.extend(extra.iter().map(|(k, v)| (*k, v.as_str())));
        if suffix != "BEGIN" {
            fields.push(("elapsed_us", elapsed.as_str()));
        }
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "dropped before completion".to_string())],
            );
        }
    }
}
