use std::sync::{Arc, Mutex, MutexGuard};

/// Kind of non-fatal lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    TrackLookupFailed,
    ReleaseLookupFailed,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::TrackLookupFailed => "track-lookup-failed",
            WarningKind::ReleaseLookupFailed => "release-lookup-failed",
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lookup that failed without failing the surrounding operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    /// What was being looked up, e.g. `"Queen - Jazz"`.
    pub context: String,
    /// Underlying error text.
    pub details: String,
}

impl Warning {
    pub fn new(kind: WarningKind, context: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            details: details.into(),
        }
    }
}

/// Collects warnings, one per (kind, context). Clones share state.
#[derive(Debug, Clone, Default)]
pub struct WarningCollector {
    warnings: Arc<Mutex<Vec<Warning>>>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Warning>> {
        self.warnings.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned warning collector");
            poisoned.into_inner()
        })
    }

    /// Store a warning. A repeat of the same (kind, context) only refreshes
    /// its details.
    pub fn record(&self, warning: Warning) {
        tracing::debug!(
            kind = %warning.kind,
            context = %warning.context,
            details = %warning.details,
            "Warning recorded"
        );
        let mut warnings = self.lock();
        match warnings
            .iter_mut()
            .find(|w| w.kind == warning.kind && w.context == warning.context)
        {
            Some(existing) => existing.details = warning.details,
            None => warnings.push(warning),
        }
    }

    /// Drop the warning for (kind, context) after a later success.
    /// Returns whether one was removed.
    pub fn resolve(&self, kind: WarningKind, context: &str) -> bool {
        let mut warnings = self.lock();
        let before = warnings.len();
        warnings.retain(|w| !(w.kind == kind && w.context == context));
        before != warnings.len()
    }

    /// Snapshot in insertion order.
    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
