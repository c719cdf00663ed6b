//! Sink Registry and Dispatch
//!
//! `TigerStyle`: Dispatch never fails. Persistence is best-effort per
//! backend and a broken database must not take the generation pipeline
//! down with it.
//!
//! The registry holds sinks in registration order. For every event it
//! reads the settings snapshot fresh, skips disabled backends, runs the
//! enabled ones sequentially, and folds each outcome into a
//! [`DispatchReport`] instead of propagating errors.

use chrono::{DateTime, Utc};

use crate::config::{BackendOptions, SettingsSnapshot};
use crate::constants::REGISTRY_SINKS_COUNT_MAX;
use crate::error::StoreError;
use crate::event::GenerationEvent;
use crate::sink::StorageSink;

// =============================================================================
// Outcomes and reports
// =============================================================================

/// What happened at one sink during dispatch.
#[derive(Debug)]
pub enum SinkOutcome {
    /// The sink persisted the event.
    Persisted {
        /// Number of images written
        images: usize,
    },
    /// The sink was disabled in the snapshot and never invoked.
    Skipped,
    /// The sink was invoked and failed; earlier images may have committed.
    Failed {
        /// The sink's error
        error: StoreError,
    },
}

impl SinkOutcome {
    /// Whether this outcome is a successful persist.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Whether this outcome is a failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-sink entry of a [`DispatchReport`].
#[derive(Debug)]
pub struct SinkReport {
    /// Backend name, as registered
    pub backend: String,
    /// What happened there
    pub outcome: SinkOutcome,
}

/// The full result of dispatching one event.
#[derive(Debug)]
pub struct DispatchReport {
    /// When dispatch began
    pub started_at: DateTime<Utc>,
    /// When the last sink finished
    pub finished_at: DateTime<Utc>,
    /// One entry per registered sink, in registration order
    pub sinks: Vec<SinkReport>,
}

impl DispatchReport {
    /// Number of sinks that persisted the event.
    #[must_use]
    pub fn persisted_count(&self) -> usize {
        self.sinks.iter().filter(|s| s.outcome.is_persisted()).count()
    }

    /// Number of sinks that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.sinks.iter().filter(|s| s.outcome.is_failed()).count()
    }

    /// Report for one backend, `None` if it was not registered.
    #[must_use]
    pub fn sink(&self, backend: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.backend == backend)
    }
}

// =============================================================================
// SinkRegistry
// =============================================================================

/// Ordered collection of storage sinks.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: Vec<Box<dyn StorageSink>>,
}

impl SinkRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Register a sink.
    ///
    /// Re-registering a name replaces the earlier sink in place, keeping
    /// its position in dispatch order.
    pub fn register(&mut self, sink: Box<dyn StorageSink>) {
        // Precondition
        assert!(
            self.sinks.len() < REGISTRY_SINKS_COUNT_MAX,
            "too many registered sinks"
        );

        if let Some(existing) = self.sinks.iter_mut().find(|s| s.name() == sink.name()) {
            *existing = sink;
        } else {
            self.sinks.push(sink);
        }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Registered backend names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Dispatch one event to every enabled sink.
    ///
    /// This never returns an error: a sink failure is logged, recorded in
    /// the report, and does not prevent later sinks from running.
    #[tracing::instrument(skip(self, event, settings), fields(images = event.images.len()))]
    pub async fn dispatch_event(
        &self,
        event: &GenerationEvent,
        settings: &SettingsSnapshot,
    ) -> DispatchReport {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let backend = sink.name();
            let options = BackendOptions::for_backend(settings, backend);

            let outcome = if !options.enabled() {
                tracing::debug!(backend, "sink disabled, skipping");
                SinkOutcome::Skipped
            } else {
                match sink.persist(event, &options).await {
                    Ok(images) => {
                        tracing::info!(backend, images, "event persisted");
                        SinkOutcome::Persisted { images }
                    }
                    Err(error) => {
                        tracing::error!(backend, error = %error, "persist failed");
                        SinkOutcome::Failed { error }
                    }
                }
            };

            reports.push(SinkReport {
                backend: backend.to_string(),
                outcome,
            });
        }

        let report = DispatchReport {
            started_at,
            finished_at: Utc::now(),
            sinks: reports,
        };

        // Postcondition: one entry per registered sink.
        assert!(report.sinks.len() == self.sinks.len(), "report incomplete");

        report
    }

    /// Probe connectivity of one registered backend.
    ///
    /// Returns a human-readable message, or `None` when no sink is
    /// registered under that name.
    pub async fn test_connectivity(
        &self,
        backend: &str,
        settings: &SettingsSnapshot,
    ) -> Option<String> {
        let sink = self.sinks.iter().find(|s| s.name() == backend)?;
        let options = BackendOptions::for_backend(settings, backend);
        Some(sink.test_connectivity(&options).await)
    }
}

// =============================================================================
// Tests
// =============================================================================
