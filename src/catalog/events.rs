//! View events broadcast to the presentation layer.

use serde::Serialize;

use crate::domain::AcquisitionMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A fresh acquisition pass replaced the stub list
    StubsReplaced {
        mode: AcquisitionMode,
        count: usize,
        more_available: bool,
    },
    /// A page was merged into the stub list
    StubsAppended {
        added: usize,
        total: usize,
        more_available: bool,
    },
    DetailResolved { identifier: String },
    /// Retries exhausted; the stub stays unresolved for the session
    DetailUnavailable { identifier: String, error: String },
    AcquisitionFailed { mode: AcquisitionMode, error: String },
    ComparisonChanged { selected: Vec<String> },
}

impl ViewEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StubsReplaced { .. } => "stubs_replaced",
            Self::StubsAppended { .. } => "stubs_appended",
            Self::DetailResolved { .. } => "detail_resolved",
            Self::DetailUnavailable { .. } => "detail_unavailable",
            Self::AcquisitionFailed { .. } => "acquisition_failed",
            Self::ComparisonChanged { .. } => "comparison_changed",
        }
    }
}
