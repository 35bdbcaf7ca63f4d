use crate::domain::indices::ReferenceIndex;
use crate::radar::profile::RadarProfile;
use crate::radar::scanner::{ScanEvent, ScanProgress};
use crate::radar::table::{self, RenderInput, ScannedRecord, TableStatus, TableView, ViewState};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Enumerating,
    Scanning,
    Complete,
    Failed { message: String },
}

/// State of one radar view: what the scan delivered plus what the user did to the table.
///
/// The view controller owns it and feeds it [`ScanEvent`]s. After [`RadarSession::tear_down`]
/// every event is ignored, so a late response can never touch a dismissed view.
#[derive(Debug, Clone)]
pub struct RadarSession {
    profile: RadarProfile,
    session_id: Option<Uuid>,
    phase: Phase,
    records: Vec<ScannedRecord>,
    progress: ScanProgress,
    failures: usize,
    indices: Option<ReferenceIndex>,
    view: ViewState,
    torn_down: bool,
}

impl RadarSession {
    pub fn new(profile: RadarProfile) -> Self {
        Self {
            profile,
            session_id: None,
            phase: Phase::Idle,
            records: Vec::new(),
            progress: ScanProgress::default(),
            failures: 0,
            indices: None,
            view: ViewState::default(),
            torn_down: false,
        }
    }

    /// Resets scan results for a new scan. The user's view state is kept.
    pub fn begin(&mut self, session_id: Uuid) {
        if self.torn_down {
            return;
        }
        self.session_id = Some(session_id);
        self.phase = Phase::Enumerating;
        self.records.clear();
        self.progress = ScanProgress::default();
        self.failures = 0;
    }

    pub fn set_indices(&mut self, indices: ReferenceIndex) {
        if !self.torn_down {
            self.indices = Some(indices);
        }
    }

    /// Folds one scanner event into the session. Returns whether anything changed.
    pub fn apply(&mut self, event: ScanEvent) -> bool {
        if self.torn_down {
            return false;
        }
        match (&self.phase, &event) {
            (Phase::Failed { .. }, _) => return false,
            // The final summary still lands after the last progress tick.
            (Phase::Complete, ScanEvent::Completed { .. }) => {}
            (Phase::Complete, _) => return false,
            _ => {}
        }

        match event {
            ScanEvent::Started { session_id, total } => {
                self.session_id = Some(session_id);
                self.progress = ScanProgress {
                    processed: 0,
                    total,
                };
                self.phase = if total == 0 {
                    Phase::Complete
                } else {
                    Phase::Scanning
                };
            }
            ScanEvent::Record { category, record } => {
                let seq = self.records.len();
                self.records.push(ScannedRecord {
                    category,
                    record,
                    seq,
                });
            }
            ScanEvent::Progress { processed, total } => {
                if total != self.progress.total {
                    self.progress.total = total;
                }
                let next = processed.min(self.progress.total);
                if next <= self.progress.processed {
                    return false;
                }
                self.progress.processed = next;
                if self.progress.is_complete() {
                    self.phase = Phase::Complete;
                }
            }
            ScanEvent::Completed {
                processed,
                total,
                failures,
            } => {
                self.progress.total = total;
                self.progress.processed = self.progress.processed.max(processed.min(total));
                self.failures = failures;
                self.phase = Phase::Complete;
            }
            ScanEvent::Failed { message } => {
                self.phase = Phase::Failed { message };
            }
        }
        true
    }

    /// Dismisses the view. Nothing changes afterwards.
    pub fn tear_down(&mut self) {
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn profile(&self) -> &RadarProfile {
        &self.profile
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn records(&self) -> &[ScannedRecord] {
        &self.records
    }

    pub fn indices(&self) -> Option<&ReferenceIndex> {
        self.indices.as_ref()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn status(&self) -> TableStatus {
        match &self.phase {
            Phase::Failed { message } => TableStatus::Failed {
                message: message.clone(),
            },
            _ if !self.records.is_empty() => TableStatus::Ready,
            Phase::Complete => TableStatus::Empty {
                message: self.profile.empty_message().to_string(),
            },
            Phase::Idle | Phase::Enumerating | Phase::Scanning => TableStatus::Loading,
        }
    }

    pub fn render(&self) -> TableView {
        let progress = match self.phase {
            Phase::Scanning => Some(self.progress),
            _ => None,
        };
        table::render(RenderInput {
            profile: &self.profile,
            records: &self.records,
            indices: self.indices.as_ref(),
            view: &self.view,
            progress,
            status: self.status(),
        })
    }
}
