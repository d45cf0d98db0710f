//! Voice capture state machine
//!
//! Tracks the lifecycle of one voice-logged meal: load the speech model,
//! record, transcribe, then hand the transcript to nutrition analysis.
//! Transitions are guarded so a caller can never record and analyze at
//! the same time; an illegal transition is refused, not panicked on.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CapturePhase {
    Idle,
    LoadingModel { progress: u8 },
    Recording,
    Transcribing,
    Analyzing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureState {
    pub phase: CapturePhase,
    pub transcript: Option<String>,
    pub error: Option<String>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            phase: CapturePhase::Idle,
            transcript: None,
            error: None,
        }
    }
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report model download progress. Valid from idle or while already
    /// loading; progress is clamped to 0..=100.
    pub fn begin_loading(&mut self, progress: u8) -> bool {
        match self.phase {
            CapturePhase::Idle | CapturePhase::LoadingModel { .. } => {
                self.phase = CapturePhase::LoadingModel {
                    progress: progress.min(100),
                };
                true
            }
            _ => false,
        }
    }

    /// Start recording. Refused while a previous capture is still being
    /// transcribed or analyzed.
    pub fn start_recording(&mut self) -> bool {
        match self.phase {
            CapturePhase::Idle | CapturePhase::LoadingModel { .. } => {
                self.phase = CapturePhase::Recording;
                self.transcript = None;
                self.error = None;
                true
            }
            _ => false,
        }
    }

    /// Stop recording and move to transcription.
    pub fn stop_recording(&mut self) -> bool {
        if self.phase == CapturePhase::Recording {
            self.phase = CapturePhase::Transcribing;
            true
        } else {
            false
        }
    }

    /// Transcription finished; hold the text while analysis runs.
    pub fn transcribed(&mut self, text: impl Into<String>) -> bool {
        if self.phase == CapturePhase::Transcribing {
            self.transcript = Some(text.into());
            self.phase = CapturePhase::Analyzing;
            true
        } else {
            false
        }
    }

    /// Analysis finished (the estimate was logged elsewhere); back to idle
    /// with the transcript kept for display.
    pub fn analyzed(&mut self) -> bool {
        if self.phase == CapturePhase::Analyzing {
            self.phase = CapturePhase::Idle;
            true
        } else {
            false
        }
    }

    /// Record a failure from any non-idle phase and reset.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.phase == CapturePhase::Idle {
            return false;
        }
        self.error = Some(message.into());
        self.phase = CapturePhase::Idle;
        true
    }

    /// Abandon an in-flight capture without recording an error.
    pub fn cancel(&mut self) {
        self.phase = CapturePhase::Idle;
        self.transcript = None;
    }
}

// ---------------------------------------------------------------------------
/// Entry Slots
// ---------------------------------------------------------------------------

/// Single-valued edit and delete slots for the meal list. At most one
/// entry may be mid-edit and one mid-delete; claiming an occupied slot is
/// refused so two flows cannot target entries concurrently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrySlots {
    pub editing_id: Option<String>,
    pub deleting_id: Option<String>,
}

impl EntrySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_edit(&mut self, id: impl Into<String>) -> bool {
        if self.editing_id.is_some() {
            return false;
        }
        self.editing_id = Some(id.into());
        true
    }

    pub fn end_edit(&mut self) {
        self.editing_id = None;
    }

    pub fn begin_delete(&mut self, id: impl Into<String>) -> bool {
        if self.deleting_id.is_some() {
            return false;
        }
        self.deleting_id = Some(id.into());
        true
    }

    pub fn end_delete(&mut self) {
        self.deleting_id = None;
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
