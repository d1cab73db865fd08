/// Recording session state machine.
///
/// ```text
/// Idle ──begin──▶ Recording ──end──▶ Idle
/// ```
///
/// `begin` while recording and `end` while idle are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }
}

/// Capture source state, independent of the session state.
///
/// The stream keeps running across record start/stop so the rolling buffer
/// is always warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Stopped,
    Streaming,
}

impl CaptureState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}
