/// What the caller should do after a failed surface acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; the frame is skipped and rendering resumes next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Out of memory; terminate.
    Fatal,
}

impl SurfaceErrorAction {
    /// `true` unless the runtime should shut down.
    pub fn can_continue(self) -> bool {
        self != Self::Fatal
    }
}
