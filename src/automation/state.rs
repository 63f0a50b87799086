//! Layer automation states.

/// Where a layer currently is in its marking sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerState {
    #[default]
    Idle,
    OpeningFile,
    SettingParameters,
    DownloadingParameters,
    Marking,
    Polling,
    StoppingMark,
    Done,
    Failed,
}

impl LayerState {
    pub fn name(&self) -> &'static str {
        match self {
            LayerState::Idle => "idle",
            LayerState::OpeningFile => "opening file",
            LayerState::SettingParameters => "setting parameters",
            LayerState::DownloadingParameters => "downloading parameters",
            LayerState::Marking => "marking",
            LayerState::Polling => "polling",
            LayerState::StoppingMark => "stopping mark",
            LayerState::Done => "done",
            LayerState::Failed => "failed",
        }
    }

    /// Whether `start_mark` has been sent in this state.
    pub fn marking_started(&self) -> bool {
        matches!(self, LayerState::Marking | LayerState::Polling | LayerState::StoppingMark)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LayerState::Done | LayerState::Failed)
    }

    /// Whether moving to `next` follows the layer sequence.
    ///
    /// `Failed` is reachable from every non-terminal state; a finished layer
    /// can only be restarted from `Idle`.
    pub fn can_transition_to(&self, next: LayerState) -> bool {
        use LayerState::*;
        match (self, next) {
            (Done | Failed, Idle) => true,
            (current, Failed) => !current.is_terminal(),
            (Idle, OpeningFile)
            | (OpeningFile, SettingParameters)
            | (SettingParameters, DownloadingParameters)
            | (DownloadingParameters, Marking)
            | (Marking, Polling)
            | (Polling, StoppingMark)
            | (StoppingMark, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
