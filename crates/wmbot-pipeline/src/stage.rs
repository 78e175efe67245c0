use std::fmt;

/// Lifecycle of one media request.
///
/// The happy path visits every state from `Start` to `Done` in declaration
/// order. `Failed` can follow any state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    WorkspaceReady,
    RemoteFileResolved,
    Downloaded,
    Composited,
    Delivered,
    WorkspaceCleaned,
    Counted,
    Done,
    Failed,
}

impl Stage {
    /// The state that follows `self` on success, `None` for terminal states.
    pub fn next(self) -> Option<Stage> {
        let next = match self {
            Stage::Start => Stage::WorkspaceReady,
            Stage::WorkspaceReady => Stage::RemoteFileResolved,
            Stage::RemoteFileResolved => Stage::Downloaded,
            Stage::Downloaded => Stage::Composited,
            Stage::Composited => Stage::Delivered,
            Stage::Delivered => Stage::WorkspaceCleaned,
            Stage::WorkspaceCleaned => Stage::Counted,
            Stage::Counted => Stage::Done,
            Stage::Done | Stage::Failed => return None,
        };
        Some(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "START",
            Stage::WorkspaceReady => "WORKSPACE_READY",
            Stage::RemoteFileResolved => "REMOTE_FILE_RESOLVED",
            Stage::Downloaded => "DOWNLOADED",
            Stage::Composited => "COMPOSITED",
            Stage::Delivered => "DELIVERED",
            Stage::WorkspaceCleaned => "WORKSPACE_CLEANED",
            Stage::Counted => "COUNTED",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
