use std::fmt;

/// Lifecycle of one unit inside a service group.
///
/// `Created -> Starting -> Running -> Stopping -> Terminated`, or `Failed`
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Created,
    Starting,
    Running,
    Stopping,
    Terminated,
    Failed,
}

impl UnitState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Terminated | UnitState::Failed)
    }

    /// Return label value for logs and metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitState::Created => "created",
            UnitState::Starting => "starting",
            UnitState::Running => "running",
            UnitState::Stopping => "stopping",
            UnitState::Terminated => "terminated",
            UnitState::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
