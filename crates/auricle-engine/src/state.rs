use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of an [`Engine`](crate::Engine). `Exiting` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineState {
    Unprepared = 0,
    Stopped = 1,
    Starting = 2,
    Running = 3,
    Stopping = 4,
    Exiting = 5,
}

impl EngineState {
    pub const ALL: [EngineState; 6] = [
        EngineState::Unprepared,
        EngineState::Stopped,
        EngineState::Starting,
        EngineState::Running,
        EngineState::Stopping,
        EngineState::Exiting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Unprepared => "unprepared",
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Exiting => "exiting",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => EngineState::Unprepared,
            1 => EngineState::Stopped,
            2 => EngineState::Starting,
            3 => EngineState::Running,
            4 => EngineState::Stopping,
            _ => EngineState::Exiting,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated state shared by the control thread and the driver
/// thread.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Applies `next` as one read-modify-write. `next` returns `None` to
    /// leave the state untouched. Returns the state before the update on
    /// success, the unchanged state otherwise.
    pub(crate) fn transition(
        &self,
        mut next: impl FnMut(EngineState) -> Option<EngineState>,
    ) -> Result<EngineState, EngineState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = EngineState::from_u8(raw);
                if current == EngineState::Exiting {
                    return None;
                }
                next(current).map(|state| state as u8)
            })
            .map(EngineState::from_u8)
            .map_err(EngineState::from_u8)
    }

    /// Moves from exactly `from` to `to`.
    pub(crate) fn advance(&self, from: EngineState, to: EngineState) -> bool {
        self.transition(|current| (current == from).then_some(to))
            .is_ok()
    }

    pub(crate) fn enter_exiting(&self) -> EngineState {
        EngineState::from_u8(self.0.swap(EngineState::Exiting as u8, Ordering::AcqRel))
    }
}
