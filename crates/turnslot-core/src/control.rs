//! Panel controls.
//!
//! The panel carries exactly four buttons. Each maps to one [`Control`]
//! variant and a stable wire id that the chat platform echoes back when the
//! button is pressed.

/// The four actions exposed on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Take the slot, or join the queue if it is taken.
    Start,
    /// Give the slot back (holder only).
    Release,
    /// Join the waiting queue.
    Queue,
    /// Clear the current holder regardless of who presses it.
    ForceRelease,
}

impl Control {
    /// All controls in display order.
    pub const ALL: [Control; 4] =
        [Control::Start, Control::Release, Control::Queue, Control::ForceRelease];

    /// Stable id attached to the button.
    pub fn id(self) -> &'static str {
        match self {
            Control::Start => "turnslot:start",
            Control::Release => "turnslot:release",
            Control::Queue => "turnslot:queue",
            Control::ForceRelease => "turnslot:force-release",
        }
    }

    /// Button label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Control::Start => "Start searching",
            Control::Release => "Found",
            Control::Queue => "Join queue",
            Control::ForceRelease => "Force release",
        }
    }

    /// Parse a control from the id echoed back by the platform.
    ///
    /// Returns `None` for ids this coordinator never issued.
    pub fn from_id(id: &str) -> Option<Control> {
        Control::ALL.into_iter().find(|control| control.id() == id)
    }

    /// Ids of all four controls, in display order.
    pub fn all_ids() -> Vec<String> {
        Control::ALL.iter().map(|control| control.id().to_string()).collect()
    }
}
