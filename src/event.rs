/// Maximum number of listeners per expander.
pub const MAX_LISTENERS: usize = 4;

/// An assigned input pin changed its logical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputChange {
    pub pin: u8,
    pub value: bool,
}

/// Observer for expander events.
///
/// Callbacks run after the operation that produced the event has left the operation queue, so a
/// listener may start new expander operations.  They should return quickly, though.
pub trait Listener {
    /// An input declared with [`input_pin()`](crate::Expander::input_pin) changed.
    fn input_changed(&self, change: InputChange);

    /// A poll triggered by the interrupt line finished, successfully or not.
    ///
    /// Edge detection can miss or merge edges, so an application that sees `ok == false` (or no
    /// notification for a while) should schedule a poll of its own.
    fn interrupt_processed(&self, ok: bool) {
        let _ = ok;
    }
}
