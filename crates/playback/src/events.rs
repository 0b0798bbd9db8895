//! Event sets posted between the control surface, the orchestrator and the
//! streaming task.

bitflags::bitflags! {
    /// Events the orchestrator waits on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerEvents: u8 {
        /// Open (or rewind) the pending track and start streaming.
        const START = 1 << 0;
        /// Close the stream and the file.
        const STOP = 1 << 1;
        /// Suspend draining.
        const PAUSE = 1 << 2;
        /// Continue draining.
        const RESUME = 1 << 3;
        /// The streaming task drained the slot and wants the next chunk.
        const BUFFER_NEEDED = 1 << 4;
        /// A new track name is waiting in the mailbox.
        const TRACK_QUEUED = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Events the streaming task waits on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamEvents: u8 {
        /// A chunk is sitting in the slot.
        const BUFFER_FULL = 1 << 0;
    }
}
