use crate::sim::{AuxState, SyncState};

/// Two slots of `T`: readers see the readable slot while a tick fills the other one, then the
/// slots swap roles.
#[derive(Clone, Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    readable: usize,
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: [initial.clone(), initial],
            readable: 0,
        }
    }

    #[inline]
    pub fn readable(&self) -> &T {
        &self.slots[self.readable]
    }

    #[inline]
    pub fn writable_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.readable]
    }

    /// Swap the slots: the last write becomes readable.
    #[inline]
    pub fn flip(&mut self) {
        self.readable = 1 - self.readable;
    }

    /// Write `value` and make it readable.
    pub fn publish(&mut self, value: T) {
        *self.writable_mut() = value;
        self.flip();
    }
}

/// What the driver publishes after every tick.
#[derive(Clone, Debug, Default)]
pub struct FrameState {
    pub sync: SyncState,
    pub aux: AuxState,
}
