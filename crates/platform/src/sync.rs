//! Runtime synchronisation primitives
//!
//! Thin wrappers over `embassy-sync` that give the driver framework and the
//! playback tasks the two primitives they are written against:
//!
//! - [`BinarySemaphore`]: a lock with no guard object. Acquire and release
//!   may happen in different calls (even different registry requests), which
//!   a guard-based mutex cannot express.
//! - [`EventFlags`]: an event-flag group. Producers post bits, one consumer
//!   waits until at least one bit is set and takes all of them at once.
//!
//! Both are generic over the `RawMutex` flavour so tests run on
//! `NoopRawMutex` and the firmware on `CriticalSectionRawMutex`.

use core::cell::Cell;
use core::marker::PhantomData;

use bitflags::Flags;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use thiserror_no_std::Error;

/// Returned by [`BinarySemaphore::release`] when the lock was not held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("lock released while not held")]
pub struct LockNotHeld;

// ---------------------------------------------------------------------------
// BinarySemaphore
// ---------------------------------------------------------------------------

/// Binary semaphore without ownership tracking.
///
/// The lock is modelled as a one-slot channel: a token in the slot means
/// "held". Waiters park on the channel, so release wakes exactly one of them.
pub struct BinarySemaphore<M: RawMutex> {
    slot: Channel<M, (), 1>,
    held: BlockingMutex<M, Cell<bool>>,
}

impl<M: RawMutex> BinarySemaphore<M> {
    /// Create a semaphore in the free state.
    pub const fn new() -> Self {
        Self {
            slot: Channel::new(),
            held: BlockingMutex::new(Cell::new(false)),
        }
    }

    /// Wait until the semaphore is free, then take it.
    pub async fn acquire(&self) {
        self.slot.send(()).await;
        self.held.lock(|h| h.set(true));
    }

    /// Take the semaphore if it is free.
    pub fn try_acquire(&self) -> bool {
        let taken = self.slot.try_send(()).is_ok();
        if taken {
            self.held.lock(|h| h.set(true));
        }
        taken
    }

    /// Free the semaphore, waking one waiter.
    pub fn release(&self) -> Result<(), LockNotHeld> {
        self.slot.try_receive().map_err(|_| LockNotHeld)?;
        self.held.lock(|h| h.set(false));
        Ok(())
    }

    /// `true` while some caller holds the semaphore.
    pub fn is_held(&self) -> bool {
        self.held.lock(Cell::get)
    }
}

impl<M: RawMutex> Default for BinarySemaphore<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EventFlags
// ---------------------------------------------------------------------------

/// Event-flag group over a `bitflags` set.
///
/// Posting never blocks and never loses bits: bits accumulate until the
/// consumer takes them. Only one task may wait on a group.
pub struct EventFlags<M: RawMutex, F> {
    bits: BlockingMutex<M, Cell<u8>>,
    wake: Signal<M, ()>,
    _flags: PhantomData<F>,
}

impl<M: RawMutex, F: Flags<Bits = u8>> EventFlags<M, F> {
    /// Create a group with no bits set.
    pub const fn new() -> Self {
        Self {
            bits: BlockingMutex::new(Cell::new(0)),
            wake: Signal::new(),
            _flags: PhantomData,
        }
    }

    /// Set `flags` and wake the waiter.
    pub fn post(&self, flags: F) {
        self.bits.lock(|b| b.set(b.get() | flags.bits()));
        self.wake.signal(());
    }

    /// Clear `flags` without waking anyone.
    pub fn clear(&self, flags: F) {
        self.bits.lock(|b| b.set(b.get() & !flags.bits()));
    }

    /// Bits currently posted and not yet taken.
    pub fn pending(&self) -> F {
        F::from_bits_retain(self.bits.lock(Cell::get))
    }

    /// Wait until at least one bit is set, then take and clear all of them.
    pub async fn wait_any(&self) -> F {
        loop {
            let taken = self.bits.lock(|b| b.replace(0));
            if taken != 0 {
                return F::from_bits_retain(taken);
            }
            self.wake.wait().await;
        }
    }

    /// Take and clear whatever is set without waiting.
    pub fn take(&self) -> F {
        F::from_bits_retain(self.bits.lock(|b| b.replace(0)))
    }
}

impl<M: RawMutex, F: Flags<Bits = u8>> Default for EventFlags<M, F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Ev: u8 {
            const A = 0x01;
            const B = 0x02;
            const C = 0x04;
        }
    }

    #[tokio::test]
    async fn semaphore_starts_free() {
        let sem = BinarySemaphore::<NoopRawMutex>::new();
        assert!(!sem.is_held());
        sem.acquire().await;
        assert!(sem.is_held());
        sem.release().unwrap();
        assert!(!sem.is_held());
    }

    #[tokio::test]
    async fn try_acquire_fails_while_held() {
        let sem = BinarySemaphore::<NoopRawMutex>::new();
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release().unwrap();
        assert!(sem.try_acquire());
    }

    #[test]
    fn release_of_free_semaphore_is_reported() {
        let sem = BinarySemaphore::<NoopRawMutex>::new();
        assert_eq!(sem.release(), Err(LockNotHeld));
    }

    #[tokio::test]
    async fn second_acquirer_waits_for_release() {
        let sem = BinarySemaphore::<NoopRawMutex>::new();
        let log = RefCell::new(Vec::new());

        let first = async {
            sem.acquire().await;
            log.borrow_mut().push("first acquired");
            for _ in 0..5 {
                yield_now().await;
            }
            log.borrow_mut().push("first released");
            sem.release().unwrap();
        };
        let second = async {
            yield_now().await;
            sem.acquire().await;
            log.borrow_mut().push("second acquired");
            sem.release().unwrap();
        };
        join(first, second).await;

        assert_eq!(
            *log.borrow(),
            ["first acquired", "first released", "second acquired"]
        );
    }

    #[test]
    fn posted_bits_accumulate_until_taken() {
        let flags = EventFlags::<NoopRawMutex, Ev>::new();
        flags.post(Ev::A);
        flags.post(Ev::C);
        assert_eq!(flags.pending(), Ev::A | Ev::C);
        assert_eq!(flags.take(), Ev::A | Ev::C);
        assert!(flags.pending().is_empty());
    }

    #[test]
    fn clear_removes_only_named_bits() {
        let flags = EventFlags::<NoopRawMutex, Ev>::new();
        flags.post(Ev::A | Ev::B);
        flags.clear(Ev::B);
        assert_eq!(flags.take(), Ev::A);
    }

    #[tokio::test]
    async fn wait_any_blocks_until_post() {
        let flags = EventFlags::<NoopRawMutex, Ev>::new();
        let (got, ()) = join(flags.wait_any(), async {
            yield_now().await;
            flags.post(Ev::B);
        })
        .await;
        assert_eq!(got, Ev::B);
    }

    #[tokio::test]
    async fn stale_wakeup_does_not_return_empty_set() {
        let flags = EventFlags::<NoopRawMutex, Ev>::new();
        flags.post(Ev::A);
        assert_eq!(flags.wait_any().await, Ev::A);
        // The signal is still latched from the first post; the next wait must
        // loop back to sleep instead of returning nothing.
        let (got, ()) = join(flags.wait_any(), async {
            yield_now().await;
            flags.post(Ev::C);
        })
        .await;
        assert_eq!(got, Ev::C);
    }
}
