//! The expander core: pin bookkeeping and hardware access of one chip, serialized through its
//! operation queue.

use core::cell::{Cell, RefCell};
use core::future::poll_fn;
use core::task::Poll;
use heapless::Vec;
use log::{debug, trace, warn};

use crate::common::{Chip, Direction, Levels};
use crate::error::Error;
use crate::event::{InputChange, Listener, MAX_LISTENERS};
use crate::interrupt::{EdgeSource, InterruptBridge, LineHub, LineId, Registration};
use crate::pin::{all_pins, PinTable};
use crate::queue::{OpQueue, Turn};

/// Maximum number of operations queued on one expander at the same time.
pub const QUEUE_DEPTH: usize = 32;

/// State only touched by the operation holding the queue turn.
struct Core<C> {
    chip: C,
    pins: PinTable,
}

impl<C: Chip> Core<C> {
    async fn write_outputs(&mut self) -> Result<(), C::Error> {
        let word = self.pins.output_word();
        self.chip.write_state(word).await?;
        self.pins.latched(word);
        Ok(())
    }

    /// Write the output word only if it changes the latch bits of the pins in `mask`.
    async fn refresh_outputs(&mut self, mask: u32) -> Result<(), C::Error> {
        if (self.pins.output_word() ^ self.pins.latch()) & mask == 0 {
            return Ok(());
        }
        self.write_outputs().await
    }

    /// Set the logical level of the pins in `mask` and write the latch once.  The stored state is
    /// left untouched if the write fails.
    async fn update_outputs(&mut self, mask: u32, values: u32) -> Result<(), C::Error> {
        let previous = self.pins.current();
        self.pins.set_values(mask, values);
        let result = self.write_outputs().await;
        if result.is_err() {
            self.pins.set_values(mask, previous);
        }
        result
    }

    /// Apply a pin declaration to the chip and, once the direction is written, to the table.
    ///
    /// If the interrupt-control write fails the table already has the new direction.
    async fn declare(
        &mut self,
        irq_enabled: bool,
        declare: impl FnOnce(&mut PinTable),
    ) -> Result<(), C::Error> {
        let mut pins = self.pins.clone();
        declare(&mut pins);
        let inputs = pins.hardware_inputs();
        self.chip.write_direction(inputs).await?;
        self.pins = pins;
        self.chip
            .write_interrupt_control(if irq_enabled { inputs } else { 0 })
            .await
    }
}

#[derive(Clone, Copy)]
struct Attached<'a> {
    hub: &'a dyn LineHub,
    registration: Registration,
    /// Edge count of the line already handled.
    seen: u32,
}

/// Decrements a counter when dropped.
struct Count<'c>(&'c Cell<usize>);

impl<'c> Count<'c> {
    fn new(counter: &'c Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self(counter)
    }
}

impl Drop for Count<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Clears a flag when dropped.
struct Flag<'f>(&'f Cell<bool>);

impl Drop for Flag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// One GPIO expander chip.
///
/// Every operation is queued and runs to completion before the next one starts, in the order the
/// operations were first polled.  Operations only take `&self`, so any number of tasks on the same
/// executor can share one expander:
///
/// ```ignore
/// let expander = Expander::new(Mcp23017::new(i2c, false, false, false));
/// expander.initialize(false).await?;
/// expander.output_pin(0, false, Some(true)).await?;
/// expander.input_pin(8, true).await?;
///
/// join(
///     async { loop { let _ = expander.service_interrupt().await; } },
///     async { expander.set_pin(0, None).await },
/// ).await;
/// ```
///
/// The lifetime `'a` is the lifetime of the subscribed [`Listener`]s and of the
/// [`InterruptBridge`] used by [`enable_interrupt()`](Expander::enable_interrupt).
pub struct Expander<'a, C: Chip> {
    queue: OpQueue<Core<C>, QUEUE_DEPTH>,
    pin_count: u8,
    /// Polls outstanding, queued or executing.
    polls: Cell<usize>,
    polling: Cell<bool>,
    listeners: RefCell<Vec<&'a dyn Listener, MAX_LISTENERS>>,
    interrupt: Cell<Option<Attached<'a>>>,
}

impl<'a, C: Chip> Expander<'a, C> {
    /// Wrap a chip driver.  No bus traffic happens until [`initialize()`](Expander::initialize).
    ///
    /// # Panics
    ///
    /// If the chip reports more than [`MAX_PINS`](crate::MAX_PINS) pins.
    pub fn new(chip: C) -> Self {
        let pin_count = chip.pin_count();
        Self {
            queue: OpQueue::new(Core {
                chip,
                pins: PinTable::new(pin_count),
            }),
            pin_count,
            polls: Cell::new(0),
            polling: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            interrupt: Cell::new(None),
        }
    }

    pub fn pin_count(&self) -> u8 {
        self.pin_count
    }

    /// Whether a read of the chip is in flight right now.
    pub fn is_polling(&self) -> bool {
        self.polling.get()
    }

    /// Number of operations queued or executing.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of polls outstanding at the same time.
    pub fn poll_limit(&self) -> usize {
        3 + self.pin_count as usize
    }

    fn check_pin(&self, pin: u8) -> Result<(), Error<C::Error>> {
        if pin < self.pin_count {
            Ok(())
        } else {
            Err(Error::PinOutOfRange {
                pin,
                pin_count: self.pin_count,
            })
        }
    }

    async fn turn(&self) -> Result<Turn<'_, Core<C>, QUEUE_DEPTH>, Error<C::Error>> {
        let pending = self.queue.enqueue().map_err(|_| Error::QueueFull)?;
        Ok(pending.await)
    }

    fn irq_enabled(&self) -> bool {
        self.interrupt.get().is_some()
    }

    /// Bring up the chip and reset all pins to undefined.
    ///
    /// `initial` is the logical state of all pins afterwards, either one level for every pin or a
    /// bitmask.  It is also written to the output latch.
    pub async fn initialize(&self, initial: impl Into<Levels>) -> Result<(), Error<C::Error>> {
        let all = all_pins(self.pin_count);
        let initial = initial.into().to_mask(all);
        if initial & !all != 0 {
            return Err(Error::InitialStateOutOfRange {
                state: initial,
                pin_count: self.pin_count,
            });
        }

        let mut turn = self.turn().await?;
        let core = &mut *turn;
        core.chip.initialize(initial).await.map_err(Error::Bus)?;
        core.pins.reset(initial);
        debug!(
            "initialized {}-pin expander, state {:#x}",
            self.pin_count, initial
        );
        Ok(())
    }

    /// Declare `pin` an input, optionally with inverted logic.
    ///
    /// The pin is read once right away to establish its level; that read does not produce an
    /// [`InputChange`] for `pin`.  Returns the state of all pins after the read.
    pub async fn input_pin(&self, pin: u8, inverted: bool) -> Result<u32, Error<C::Error>> {
        self.check_pin(pin)?;

        let mut turn = self.turn().await?;
        let core = &mut *turn;
        core.declare(self.irq_enabled(), |pins| pins.declare_input(pin, inverted))
            .await
            .map_err(Error::Bus)?;
        // Inputs rely on their latch bit being high.
        core.write_outputs().await.map_err(Error::Bus)?;
        debug!("pin {} is an input (inverted: {})", pin, inverted);

        let changed = self.read_changes(core).await?;
        let state = core.pins.current();
        drop(turn);

        self.notify_changes(changed, state, Some(pin));
        Ok(state)
    }

    /// Declare `pin` an output, optionally with inverted logic.
    ///
    /// With `initial` set the pin is driven to that logical level.  Without it the pin keeps its
    /// stored level; the latch is only rewritten if that level is not on the latch yet, e.g. for a
    /// former input.
    pub async fn output_pin(
        &self,
        pin: u8,
        inverted: bool,
        initial: Option<bool>,
    ) -> Result<(), Error<C::Error>> {
        self.check_pin(pin)?;

        let mut turn = self.turn().await?;
        let core = &mut *turn;
        core.declare(self.irq_enabled(), |pins| pins.declare_output(pin, inverted))
            .await
            .map_err(Error::Bus)?;
        match initial {
            Some(value) => {
                let bit = 1 << pin;
                core.update_outputs(bit, if value { bit } else { 0 })
                    .await
                    .map_err(Error::Bus)?;
            }
            None => core.refresh_outputs(1 << pin).await.map_err(Error::Bus)?,
        }
        debug!("pin {} is an output (inverted: {})", pin, inverted);
        Ok(())
    }

    /// Drive an output pin to `value`, or toggle it if `value` is `None`.
    pub async fn set_pin(&self, pin: u8, value: Option<bool>) -> Result<(), Error<C::Error>> {
        self.check_pin(pin)?;

        let mut turn = self.turn().await?;
        let core = &mut *turn;
        if core.pins.direction(pin) != Direction::Output {
            return Err(Error::NotOutput(pin));
        }
        let value = value.unwrap_or(!core.pins.value(pin));
        let bit = 1 << pin;
        core.update_outputs(bit, if value { bit } else { 0 })
            .await
            .map_err(Error::Bus)
    }

    /// Drive all output pins at once with a single write.
    ///
    /// Bits of a mask that belong to non-output pins are ignored.  Does nothing if no pin is an
    /// output.
    pub async fn set_all_pins(&self, levels: impl Into<Levels>) -> Result<(), Error<C::Error>> {
        let levels = levels.into();

        let mut turn = self.turn().await?;
        let core = &mut *turn;
        let outputs = core.pins.outputs();
        if outputs == 0 {
            return Ok(());
        }
        let values = levels.to_mask(core.pins.all());
        core.update_outputs(outputs, values)
            .await
            .map_err(Error::Bus)
    }

    /// Logical level of `pin` as currently known.
    pub async fn get_pin_value(&self, pin: u8) -> Result<bool, Error<C::Error>> {
        self.check_pin(pin)?;
        let turn = self.turn().await?;
        Ok(turn.pins.value(pin))
    }

    /// Read all pins and notify listeners about changed inputs.  Returns the new state.
    ///
    /// Fails with [`Error::TooManyPolls`] without queueing if [`poll_limit()`] polls are already
    /// outstanding, unless `ignore_bound` is set.
    ///
    /// [`poll_limit()`]: Expander::poll_limit
    pub async fn do_poll(&self, ignore_bound: bool) -> Result<u32, Error<C::Error>> {
        let limit = self.poll_limit();
        if !ignore_bound && self.polls.get() >= limit {
            return Err(Error::TooManyPolls(limit));
        }
        let _count = Count::new(&self.polls);

        let mut turn = self.turn().await?;
        let changed = self.read_changes(&mut turn).await?;
        let state = turn.pins.current();
        drop(turn);

        self.notify_changes(changed, state, None);
        Ok(state)
    }

    /// Read the chip and fold input changes into the stored state.  Returns the changed pins.
    async fn read_changes(&self, core: &mut Core<C>) -> Result<u32, Error<C::Error>> {
        if self.polling.replace(true) {
            return Err(Error::PollInProgress);
        }
        let _polling = Flag(&self.polling);

        let raw = core.chip.read_state().await.map_err(Error::Bus)?;
        let changed = core.pins.diff(raw);
        core.pins.apply_changes(changed);
        trace!("poll read {:#x}, changed {:#x}", raw, changed);
        Ok(changed)
    }

    fn notify_changes(&self, changed: u32, state: u32, suppress: Option<u8>) {
        if changed == 0 {
            return;
        }
        // Listeners may subscribe or unsubscribe from their callbacks.
        let listeners = self.listeners.borrow().clone();
        for pin in (0..self.pin_count).filter(|&p| changed & (1 << p) != 0) {
            if suppress == Some(pin) {
                continue;
            }
            let change = InputChange {
                pin,
                value: state & (1 << pin) != 0,
            };
            trace!("pin {} changed to {}", pin, change.value);
            for listener in &listeners {
                listener.input_changed(change);
            }
        }
    }

    pub fn subscribe(&self, listener: &'a dyn Listener) -> Result<(), Error<C::Error>> {
        self.listeners
            .borrow_mut()
            .push(listener)
            .map_err(|_| Error::TooManyListeners)
    }

    /// Remove a listener.  Returns whether it was subscribed.
    pub fn unsubscribe(&self, listener: &dyn Listener) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !core::ptr::addr_eq(*l, listener));
        listeners.len() != before
    }

    /// Let the chip's interrupt output drive polls via `line` of `bridge`.
    ///
    /// Enables interrupt-on-change for all pins that are inputs in hardware.  An expander can only
    /// use one line; call [`disable_interrupt()`](Expander::disable_interrupt) before switching.
    pub async fn enable_interrupt<S: EdgeSource, const N: usize>(
        &self,
        bridge: &'a InterruptBridge<S, N>,
        line: LineId,
    ) -> Result<(), Error<C::Error>> {
        if let Some(active) = self.interrupt.get() {
            return Err(Error::InterruptAlreadyEnabled(active.registration.line()));
        }
        let hub: &'a dyn LineHub = bridge;
        let registration = hub.attach(line)?;
        self.interrupt.set(Some(Attached {
            hub,
            registration,
            seen: registration.edges(),
        }));

        let written = async {
            let mut turn = self.turn().await?;
            let core = &mut *turn;
            let inputs = core.pins.hardware_inputs();
            core.chip
                .write_interrupt_control(inputs)
                .await
                .map_err(Error::Bus)
        }
        .await;
        if let Err(e) = written {
            self.interrupt.set(None);
            if let Err(detach) = hub.detach(registration) {
                warn!("detaching from GPIO line {} failed: {}", line, detach);
            }
            return Err(e);
        }
        debug!("interrupt enabled on GPIO line {}", line);
        Ok(())
    }

    /// Disable interrupt-on-change and stop using the interrupt line.
    ///
    /// The line is released even if the chip cannot be reached.  Does nothing if no line is
    /// enabled.
    pub async fn disable_interrupt(&self) -> Result<(), Error<C::Error>> {
        let Some(active) = self.interrupt.take() else {
            return Ok(());
        };
        let written = async {
            let mut turn = self.turn().await?;
            turn.chip
                .write_interrupt_control(0)
                .await
                .map_err(Error::Bus)
        }
        .await;
        let detached = active.hub.detach(active.registration);
        debug!(
            "interrupt disabled on GPIO line {}",
            active.registration.line()
        );
        written?;
        detached?;
        Ok(())
    }

    /// Wait for the next edge on the interrupt line, then poll the chip.
    ///
    /// Listeners get [`Listener::interrupt_processed()`] with the outcome of the poll.  Edges that
    /// arrive while a poll is running are merged into the next call.  Fails with
    /// [`Error::InterruptNotEnabled`] if no line is enabled, or once the line gets disabled while
    /// waiting.
    ///
    /// Only one task per expander should wait here; a second waiter takes over and the first one
    /// keeps getting re-polled until an edge arrives.
    pub async fn service_interrupt(&self) -> Result<u32, Error<C::Error>> {
        let Some(waiting) = self.interrupt.get() else {
            return Err(Error::InterruptNotEnabled);
        };
        let edges = poll_fn(|cx| match self.interrupt.get() {
            Some(active) if active.registration == waiting.registration => {
                active.hub.poll_edge(&active.registration, active.seen, cx)
            }
            _ => Poll::Ready(None),
        })
        .await
        .ok_or(Error::InterruptNotEnabled)?;
        if let Some(mut active) = self.interrupt.get() {
            active.seen = edges;
            self.interrupt.set(Some(active));
        }

        let result = self.do_poll(false).await;
        if let Err(e) = &result {
            warn!("interrupt poll failed: {:?}", e);
        }
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener.interrupt_processed(result.is_ok());
        }
        result
    }

    /// Drop all listeners and disable the interrupt.  Operations already queued still run.
    pub async fn close(&self) -> Result<(), Error<C::Error>> {
        self.listeners.borrow_mut().clear();
        self.disable_interrupt().await
    }
}

impl<'a, C: Chip> Drop for Expander<'a, C> {
    fn drop(&mut self) {
        if let Some(active) = self.interrupt.take() {
            if let Err(e) = active.hub.detach(active.registration) {
                warn!(
                    "detaching from GPIO line {} failed: {}",
                    active.registration.line(),
                    e
                );
            }
        }
    }
}
