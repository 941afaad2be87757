use crate::common::Direction;

/// Largest pin count any chip can have; all masks are `u32`.
pub const MAX_PINS: usize = 32;

/// Per-pin configuration and the authoritative logical state of one expander.
///
/// Mask invariants, holding between any two operations:
/// - `hardware_inputs` has exactly the pins whose direction is `Input` or `Undefined`.
/// - `assigned_inputs` has exactly the pins whose direction is `Input`.
/// - `current` holds logical levels; output bits are only changed by [`set_values()`], input bits
///   only by [`apply_changes()`].
///
/// [`set_values()`]: PinTable::set_values
/// [`apply_changes()`]: PinTable::apply_changes
#[derive(Debug, Clone)]
pub(crate) struct PinTable {
    pin_count: u8,
    directions: [Direction; MAX_PINS],
    inverted: u32,
    assigned_inputs: u32,
    hardware_inputs: u32,
    current: u32,
    /// Last word written to the output latch.
    latch: u32,
}

impl PinTable {
    pub fn new(pin_count: u8) -> Self {
        assert!(pin_count as usize <= MAX_PINS);
        let mut table = Self {
            pin_count,
            directions: [Direction::Undefined; MAX_PINS],
            inverted: 0,
            assigned_inputs: 0,
            hardware_inputs: 0,
            current: 0,
            latch: 0,
        };
        table.reset(0);
        table
    }

    /// Mask with one bit for each existing pin.
    pub fn all(&self) -> u32 {
        all_pins(self.pin_count)
    }

    /// Forget all pin assignments after the chip was (re-)initialized with `initial`.
    pub fn reset(&mut self, initial: u32) {
        self.directions = [Direction::Undefined; MAX_PINS];
        self.inverted = 0;
        self.assigned_inputs = 0;
        self.hardware_inputs = self.all();
        self.current = initial & self.all();
        self.latch = self.current;
    }

    pub fn direction(&self, pin: u8) -> Direction {
        self.directions[pin as usize]
    }

    pub fn declare_input(&mut self, pin: u8, inverted: bool) {
        let mask = 1 << pin;
        self.set_inverted(mask, inverted);
        self.hardware_inputs |= mask;
        self.assigned_inputs |= mask;
        self.directions[pin as usize] = Direction::Input;
    }

    pub fn declare_output(&mut self, pin: u8, inverted: bool) {
        let mask = 1 << pin;
        self.set_inverted(mask, inverted);
        self.hardware_inputs &= !mask;
        self.assigned_inputs &= !mask;
        self.directions[pin as usize] = Direction::Output;
    }

    fn set_inverted(&mut self, mask: u32, inverted: bool) {
        if inverted {
            self.inverted |= mask;
        } else {
            self.inverted &= !mask;
        }
    }

    pub fn value(&self, pin: u8) -> bool {
        self.current & (1 << pin) != 0
    }

    /// Set the logical level of all pins in `mask` to the corresponding bit of `values`.
    pub fn set_values(&mut self, mask: u32, values: u32) {
        self.current = (self.current & !mask) | (values & mask);
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn hardware_inputs(&self) -> u32 {
        self.hardware_inputs
    }

    /// Mask of all pins currently configured as outputs.
    pub fn outputs(&self) -> u32 {
        self.directions[..self.pin_count as usize]
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == Direction::Output)
            .fold(0, |m, (i, _)| m | (1 << i))
    }

    /// Physical word for the output latch.
    ///
    /// Inversion is resolved and every hardware input is forced high, as inputs rely on being
    /// pulled up.
    pub fn output_word(&self) -> u32 {
        ((self.current ^ self.inverted) | self.hardware_inputs) & self.all()
    }

    pub fn latch(&self) -> u32 {
        self.latch
    }

    /// Record that `word` was written to the output latch.
    pub fn latched(&mut self, word: u32) {
        self.latch = word;
    }

    /// Pins whose physical reading `raw` differs from the stored state and which qualify for a
    /// change notification: configured as input in hardware *and* declared as input.
    pub fn diff(&self, raw: u32) -> u32 {
        let logical = (raw ^ self.inverted) & self.all();
        (self.current ^ logical) & self.hardware_inputs & self.assigned_inputs
    }

    /// Flip the stored state of all pins in `changed`.
    pub fn apply_changes(&mut self, changed: u32) {
        self.current ^= changed;
    }
}

pub(crate) fn all_pins(pin_count: u8) -> u32 {
    if pin_count as usize >= MAX_PINS {
        u32::MAX
    } else {
        (1 << pin_count) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::PinTable;
    use crate::common::Direction;

    #[test]
    fn reset_defaults() {
        let mut table = PinTable::new(8);
        table.reset(0xa5);
        assert_eq!(table.current(), 0xa5);
        assert_eq!(table.hardware_inputs(), 0xff);
        assert_eq!(table.outputs(), 0);
        assert!((0..8).all(|p| table.direction(p) == Direction::Undefined));
        assert_eq!(table.all(), 0xff);

        // Bits above the pin count are dropped.
        table.reset(0x1ff);
        assert_eq!(table.current(), 0xff);
    }

    #[test]
    fn hardware_inputs_track_directions() {
        let mut table = PinTable::new(16);
        table.declare_output(0, false);
        table.declare_output(9, true);
        assert_eq!(table.hardware_inputs(), 0xfdfe);
        assert_eq!(table.outputs(), 0x0201);

        table.declare_input(9, false);
        assert_eq!(table.hardware_inputs(), 0xfffe);
        assert_eq!(table.outputs(), 0x0001);
        assert_eq!(table.direction(9), Direction::Input);
    }

    #[test]
    fn output_word_resolves_inversion() {
        let mut table = PinTable::new(8);
        table.reset(0);
        table.declare_output(0, false);
        table.declare_output(1, true);
        table.set_values(0b11, 0b11);
        // pin 1 is inverted, all undefined pins are forced high
        assert_eq!(table.output_word(), 0b1111_1101);

        table.set_values(0b10, 0);
        assert_eq!(table.output_word(), 0b1111_1111);
        assert!(table.value(0));
        assert!(!table.value(1));
    }

    #[test]
    fn diff_only_reports_assigned_inputs() {
        let mut table = PinTable::new(8);
        table.reset(0);
        table.declare_input(3, true);
        table.declare_input(4, false);
        table.declare_output(5, false);

        // Undefined pins and the output differ as well, but only assigned inputs count.
        // Pin 3 reads low, which is logical high because it is inverted.
        let raw = 0b1111_0111;
        assert_eq!(table.diff(raw), 0b0001_1000);

        table.apply_changes(0b0001_1000);
        assert_eq!(table.diff(raw), 0);
        assert!(table.value(3));
        assert!(table.value(4));
    }
}
