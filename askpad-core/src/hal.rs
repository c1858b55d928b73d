//! Hardware Abstraction Layer for the keypad and transmitter

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Mock instant type for compilation without embassy-time (microsecond ticks)
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Instant(u64);

    impl Instant {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1000)
        }

        pub fn duration_since(&self, earlier: Instant) -> Duration {
            Duration(self.0.saturating_sub(earlier.0))
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1000
        }
    }

    impl core::ops::Add<Duration> for Instant {
        type Output = Instant;

        fn add(self, rhs: Duration) -> Instant {
            Instant(self.0 + rhs.0)
        }
    }

    /// Mock duration type (microsecond resolution)
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1000)
        }

        pub const fn from_secs(s: u64) -> Self {
            Self(s * 1_000_000)
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1000
        }
    }

    impl core::ops::Mul<u32> for Duration {
        type Output = Duration;

        fn mul(self, rhs: u32) -> Duration {
            Duration(self.0 * rhs as u64)
        }
    }

    impl core::ops::Div<u32> for Duration {
        type Output = Duration;

        fn div(self, rhs: u32) -> Duration {
            Duration(self.0 / rhs as u64)
        }
    }
}

use embedded_hal::digital::{OutputPin, StatefulOutputPin};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Timing operation failed
    TimingError,
    /// Interrupt configuration failed
    InterruptError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::TimingError => write!(f, "Timing operation failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// The three interrupt sources the core cares about
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqSource {
    /// Rising edge on any keypad row input
    RowEdge,
    /// Periodic column rotation timer
    ColumnTick,
    /// Periodic bit transmit timer
    BitTick,
}

impl IrqSource {
    pub const ALL: [IrqSource; 3] = [IrqSource::BitTick, IrqSource::ColumnTick, IrqSource::RowEdge];
}

/// Keypad column drive lines (4 outputs, bit n = column n)
pub trait ColumnLines {
    type Error: From<HalError>;

    /// Drive the column outputs with the low nibble of `pattern`
    fn write_columns(&mut self, pattern: u8) -> Result<(), Self::Error>;

    /// Read back the currently driven column pattern
    fn read_columns(&mut self) -> Result<u8, Self::Error>;
}

/// Keypad row sense lines
pub trait RowLines {
    type Error: From<HalError>;

    /// Edge-status bits, row 0 in bit 0
    fn edge_status(&mut self) -> Result<u8, Self::Error>;

    /// Clear every pending row edge
    fn clear_edges(&mut self) -> Result<(), Self::Error>;
}

/// Single-wire radio data output
pub trait TxLine {
    type Error: From<HalError>;

    /// Set line level (true = carrier on)
    fn set_level(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Get current line level
    fn level(&mut self) -> Result<bool, Self::Error>;

    /// Toggle line level
    fn toggle(&mut self) -> Result<(), Self::Error> {
        let current = self.level()?;
        self.set_level(!current)
    }
}

/// Trait for interrupt controller access
pub trait InterruptControl {
    type Error: From<HalError>;

    /// Set priority, lower number is more urgent
    fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), Self::Error>;

    /// Unmask an interrupt source
    fn enable(&mut self, source: IrqSource) -> Result<(), Self::Error>;

    /// Mask an interrupt source
    fn disable(&mut self, source: IrqSource) -> Result<(), Self::Error>;
}

/// Everything the control loop needs from the board
pub trait Platform {
    type Columns: ColumnLines;
    type Interrupts: InterruptControl;
    type Error: From<HalError>
        + From<<Self::Columns as ColumnLines>::Error>
        + From<<Self::Interrupts as InterruptControl>::Error>;

    /// Column lines and interrupt controller together, for suspending the keypad
    fn keypad_control(&mut self) -> (&mut Self::Columns, &mut Self::Interrupts);

    /// Access to interrupt controller
    fn interrupts(&mut self) -> &mut Self::Interrupts;

    /// Sleep until the next interrupt has been serviced
    fn wait_for_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Blocking delay with interrupts held off
    fn guard_delay(&mut self, duration: Duration) -> Result<(), Self::Error>;
}

/// Generic implementation for embedded-hal compatible output pins
pub struct EmbeddedHalTxLine<P> {
    pin: P,
    inverted: bool,
}

impl<P> EmbeddedHalTxLine<P>
where
    P: StatefulOutputPin,
{
    pub fn new(pin: P, inverted: bool) -> Self {
        Self { pin, inverted }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> TxLine for EmbeddedHalTxLine<P>
where
    P: StatefulOutputPin,
{
    type Error = HalError;

    fn set_level(&mut self, high: bool) -> Result<(), Self::Error> {
        let output_state = if self.inverted { !high } else { high };
        if output_state {
            self.pin.set_high().map_err(|_| HalError::GpioError)
        } else {
            self.pin.set_low().map_err(|_| HalError::GpioError)
        }
    }

    fn level(&mut self) -> Result<bool, Self::Error> {
        let high = self.pin.is_set_high().map_err(|_| HalError::GpioError)?;
        Ok(high != self.inverted)
    }
}

/// Four embedded-hal output pins acting as keypad columns
pub struct EmbeddedHalColumns<P> {
    pins: [P; 4],
    pattern: u8,
}

impl<P> EmbeddedHalColumns<P>
where
    P: OutputPin,
{
    pub fn new(pins: [P; 4]) -> Self {
        Self { pins, pattern: 0 }
    }

    pub fn release(self) -> [P; 4] {
        self.pins
    }
}

impl<P> ColumnLines for EmbeddedHalColumns<P>
where
    P: OutputPin,
{
    type Error = HalError;

    fn write_columns(&mut self, pattern: u8) -> Result<(), Self::Error> {
        // Lower the old column before raising the new one so two columns are
        // never driven at once
        for (col, pin) in self.pins.iter_mut().enumerate() {
            if pattern & (1 << col) == 0 {
                pin.set_low().map_err(|_| HalError::GpioError)?;
            }
        }
        for (col, pin) in self.pins.iter_mut().enumerate() {
            if pattern & (1 << col) != 0 {
                pin.set_high().map_err(|_| HalError::GpioError)?;
            }
        }
        self.pattern = pattern & 0x0F;
        Ok(())
    }

    fn read_columns(&mut self) -> Result<u8, Self::Error> {
        Ok(self.pattern)
    }
}

/// No-op interrupt controller for polled builds
pub struct NoOpInterruptController;

impl InterruptControl for NoOpInterruptController {
    type Error = HalError;

    fn set_priority(&mut self, _source: IrqSource, _priority: u8) -> Result<(), Self::Error> {
        Ok(())
    }

    fn enable(&mut self, _source: IrqSource) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disable(&mut self, _source: IrqSource) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::RefCell;

    extern crate std;
    use std::vec::Vec;

    #[derive(Default)]
    pub struct MockColumns {
        pattern: RefCell<u8>,
        history: RefCell<Vec<u8>>,
    }

    impl MockColumns {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pattern(&self) -> u8 {
            *self.pattern.borrow()
        }

        /// Every pattern ever written, oldest first
        pub fn history(&self) -> Vec<u8> {
            self.history.borrow().clone()
        }
    }

    impl ColumnLines for MockColumns {
        type Error = HalError;

        fn write_columns(&mut self, pattern: u8) -> Result<(), Self::Error> {
            *self.pattern.borrow_mut() = pattern & 0x0F;
            self.history.borrow_mut().push(pattern & 0x0F);
            Ok(())
        }

        fn read_columns(&mut self) -> Result<u8, Self::Error> {
            Ok(*self.pattern.borrow())
        }
    }

    #[derive(Default)]
    pub struct MockRows {
        status: RefCell<u8>,
        clears: RefCell<u32>,
    }

    impl MockRows {
        pub fn new() -> Self {
            Self::default()
        }

        /// Latch a rising edge on `row`
        pub fn raise(&self, row: usize) {
            *self.status.borrow_mut() |= 1 << row;
        }

        pub fn set_status(&self, bits: u8) {
            *self.status.borrow_mut() = bits;
        }

        pub fn pending(&self) -> u8 {
            *self.status.borrow()
        }

        pub fn clear_count(&self) -> u32 {
            *self.clears.borrow()
        }
    }

    impl RowLines for MockRows {
        type Error = HalError;

        fn edge_status(&mut self) -> Result<u8, Self::Error> {
            Ok(*self.status.borrow())
        }

        fn clear_edges(&mut self) -> Result<(), Self::Error> {
            *self.status.borrow_mut() = 0;
            *self.clears.borrow_mut() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockTxLine {
        level: RefCell<bool>,
        writes: RefCell<Vec<bool>>,
    }

    impl MockTxLine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_high(&self) -> bool {
            *self.level.borrow()
        }

        /// Every level ever written, oldest first
        pub fn writes(&self) -> Vec<bool> {
            self.writes.borrow().clone()
        }
    }

    impl TxLine for MockTxLine {
        type Error = HalError;

        fn set_level(&mut self, high: bool) -> Result<(), Self::Error> {
            *self.level.borrow_mut() = high;
            self.writes.borrow_mut().push(high);
            Ok(())
        }

        fn level(&mut self) -> Result<bool, Self::Error> {
            Ok(*self.level.borrow())
        }
    }

    #[derive(Default)]
    pub struct MockInterrupts {
        enabled: [bool; 3],
        priorities: [Option<u8>; 3],
    }

    impl MockInterrupts {
        pub fn new() -> Self {
            Self::default()
        }

        fn slot(source: IrqSource) -> usize {
            match source {
                IrqSource::RowEdge => 0,
                IrqSource::ColumnTick => 1,
                IrqSource::BitTick => 2,
            }
        }

        pub fn is_enabled(&self, source: IrqSource) -> bool {
            self.enabled[Self::slot(source)]
        }

        pub fn priority(&self, source: IrqSource) -> Option<u8> {
            self.priorities[Self::slot(source)]
        }
    }

    impl InterruptControl for MockInterrupts {
        type Error = HalError;

        fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), Self::Error> {
            self.priorities[Self::slot(source)] = Some(priority);
            Ok(())
        }

        fn enable(&mut self, source: IrqSource) -> Result<(), Self::Error> {
            self.enabled[Self::slot(source)] = true;
            Ok(())
        }

        fn disable(&mut self, source: IrqSource) -> Result<(), Self::Error> {
            self.enabled[Self::slot(source)] = false;
            Ok(())
        }
    }
}
