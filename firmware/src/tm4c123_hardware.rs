//! TM4C123GH6PM Hardware Implementation
//!
//! 256KB Flash / 32KB RAM, 16 MHz PIOSC. Register-level access, no PAC.
//!
//! | Signal  | Pin    | Direction                          |
//! |---------|--------|------------------------------------|
//! | Columns | PE0-3  | push-pull out                      |
//! | Rows    | PA2-5  | in, pull-down, rising-edge IRQ     |
//! | TX data | PB0    | push-pull out                      |
//!
//! Timer0 runs split as two 16-bit periodic timers: A for the bit tick,
//! B (prescaled by 2) for the column tick.

use core::ptr::{read_volatile, write_volatile};

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use askpad_core::hal::{
    ColumnLines, Duration, HalError, InterruptControl, IrqSource, Platform, RowLines, TxLine,
};
use askpad_core::AskConfig;

/// Core clock after reset
pub const CLOCK_HZ: u32 = 16_000_000;
/// Divider in front of Timer0B; the 5 ms reload does not fit 16 bits otherwise
pub const COLUMN_PRESCALE: u32 = 2;
/// Implemented NVIC priority bits
const NVIC_PRIO_BITS: u8 = 3;

// System control
const SYSCTL_RCGCTIMER: u32 = 0x400F_E604;
const SYSCTL_RCGCGPIO: u32 = 0x400F_E608;
const SYSCTL_PRTIMER: u32 = 0x400F_EA04;
const SYSCTL_PRGPIO: u32 = 0x400F_EA08;

// GPIO ports (APB aperture)
const GPIOA_BASE: u32 = 0x4000_4000;
const GPIOB_BASE: u32 = 0x4000_5000;
const GPIOE_BASE: u32 = 0x4002_4000;

const GPIO_DATA: u32 = 0x000; // Masked data window, address bits 9:2 select pins
const GPIO_DIR: u32 = 0x400;
const GPIO_IS: u32 = 0x404; // Interrupt sense (0 = edge)
const GPIO_IBE: u32 = 0x408; // Both edges
const GPIO_IEV: u32 = 0x40C; // Event (1 = rising)
const GPIO_IM: u32 = 0x410;
const GPIO_RIS: u32 = 0x414;
const GPIO_ICR: u32 = 0x41C;
const GPIO_AFSEL: u32 = 0x420;
const GPIO_PDR: u32 = 0x514;
const GPIO_DEN: u32 = 0x51C;
const GPIO_AMSEL: u32 = 0x528;
const GPIO_PCTL: u32 = 0x52C;

// Timer0
const TIMER0_BASE: u32 = 0x4003_0000;
const TIMER_CFG: u32 = 0x00;
const TIMER_TAMR: u32 = 0x04;
const TIMER_TBMR: u32 = 0x08;
const TIMER_CTL: u32 = 0x0C;
const TIMER_IMR: u32 = 0x18;
const TIMER_ICR: u32 = 0x24;
const TIMER_TAILR: u32 = 0x28;
const TIMER_TBILR: u32 = 0x2C;
const TIMER_TAPR: u32 = 0x38;
const TIMER_TBPR: u32 = 0x3C;

const TIMER_CFG_16BIT: u32 = 0x4;
const TIMER_MR_PERIODIC: u32 = 0x2;
const TIMER_CTL_TAEN: u32 = 1 << 0;
const TIMER_CTL_TBEN: u32 = 1 << 8;
const TIMER_TATO: u32 = 1 << 0;
const TIMER_TBTO: u32 = 1 << 8;

const PORTA: u32 = 1 << 0;
const PORTB: u32 = 1 << 1;
const PORTE: u32 = 1 << 4;

const COLUMN_PINS: u32 = 0x0F; // PE0-3
const ROW_PINS: u32 = 0x3C; // PA2-5
const ROW_SHIFT: u32 = 2;
const TX_PIN: u32 = 0x01; // PB0

#[inline(always)]
fn read_reg(addr: u32) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

#[inline(always)]
fn write_reg(addr: u32, value: u32) {
    unsafe { write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn modify_reg(addr: u32, clear: u32, set: u32) {
    write_reg(addr, (read_reg(addr) & !clear) | set);
}

/// Masked DATA address touching only `pins`
const fn data_addr(base: u32, pins: u32) -> u32 {
    base + GPIO_DATA + (pins << 2)
}

/// Device interrupt numbers used by the firmware
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Irq {
    GpioA = 0,
    Timer0A = 19,
    Timer0B = 20,
}

unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self as u16
    }
}

impl From<IrqSource> for Irq {
    fn from(source: IrqSource) -> Self {
        match source {
            IrqSource::RowEdge => Irq::GpioA,
            IrqSource::ColumnTick => Irq::Timer0B,
            IrqSource::BitTick => Irq::Timer0A,
        }
    }
}

/// Column outputs on PE0-3
pub struct PortEColumns;

impl ColumnLines for PortEColumns {
    type Error = HalError;

    fn write_columns(&mut self, pattern: u8) -> Result<(), Self::Error> {
        write_reg(data_addr(GPIOE_BASE, COLUMN_PINS), pattern as u32 & COLUMN_PINS);
        Ok(())
    }

    fn read_columns(&mut self) -> Result<u8, Self::Error> {
        Ok((read_reg(data_addr(GPIOE_BASE, COLUMN_PINS)) & COLUMN_PINS) as u8)
    }
}

/// Row inputs on PA2-5
pub struct PortARows;

impl RowLines for PortARows {
    type Error = HalError;

    fn edge_status(&mut self) -> Result<u8, Self::Error> {
        Ok(((read_reg(GPIOA_BASE + GPIO_RIS) & ROW_PINS) >> ROW_SHIFT) as u8)
    }

    fn clear_edges(&mut self) -> Result<(), Self::Error> {
        write_reg(GPIOA_BASE + GPIO_ICR, ROW_PINS);
        Ok(())
    }
}

/// Radio data output on PB0
pub struct PortBTx;

impl TxLine for PortBTx {
    type Error = HalError;

    fn set_level(&mut self, high: bool) -> Result<(), Self::Error> {
        write_reg(data_addr(GPIOB_BASE, TX_PIN), if high { TX_PIN } else { 0 });
        Ok(())
    }

    fn level(&mut self) -> Result<bool, Self::Error> {
        Ok(read_reg(data_addr(GPIOB_BASE, TX_PIN)) & TX_PIN != 0)
    }
}

/// NVIC access for the three sources
pub struct NvicControl {
    nvic: NVIC,
}

impl NvicControl {
    pub fn new(nvic: NVIC) -> Self {
        Self { nvic }
    }
}

impl InterruptControl for NvicControl {
    type Error = HalError;

    fn set_priority(&mut self, source: IrqSource, priority: u8) -> Result<(), Self::Error> {
        if priority >= 1 << NVIC_PRIO_BITS {
            return Err(HalError::InvalidConfig);
        }
        // Implemented bits sit at the top of the byte
        unsafe { self.nvic.set_priority(Irq::from(source), priority << (8 - NVIC_PRIO_BITS)) };
        Ok(())
    }

    fn enable(&mut self, source: IrqSource) -> Result<(), Self::Error> {
        unsafe { NVIC::unmask(Irq::from(source)) };
        Ok(())
    }

    fn disable(&mut self, source: IrqSource) -> Result<(), Self::Error> {
        NVIC::mask(Irq::from(source));
        Ok(())
    }
}

/// TM4C123 board for the control loop
pub struct Tm4cBoard {
    columns: PortEColumns,
    interrupts: NvicControl,
}

impl Tm4cBoard {
    /// Bring up clocks, pins and both timers; every interrupt stays masked
    pub fn new(nvic: NVIC, config: &AskConfig) -> Result<Self, HalError> {
        enable_peripheral_clocks();
        configure_gpio_pins();
        configure_timers(config)?;

        #[cfg(feature = "defmt")]
        defmt::info!("TM4C123 HAL initialized");

        Ok(Self {
            columns: PortEColumns,
            interrupts: NvicControl::new(nvic),
        })
    }
}

impl Platform for Tm4cBoard {
    type Columns = PortEColumns;
    type Interrupts = NvicControl;
    type Error = HalError;

    fn keypad_control(&mut self) -> (&mut PortEColumns, &mut NvicControl) {
        (&mut self.columns, &mut self.interrupts)
    }

    fn interrupts(&mut self) -> &mut NvicControl {
        &mut self.interrupts
    }

    fn wait_for_interrupt(&mut self) -> Result<(), Self::Error> {
        cortex_m::asm::wfi();
        Ok(())
    }

    fn guard_delay(&mut self, duration: Duration) -> Result<(), Self::Error> {
        let cycles = CLOCK_HZ as u64 * duration.as_micros() / 1_000_000;
        let cycles = u32::try_from(cycles).map_err(|_| HalError::InvalidConfig)?;
        critical_section::with(|_| cortex_m::asm::delay(cycles));
        Ok(())
    }
}

/// Clear the bit tick timeout flag (called from TIMER0A)
pub fn ack_bit_tick() {
    write_reg(TIMER0_BASE + TIMER_ICR, TIMER_TATO);
}

/// Clear the column tick timeout flag (called from TIMER0B)
pub fn ack_column_tick() {
    write_reg(TIMER0_BASE + TIMER_ICR, TIMER_TBTO);
}

fn enable_peripheral_clocks() {
    modify_reg(SYSCTL_RCGCGPIO, 0, PORTA | PORTB | PORTE);
    while read_reg(SYSCTL_PRGPIO) & (PORTA | PORTB | PORTE) != (PORTA | PORTB | PORTE) {}
    modify_reg(SYSCTL_RCGCTIMER, 0, 1);
    while read_reg(SYSCTL_PRTIMER) & 1 == 0 {}
}

fn configure_gpio_pins() {
    // PE0-3: digital outputs, start low
    modify_reg(GPIOE_BASE + GPIO_AMSEL, COLUMN_PINS, 0);
    modify_reg(GPIOE_BASE + GPIO_AFSEL, COLUMN_PINS, 0);
    modify_reg(GPIOE_BASE + GPIO_PCTL, 0xFFFF, 0);
    modify_reg(GPIOE_BASE + GPIO_DIR, 0, COLUMN_PINS);
    modify_reg(GPIOE_BASE + GPIO_DEN, 0, COLUMN_PINS);
    write_reg(data_addr(GPIOE_BASE, COLUMN_PINS), 0);

    // PB0: digital output, start low
    modify_reg(GPIOB_BASE + GPIO_AMSEL, TX_PIN, 0);
    modify_reg(GPIOB_BASE + GPIO_AFSEL, TX_PIN, 0);
    modify_reg(GPIOB_BASE + GPIO_PCTL, 0xF, 0);
    modify_reg(GPIOB_BASE + GPIO_DIR, 0, TX_PIN);
    modify_reg(GPIOB_BASE + GPIO_DEN, 0, TX_PIN);
    write_reg(data_addr(GPIOB_BASE, TX_PIN), 0);

    // PA2-5: pulled-down inputs, rising-edge interrupt
    modify_reg(GPIOA_BASE + GPIO_AMSEL, ROW_PINS, 0);
    modify_reg(GPIOA_BASE + GPIO_AFSEL, ROW_PINS, 0);
    modify_reg(GPIOA_BASE + GPIO_PCTL, 0x00FF_FF00, 0);
    modify_reg(GPIOA_BASE + GPIO_DIR, ROW_PINS, 0);
    modify_reg(GPIOA_BASE + GPIO_PDR, 0, ROW_PINS);
    modify_reg(GPIOA_BASE + GPIO_DEN, 0, ROW_PINS);
    modify_reg(GPIOA_BASE + GPIO_IS, ROW_PINS, 0);
    modify_reg(GPIOA_BASE + GPIO_IBE, ROW_PINS, 0);
    modify_reg(GPIOA_BASE + GPIO_IEV, 0, ROW_PINS);
    write_reg(GPIOA_BASE + GPIO_ICR, ROW_PINS);
    modify_reg(GPIOA_BASE + GPIO_IM, 0, ROW_PINS);
}

fn configure_timers(config: &AskConfig) -> Result<(), HalError> {
    let bit_reload = config.bit_timer_reload(CLOCK_HZ);
    let column_reload = config.column_timer_reload(CLOCK_HZ, COLUMN_PRESCALE);
    if !(1..=0x1_0000).contains(&bit_reload) || !(1..=0x1_0000).contains(&column_reload) {
        return Err(HalError::InvalidConfig);
    }

    // Both halves off while reconfiguring
    modify_reg(TIMER0_BASE + TIMER_CTL, TIMER_CTL_TAEN | TIMER_CTL_TBEN, 0);
    write_reg(TIMER0_BASE + TIMER_CFG, TIMER_CFG_16BIT);

    write_reg(TIMER0_BASE + TIMER_TAMR, TIMER_MR_PERIODIC);
    write_reg(TIMER0_BASE + TIMER_TAPR, 0);
    write_reg(TIMER0_BASE + TIMER_TAILR, bit_reload - 1);

    write_reg(TIMER0_BASE + TIMER_TBMR, TIMER_MR_PERIODIC);
    write_reg(TIMER0_BASE + TIMER_TBPR, COLUMN_PRESCALE - 1);
    write_reg(TIMER0_BASE + TIMER_TBILR, column_reload - 1);

    write_reg(TIMER0_BASE + TIMER_ICR, TIMER_TATO | TIMER_TBTO);
    modify_reg(TIMER0_BASE + TIMER_IMR, 0, TIMER_TATO | TIMER_TBTO);
    modify_reg(TIMER0_BASE + TIMER_CTL, 0, TIMER_CTL_TAEN | TIMER_CTL_TBEN);

    #[cfg(feature = "defmt")]
    defmt::debug!("Timer0 reloads: bit {}, column {}", bit_reload, column_reload);

    Ok(())
}
