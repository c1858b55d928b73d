#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Panic handler
#[cfg(feature = "defmt")]
use panic_probe as _;
#[cfg(not(feature = "defmt"))]
use panic_halt as _;

use cortex_m_rt::entry;

use askpad_firmware::*;

/// Main firmware entry point
#[entry]
fn main() -> ! {
    #[cfg(feature = "defmt")]
    defmt::info!("Askpad firmware starting...");

    let config = default_config();
    let core = match cortex_m::Peripherals::take() {
        Some(core) => core,
        None => halt(),
    };

    let mut board = match Tm4cBoard::new(core.NVIC, &config) {
        Ok(board) => board,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::error!("Hardware init failed: {}", _e);
            halt()
        }
    };

    #[cfg(feature = "defmt")]
    defmt::info!(
        "{} bit/s, {} commands, guard {} ms",
        config.bit_rate_hz(),
        SEQUENCER.frames().len(),
        config.guard_interval.as_millis()
    );

    let mut dispatcher = CommandDispatcher::new(&MAILBOX, &SCANNER, &SEQUENCER, config);
    if dispatcher.start(&mut board).is_err() {
        halt();
    }

    #[cfg(feature = "defmt")]
    defmt::info!("Keypad armed");

    match dispatcher.run(&mut board) {
        Ok(never) => match never {},
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::error!("Dispatcher stopped: {}", _e);
            halt()
        }
    }
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[allow(non_snake_case)]
#[no_mangle]
extern "C" fn GPIOA() {
    on_row_edge();
}

#[allow(non_snake_case)]
#[no_mangle]
extern "C" fn TIMER0A() {
    on_bit_tick();
}

#[allow(non_snake_case)]
#[no_mangle]
extern "C" fn TIMER0B() {
    on_column_tick();
}

/// Device vector table entry
pub union Vector {
    handler: unsafe extern "C" fn(),
    reserved: usize,
}

extern "C" {
    fn DefaultHandler();
}

/// IRQ 0..=20: GPIOA at 0, Timer0A at 19, Timer0B at 20
#[link_section = ".vector_table.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Vector; 21] = [
    Vector { handler: GPIOA },
    Vector { handler: DefaultHandler }, // GPIOB
    Vector { handler: DefaultHandler }, // GPIOC
    Vector { handler: DefaultHandler }, // GPIOD
    Vector { handler: DefaultHandler }, // GPIOE
    Vector { handler: DefaultHandler }, // UART0
    Vector { handler: DefaultHandler }, // UART1
    Vector { handler: DefaultHandler }, // SSI0
    Vector { handler: DefaultHandler }, // I2C0
    Vector { handler: DefaultHandler }, // PWM0_FAULT
    Vector { handler: DefaultHandler }, // PWM0_0
    Vector { handler: DefaultHandler }, // PWM0_1
    Vector { handler: DefaultHandler }, // PWM0_2
    Vector { handler: DefaultHandler }, // QEI0
    Vector { handler: DefaultHandler }, // ADC0SS0
    Vector { handler: DefaultHandler }, // ADC0SS1
    Vector { handler: DefaultHandler }, // ADC0SS2
    Vector { handler: DefaultHandler }, // ADC0SS3
    Vector { handler: DefaultHandler }, // WATCHDOG
    Vector { handler: TIMER0A },
    Vector { handler: TIMER0B },
];
