// Simulated keypad session: every command key pressed once, frames decoded
// the way a RadioHead receiver would see them

use askpad_core::hal::Duration;
use askpad_core::radiohead::decode_frame;
use askpad_core::sim::SimBoard;
use askpad_core::{
    default_config, BitSequencer, CommandDispatcher, KeyMailbox, KeypadScanner, DEFAULT_FRAMES,
    DEFAULT_KEYMAP,
};

fn main() {
    println!("🧪 Simulated Keypad Session");

    let config = default_config();
    let mailbox = KeyMailbox::new();
    let scanner = KeypadScanner::new(DEFAULT_KEYMAP);
    let sequencer = BitSequencer::new(DEFAULT_FRAMES);
    let mut board = SimBoard::new(&mailbox, &scanner, &sequencer, &config);
    let mut dispatcher = CommandDispatcher::new(&mailbox, &scanner, &sequencer, config);

    println!(
        "⚙️ {} bit/s, frame {} ms, guard {} ms",
        config.bit_rate_hz(),
        config.frame_duration().as_millis(),
        config.guard_interval.as_millis()
    );

    let keys = ['0', '1', '2', '3', '4', '5', '6', '*'];
    for (i, &key) in keys.iter().enumerate() {
        let at = Duration::from_millis(100 + 1500 * i as u64);
        board.press(key, at, Duration::from_millis(40));
    }
    board.set_deadline(Duration::from_secs(20));

    if let Err(e) = dispatcher.start(&mut board) {
        println!("❌ Start failed: {}", e);
        return;
    }

    loop {
        match dispatcher.run_once(&mut board) {
            Ok(outcome) => println!("  [{:>6} ms] {:?}", board.now().as_millis(), outcome),
            Err(_) => break,
        }
        // An unknown key stays pending and would repeat forever
        if mailbox.is_pending() {
            println!("  ⚠️ Key left pending, stopping");
            break;
        }
    }

    println!();
    println!("📡 Frames on air:");
    for tx in board.transmissions() {
        let payload = match decode_frame(&tx.nibbles()) {
            Ok(packet) => String::from_utf8_lossy(&packet.payload).into_owned(),
            Err(e) => format!("<{}>", e),
        };
        println!(
            "  cmd {} at {:>6} ms, {} bits -> {:?}",
            tx.command,
            tx.started.as_millis(),
            tx.bits.len(),
            payload
        );
    }

    println!("✅ {} frames sent", board.transmissions().len());
}
