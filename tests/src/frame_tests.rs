//! Frame table and radio-level checks on captured transmissions

#[cfg(test)]
mod tests {
    use crate::Rig;
    use askpad_core::hal::{Duration, InterruptControl, IrqSource, Platform};
    use askpad_core::radiohead::{decode_frame, Header};
    use askpad_core::types::{Command, FRAME_BITS};
    use askpad_core::{CommandDispatcher, DispatchOutcome, DEFAULT_FRAMES};
    use rstest::rstest;

    /// On-air nibbles of the "hello" packet as a receiver captures them
    const HELLO_PREAMBLE: [u8; 27] = [
        0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x1, 0xc, 0xd, 0xb, 0x1, 0x5, 0x2, 0xc, 0xb,
        0x2, 0xc, 0xb, 0xb, 0x2, 0xc, 0xb, 0x2, 0xc,
    ];
    const HELLO_BODY: [u8; 21] = [
        0x5, 0xb, 0x1, 0x5, 0xa, 0x6, 0x5, 0x9, 0x5, 0x5, 0x9, 0x5, 0x5, 0x8, 0xb, 0x7, 0x0, 0xb,
        0xb, 0x0, 0xb,
    ];

    /// Press `key` once and return the payload text that went on air
    fn send_key(key: char) -> String {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        assert!(board.press(key, Duration::from_millis(2), Duration::from_millis(40)));
        let outcome = dispatcher.run_once(&mut board).unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent { .. }));

        let sent = board.transmissions();
        assert_eq!(sent.len(), 1);
        let packet = decode_frame(&sent[0].nibbles()).unwrap();
        assert_eq!(packet.header, Header::default());
        String::from_utf8(packet.payload.to_vec()).unwrap()
    }

    #[rstest]
    #[case('0', "hello")]
    #[case('1', "OnOff")]
    #[case('2', "Menus")]
    #[case('3', "Ntflx")]
    #[case('4', "Muted")]
    #[case('5', "Power")]
    #[case('6', "Swtch")]
    fn test_key_sends_labelled_packet(#[case] key: char, #[case] label: &str) {
        assert_eq!(send_key(key), label);
    }

    #[test]
    fn test_hello_frame_bit_exact() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        board.press('0', Duration::from_millis(1), Duration::from_millis(30));
        assert_eq!(
            dispatcher.run_once(&mut board).unwrap(),
            DispatchOutcome::Sent { key: '0', command: 0 }
        );

        let sent = &board.transmissions()[0];
        let expected: Vec<bool> = DEFAULT_FRAMES.bits(0).unwrap().collect();
        assert_eq!(sent.command, 0);
        assert_eq!(sent.bits.len(), FRAME_BITS);
        assert_eq!(sent.bits, expected);
        let nibbles = sent.nibbles();
        assert_eq!(nibbles.len(), 48);
        assert_eq!(nibbles[..27], HELLO_PREAMBLE);
        assert_eq!(nibbles[27..], HELLO_BODY);
        assert_eq!(
            nibbles.as_slice(),
            DEFAULT_FRAMES.frame_for(Command::Hello).unwrap().as_slice()
        );
    }

    #[test]
    fn test_frame_timing_follows_bit_rate() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        // Column 1 ('0') is driven from 5 ms, so the key lands then
        board.press('0', Duration::from_millis(1), Duration::from_millis(30));
        dispatcher.run_once(&mut board).unwrap();

        let sent = &board.transmissions()[0];
        let finished = sent.finished.unwrap();
        assert_eq!(sent.started.as_micros(), 5_500);
        assert_eq!(finished.duration_since(sent.started), rig.config.frame_duration());

        // Line left low, then the guard interval
        assert!(!board.tx_ref().is_high());
        assert_eq!(
            board.now().duration_since(finished),
            rig.config.guard_interval
        );
    }

    #[test]
    fn test_every_table_row_is_a_valid_packet() {
        for command in Command::ALL {
            let frame = DEFAULT_FRAMES.frame_for(command).unwrap();
            let packet = decode_frame(&frame).unwrap();
            assert_eq!(packet.payload.as_slice(), command.label().as_bytes());
        }
    }

    #[test]
    fn test_idle_ticks_keep_line_low() {
        let rig = Rig::default();
        let mut board = rig.board();
        // Bit tick enabled with nothing armed
        board.interrupts().enable(IrqSource::BitTick).unwrap();
        board.run_until(Duration::from_millis(10)).unwrap();

        assert!(board.transmissions().is_empty());
        assert!(board.tx_ref().writes().iter().all(|&level| !level));
        assert_eq!(board.tx_ref().writes().len(), 20);
    }
}
