//! Keypad scanning against the simulated matrix

#[cfg(test)]
mod tests {
    use crate::Rig;
    use askpad_core::hal::{Duration, HalError, Platform};
    use askpad_core::keypad::decode_line;
    use askpad_core::types::{KeyPress, DEFAULT_KEYMAP};
    use rstest::rstest;

    fn armed_rig_board(rig: &Rig) -> askpad_core::sim::SimBoard<'_, 'static> {
        let mut board = rig.board();
        let (columns, interrupts) = board.keypad_control();
        rig.scanner.enable::<_, _, HalError>(columns, interrupts).unwrap();
        board
    }

    #[rstest]
    #[case(0b0001, 0)]
    #[case(0b0010, 1)]
    #[case(0b0100, 2)]
    #[case(0b1000, 3)]
    fn test_decode_line_one_hot(#[case] bits: u8, #[case] index: usize) {
        assert_eq!(decode_line(bits), index);
    }

    #[test]
    fn test_every_key_decodes() {
        for row in 0..4 {
            for col in 0..4 {
                let rig = Rig::default();
                let mut board = armed_rig_board(&rig);
                board.press_at(row, col, Duration::from_millis(1), Duration::from_millis(25));
                board.run_until(Duration::from_millis(26)).unwrap();

                let expected = DEFAULT_KEYMAP.0[row][col];
                assert_eq!(rig.mailbox.take(), Some(expected), "row {} col {}", row, col);
                let (_, press) = board.decoded_keys()[0];
                assert_eq!(press, KeyPress { row, col, key: expected });
            }
        }
    }

    #[test]
    fn test_key_decodes_when_its_column_is_driven() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);

        // '9' is row 2, col 2: driven during 10..15 ms
        board.press('9', Duration::from_millis(1), Duration::from_millis(30));
        board.run_until(Duration::from_millis(9)).unwrap();
        assert!(!rig.mailbox.is_pending());

        board.run_until(Duration::from_millis(10)).unwrap();
        assert_eq!(rig.mailbox.key(), '9');
        assert_eq!(board.decoded_keys()[0].0.as_millis(), 10);
    }

    #[test]
    fn test_press_on_driven_column_decodes_immediately() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);

        // Column 0 is driven from the start
        board.press('4', Duration::from_millis(2), Duration::from_millis(10));
        board.run_until(Duration::from_millis(3)).unwrap();
        assert_eq!(rig.mailbox.take(), Some('4'));
        assert_eq!(board.decoded_keys()[0].0.as_millis(), 2);
    }

    #[test]
    fn test_held_key_repeats_every_sweep() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);

        // Held over two full sweeps of 20 ms each
        board.press('B', Duration::from_millis(1), Duration::from_millis(45));
        board.run_until(Duration::from_millis(50)).unwrap();

        let times: Vec<u64> = board.decoded_keys().iter().map(|(at, _)| at.as_millis()).collect();
        assert_eq!(times, [15, 35]);
    }

    #[test]
    fn test_columns_stay_one_hot() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);
        board.run_until(Duration::from_millis(200)).unwrap();

        assert_eq!(board.one_hot_violations(), 0);
        let history = board.columns_ref().history();
        assert_eq!(history.len(), 41);
        assert!(history.iter().all(|p| p.count_ones() == 1));
        assert_eq!(&history[..5], &[0x01, 0x02, 0x04, 0x08, 0x01]);
    }

    #[test]
    fn test_suspended_keypad_ignores_presses() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);
        let (columns, interrupts) = board.keypad_control();
        rig.scanner.disable::<_, _, HalError>(columns, interrupts).unwrap();

        board.press('5', Duration::from_millis(1), Duration::from_millis(40));
        board.run_until(Duration::from_millis(50)).unwrap();

        assert!(!rig.mailbox.is_pending());
        assert!(board.decoded_keys().is_empty());
        assert_eq!(board.columns_ref().pattern(), 0);
    }

    #[test]
    fn test_later_press_overwrites_unread_key() {
        let rig = Rig::default();
        let mut board = armed_rig_board(&rig);

        board.press('1', Duration::from_millis(1), Duration::from_millis(3));
        board.press('2', Duration::from_millis(6), Duration::from_millis(3));
        board.run_until(Duration::from_millis(10)).unwrap();

        assert_eq!(board.decoded_keys().len(), 2);
        assert_eq!(rig.mailbox.take(), Some('2'));
    }
}
