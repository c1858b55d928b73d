//! End-to-end control loop behaviour

#[cfg(test)]
mod tests {
    use crate::Rig;
    use askpad_core::hal::{Duration, HalError, IrqSource};
    use askpad_core::types::{AskConfig, DispatcherState, InvalidKeyPolicy, Priorities};
    use askpad_core::{CommandDispatcher, DispatchOutcome, SequencerPhase};

    fn policy_rig(policy: InvalidKeyPolicy) -> Rig {
        Rig::new(AskConfig {
            invalid_key_policy: policy,
            ..AskConfig::default()
        })
    }

    #[test]
    fn test_start_applies_priorities_and_arms_keypad() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        let irq = board.interrupts_ref();
        let bit = irq.priority(IrqSource::BitTick).unwrap();
        assert!(bit < irq.priority(IrqSource::RowEdge).unwrap());
        assert!(bit < irq.priority(IrqSource::ColumnTick).unwrap());

        assert!(!irq.is_enabled(IrqSource::BitTick));
        assert!(irq.is_enabled(IrqSource::RowEdge));
        assert!(irq.is_enabled(IrqSource::ColumnTick));
        assert_eq!(board.columns_ref().pattern(), 0x01);
        assert_eq!(dispatcher.state(), DispatcherState::WaitingForKey);
    }

    #[test]
    fn test_invalid_priorities_rejected() {
        let inverted = Priorities {
            bit_tick: 3,
            row_edge: 2,
            column_tick: 1,
        };
        assert!(AskConfig::new(
            2000,
            Duration::from_millis(5),
            Duration::from_millis(1000),
            inverted,
            InvalidKeyPolicy::default(),
        )
        .is_err());
    }

    #[test]
    fn test_keypad_suspended_during_transmission() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        board.press('2', Duration::from_millis(1), Duration::from_millis(30));
        dispatcher.run_once(&mut board).unwrap();

        assert!(!board.keypad_active_during_tx());
        // Column history: running, then all low for the frame, then column 0 again
        let history = board.columns_ref().history();
        let suspended = history.iter().position(|&p| p == 0).unwrap();
        assert_eq!(history[suspended + 1..], [0x01]);
        assert_eq!(rig.scanner.active_column(), Some(0));
        assert_eq!(rig.sequencer.phase(), SequencerPhase::Idle);
    }

    #[test]
    fn test_second_press_during_transmission_ignored() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        // '5' lands at 5 ms; '3' is pressed and released mid-frame
        board.press('5', Duration::from_millis(1), Duration::from_millis(20));
        board.press('3', Duration::from_millis(40), Duration::from_millis(30));
        assert_eq!(
            dispatcher.run_once(&mut board).unwrap(),
            DispatchOutcome::Sent { key: '5', command: 5 }
        );

        assert_eq!(board.decoded_keys().len(), 1);
        assert!(!rig.mailbox.is_pending());

        // Nothing else arrives before the deadline
        board.set_deadline(Duration::from_secs(5));
        assert_eq!(dispatcher.run_once(&mut board), Err(HalError::TimingError));
        assert_eq!(board.transmissions().len(), 1);
    }

    #[test]
    fn test_presses_after_guard_are_sent_in_order() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        board.press('1', Duration::from_millis(1), Duration::from_millis(30));
        board.press('4', Duration::from_millis(1500), Duration::from_millis(30));

        let first = dispatcher.run_once(&mut board).unwrap();
        let second = dispatcher.run_once(&mut board).unwrap();
        assert_eq!(first, DispatchOutcome::Sent { key: '1', command: 1 });
        assert_eq!(second, DispatchOutcome::Sent { key: '4', command: 4 });

        let commands: Vec<u8> = board.transmissions().iter().map(|t| t.command).collect();
        assert_eq!(commands, [1, 4]);
    }

    #[test]
    fn test_key_held_through_guard_is_sent_again() {
        let rig = Rig::default();
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        // '1' sits on column 0, which is driven as soon as the keypad resumes
        board.press('1', Duration::from_millis(1), Duration::from_millis(1500));
        dispatcher.run_once(&mut board).unwrap();
        let resumed = board.now();
        dispatcher.run_once(&mut board).unwrap();

        let sent = board.transmissions();
        assert_eq!(sent.len(), 2);
        assert_eq!(board.decoded_keys()[1].0, resumed);
    }

    #[test]
    fn test_invalid_key_stays_pending_and_blocks_keypad() {
        // Keys outside the table are dropped without clearing the mailbox, so
        // the same key is re-read on every cycle and the keypad never gets a
        // window to decode a new press.
        let rig = policy_rig(InvalidKeyPolicy::RetainPending);
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        // '*' is row 3, col 0
        board.press('*', Duration::from_millis(1), Duration::from_millis(20));
        board.press('0', Duration::from_millis(1200), Duration::from_millis(50));

        for _ in 0..3 {
            assert_eq!(
                dispatcher.run_once(&mut board).unwrap(),
                DispatchOutcome::Skipped { key: '*', command: 250 }
            );
            assert!(rig.mailbox.is_pending());
        }

        assert!(board.transmissions().is_empty());
        assert_eq!(board.decoded_keys().len(), 1);
        assert_eq!(board.now().as_millis(), 1 + 3 * 1000);
    }

    #[test]
    fn test_invalid_key_cleared_when_configured() {
        let rig = policy_rig(InvalidKeyPolicy::ClearAndIgnore);
        let mut board = rig.board();
        let mut dispatcher = CommandDispatcher::new(&rig.mailbox, &rig.scanner, &rig.sequencer, rig.config);
        dispatcher.start(&mut board).unwrap();

        // '#' is row 3, col 2; 'A' is row 0, col 3
        board.press('#', Duration::from_millis(1), Duration::from_millis(20));
        board.press('A', Duration::from_millis(1100), Duration::from_millis(30));
        board.press('6', Duration::from_millis(2200), Duration::from_millis(30));

        assert_eq!(
            dispatcher.run_once(&mut board).unwrap(),
            DispatchOutcome::Skipped { key: '#', command: 243 }
        );
        assert!(!rig.mailbox.is_pending());
        assert_eq!(
            dispatcher.run_once(&mut board).unwrap(),
            DispatchOutcome::Skipped { key: 'A', command: 17 }
        );
        assert_eq!(
            dispatcher.run_once(&mut board).unwrap(),
            DispatchOutcome::Sent { key: '6', command: 6 }
        );
        assert_eq!(board.transmissions().len(), 1);
        assert_eq!(dispatcher.state(), DispatcherState::WaitingForKey);
    }
}
