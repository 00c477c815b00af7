mod common;

use anyhow::Result;
use common::{ScriptedConsole, paper_book, position};
use chrono::Utc;
use std::time::Duration;
use tpsl_dashboard::config::SetterConfig;
use tpsl_dashboard::connection::{MockTradingTerminal, TradingTerminal};
use tpsl_dashboard::orders::{RetCode, SubmitResult};
use tpsl_dashboard::paper::PaperTerminal;
use tpsl_dashboard::portfolio::Side;
use tpsl_dashboard::tpsl_setter::{ModifyOutcome, TpSlSetter};

#[cfg(test)]
mod tpsl_setter_tests {
    use super::*;

    fn two_positions() -> PaperTerminal {
        PaperTerminal::new(paper_book(
            vec![
                position(1, "EURUSD", Side::Buy, 1.1000, None, None),
                position(2, "GBPUSD", Side::Sell, 1.2700, Some(1.2500), None),
            ],
            1000.0,
        ))
    }

    #[test]
    fn test_applies_targets_to_every_position() -> Result<()> {
        let mut terminal = two_positions();
        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["1.2000", "1.0500", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.submitted, 2);
        assert_eq!(report.count(ModifyOutcome::Updated), 2);
        assert_eq!(report.restarts, 0);
        assert!(report.finished_at <= Utc::now());
        assert_eq!(terminal.positions()[0].take_profit(), Some(1.2000));
        assert_eq!(terminal.positions()[1].stop_loss(), Some(1.0500));

        let request = &terminal.submissions()[0];
        assert_eq!(request.magic, 234000);
        assert_eq!(request.comment, "Bulk TP/SL Setter");

        let screen = console.plain_screen();
        assert!(screen.contains("Found 2 open trade(s):"));
        assert!(screen.contains("Applying TP/SL to all positions..."));
        assert!(screen.contains("EURUSD → Updated."));
        assert!(screen.contains("GBPUSD → Updated."));
        assert!(screen.contains("UPDATE COMPLETE"));
        assert_eq!(
            console.prompts.last().map(String::as_str),
            Some("Press Enter to return to summary...")
        );
        // One courtesy delay per submitted request
        let submit_delay = Duration::from_millis(config.submit_delay_ms);
        assert_eq!(console.pauses.iter().filter(|p| **p == submit_delay).count(), 2);
        Ok(())
    }

    #[test]
    fn test_second_identical_run_submits_nothing() -> Result<()> {
        let mut terminal = two_positions();
        let config = SetterConfig::default();

        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["1.2000", "1.0500", ""]);
        TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;
        assert_eq!(terminal.submissions().len(), 2);

        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["1.2000", "1.0500", ""]);
        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.submitted, 0);
        assert_eq!(report.count(ModifyOutcome::AlreadySet), 2);
        assert_eq!(terminal.submissions().len(), 2);
        assert!(console.plain_screen().contains("EURUSD → Already Set."));
        Ok(())
    }

    #[test]
    fn test_zero_keeps_existing_level() -> Result<()> {
        let mut terminal = two_positions();
        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["0", "1.3000", ""]);
        let config = SetterConfig::default();

        TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        let gbp = &terminal.submissions()[1];
        assert_eq!(gbp.tp, Some(1.2500));
        assert_eq!(gbp.sl, Some(1.3000));
        let eur = &terminal.submissions()[0];
        assert_eq!(eur.tp, None);
        Ok(())
    }

    #[test]
    fn test_invalid_input_reprompts() -> Result<()> {
        let mut terminal = two_positions();
        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["abc", "1.2000", "-3", "1.2000", "1.0500", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.count(ModifyOutcome::Updated), 2);
        assert_eq!(
            console.prompts,
            vec![
                "TP Price: ",
                "TP Price: ",
                "SL Price: ",
                "TP Price: ",
                "SL Price: ",
                "Press Enter to return to summary...",
            ]
        );
        assert_eq!(console.plain_screen().matches("Invalid input. Please enter valid numbers.").count(), 2);
        assert!(console.pauses.contains(&Duration::from_millis(config.invalid_input_pause_ms)));
        Ok(())
    }

    #[test]
    fn test_auto_trading_disabled_restarts_without_reprompt() -> Result<()> {
        let mut terminal = two_positions();
        terminal.disable_auto_trading_for(1);
        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["1.2000", "1.0500", "", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.restarts, 1);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.count(ModifyOutcome::Updated), 2);
        assert_eq!(terminal.submissions().len(), 3);
        assert_eq!(
            console.prompts,
            vec![
                "TP Price: ",
                "SL Price: ",
                "Enable AutoTrading and press Enter to retry...",
                "Press Enter to return to summary...",
            ]
        );
        assert!(!console.plain_screen().contains("FAILED"));
        Ok(())
    }

    #[test]
    fn test_restart_rereads_levels_applied_before_interruption() -> Result<()> {
        let mut terminal = MockTradingTerminal::new();
        let mut calls = 0;
        terminal
            .expect_submit_modification()
            .times(3)
            .returning(move |_| {
                calls += 1;
                Ok(match calls {
                    2 => SubmitResult::new(RetCode::CLIENT_DISABLES_AT, "AutoTrading disabled by client"),
                    _ => SubmitResult::new(RetCode::DONE, "Request completed"),
                })
            });
        terminal.expect_list_open_positions().times(1).returning(|| {
            Ok(vec![
                position(3, "USDJPY", Side::Buy, 150.0, None, None),
                position(2, "GBPUSD", Side::Sell, 1.27, Some(1.25), None),
                position(1, "EURUSD", Side::Buy, 1.1, Some(1.2), Some(1.05)),
            ])
        });

        let positions = vec![
            position(1, "EURUSD", Side::Buy, 1.1, None, None),
            position(2, "GBPUSD", Side::Sell, 1.27, Some(1.25), None),
        ];
        let mut console = ScriptedConsole::with_lines(&["1.2", "1.05", "", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.restarts, 1);
        assert_eq!(report.failures(), 0);
        let tickets: Vec<u64> = report.outcomes.iter().map(|o| o.ticket).collect();
        assert_eq!(tickets, vec![1, 2]);
        assert_eq!(report.outcomes[0].outcome, ModifyOutcome::AlreadySet);
        assert_eq!(report.outcomes[1].outcome, ModifyOutcome::Updated);
        assert_eq!(report.submitted, 1);
        assert!(!console.plain_screen().contains("FAILED"));
        Ok(())
    }

    #[test]
    fn test_closed_input_aborts_the_setter() {
        let mut terminal = two_positions();
        let positions = vec![position(1, "EURUSD", Side::Buy, 1.1, None, None)];
        let mut console = ScriptedConsole::with_lines(&[]);
        let config = SetterConfig::default();

        let result = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions);

        assert!(result.is_err());
        assert!(terminal.submissions().is_empty());
        assert_eq!(console.prompts, vec!["TP Price: "]);
    }

    #[test]
    fn test_failure_does_not_stop_the_batch() -> Result<()> {
        let mut terminal = two_positions();
        terminal.reject_ticket(1, RetCode(10016));
        let positions = terminal.list_open_positions()?;
        let mut console = ScriptedConsole::with_lines(&["1.2000", "1.0500", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.outcomes[0].outcome, ModifyOutcome::Failed(RetCode(10016)));
        assert_eq!(report.outcomes[1].outcome, ModifyOutcome::Updated);
        assert!(console.plain_screen().contains("✗ EURUSD FAILED | RetCode: 10016"));
        Ok(())
    }

    #[test]
    fn test_no_changes_is_failure_unless_already_at_target() -> Result<()> {
        let mut terminal = MockTradingTerminal::new();
        terminal
            .expect_submit_modification()
            .withf(|request| request.position == 7 && request.tp == Some(1.2) && request.sl == Some(1.0))
            .times(1)
            .returning(|_| Ok(SubmitResult::new(RetCode::NO_CHANGES, "No changes")));

        let positions = vec![position(7, "EURUSD", Side::Buy, 1.1, Some(1.2), Some(1.05))];
        let mut console = ScriptedConsole::with_lines(&["1.2", "1.0", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.outcomes[0].outcome, ModifyOutcome::Failed(RetCode::NO_CHANGES));
        Ok(())
    }

    #[test]
    fn test_positions_at_target_are_never_submitted() -> Result<()> {
        let mut terminal = MockTradingTerminal::new();
        terminal.expect_submit_modification().times(0);

        let positions = vec![
            position(1, "EURUSD", Side::Buy, 1.1, Some(1.2), Some(1.0)),
            position(2, "EURUSD", Side::Buy, 1.1, Some(1.200001), None),
        ];
        let mut console = ScriptedConsole::with_lines(&["1.2", "0", ""]);
        let config = SetterConfig::default();

        let report = TpSlSetter::new(&mut terminal, &mut console, &config).run(&positions)?;

        assert_eq!(report.submitted, 0);
        assert_eq!(report.count(ModifyOutcome::AlreadySet), 2);
        Ok(())
    }
}
