//! Interactive console menu.
//!
//! Reads choices from stdin and drives an [`Engine`]. Ctrl-C while a scan or
//! mode change is in flight cancels that operation; Ctrl-C at the prompt
//! leaves the menu.

use std::future::Future;
use std::sync::Arc;

use scanlink_engine::{CancellationToken, Engine, EngineError, Mode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::error::RunnerResult;

/// A menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Scan,
    Continuous,
    Trigger,
    ShowMode,
    Quit,
}

impl MenuChoice {
    /// Parse a line typed at the prompt.
    pub fn parse(line: &str) -> Option<MenuChoice> {
        match line.trim().to_ascii_lowercase().as_str() {
            "1" | "scan" => Some(MenuChoice::Scan),
            "2" | "continuous" => Some(MenuChoice::Continuous),
            "3" | "trigger" => Some(MenuChoice::Trigger),
            "4" | "mode" => Some(MenuChoice::ShowMode),
            "q" | "quit" | "exit" => Some(MenuChoice::Quit),
            _ => None,
        }
    }
}

fn print_menu(mode: Mode) {
    println!();
    println!("scanlink ({} mode)", mode);
    println!("  1) scan");
    println!("  2) continuous mode");
    println!("  3) trigger mode");
    println!("  4) show mode");
    println!("  q) quit");
}

/// Run `op`; a Ctrl-C fires `cancel` and then waits for `op` to wind down.
async fn interruptible<F: Future>(cancel: &CancellationToken, op: F) -> F::Output {
    tokio::pin!(op);
    tokio::select! {
        out = &mut op => out,
        Ok(()) = tokio::signal::ctrl_c() => {
            info!("interrupted, cancelling");
            cancel.cancel();
            op.await
        }
    }
}

fn report(result: Result<(), EngineError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => println!("cancelled ({})", err),
        Err(err) => println!("error: {}", err),
    }
}

/// Run the menu until the user quits, stdin closes, or the engine stops.
pub async fn run(engine: Arc<Engine>) -> RunnerResult<()> {
    let subscription = engine.subscribe(|barcode| println!("good read: {}", barcode));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_menu(engine.current_mode());

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Ok(()) = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(choice) = MenuChoice::parse(&line) else {
            println!("unknown choice {:?}", line.trim());
            continue;
        };

        let cancel = CancellationToken::new();
        match choice {
            MenuChoice::Scan => match interruptible(&cancel, engine.scan(&cancel)).await {
                Ok(barcode) => println!("barcode: {}", barcode),
                Err(err) => report(Err(err)),
            },
            MenuChoice::Continuous => {
                report(interruptible(&cancel, engine.set_mode(Mode::Continuous, &cancel)).await)
            }
            MenuChoice::Trigger => {
                report(interruptible(&cancel, engine.set_mode(Mode::Trigger, &cancel)).await)
            }
            MenuChoice::ShowMode => println!("mode: {}", engine.current_mode()),
            MenuChoice::Quit => break,
        }

        if !engine.is_running() {
            warn!("engine stopped, leaving menu");
            break;
        }
    }

    engine.unsubscribe(subscription);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choices() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::Scan));
        assert_eq!(MenuChoice::parse(" 2\n"), Some(MenuChoice::Continuous));
        assert_eq!(MenuChoice::parse("Trigger"), Some(MenuChoice::Trigger));
        assert_eq!(MenuChoice::parse("4"), Some(MenuChoice::ShowMode));
        assert_eq!(MenuChoice::parse("Q"), Some(MenuChoice::Quit));
        assert_eq!(MenuChoice::parse("7"), None);
    }
}
