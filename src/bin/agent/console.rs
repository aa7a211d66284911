use cart_agent::{OperatorGate, SignInDecision};
use std::io::{BufRead, Write};
use tracing::info;

/// Sign-in gate on the terminal: Enter continues, `q` or end of input cancels.
pub struct ConsoleGate;

impl OperatorGate for ConsoleGate {
    fn await_sign_in(&self, url: &str) -> SignInDecision {
        info!(url, "waiting for operator on the console");
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nSign-in required at {url}");
        let _ = write!(stderr, "Sign in in the browser window, then press Enter (q to cancel): ");
        let _ = stderr.flush();

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line);
        let answer = match read {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.as_str()),
        };
        decision_from_line(answer)
    }
}

fn decision_from_line(line: Option<&str>) -> SignInDecision {
    match line.map(|l| l.trim().to_ascii_lowercase()) {
        Some(answer) if answer == "q" || answer == "quit" || answer == "cancel" => {
            SignInDecision::Cancel
        }
        Some(_) => SignInDecision::Continue,
        None => SignInDecision::Cancel,
    }
}
