//! Local operator panel: streams progress over SSE and takes the
//! continue/cancel answer at sign-in walls.

use anyhow::{Result, anyhow};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use cart_agent::{OperatorGate, SignInDecision};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

const PORT_ATTEMPTS: u16 = 10;

/// Events streamed to the panel via SSE.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    Step { number: usize, description: String },
    StepError { message: String },
    Thinking,
    SignInRequired { url: String },
    Resumed { decision: String },
    TaskComplete { summary: String },
    TaskError { message: String },
}

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::Step { .. } => "step",
            AgentEvent::StepError { .. } => "step_error",
            AgentEvent::Thinking => "thinking",
            AgentEvent::SignInRequired { .. } => "sign_in",
            AgentEvent::Resumed { .. } => "resumed",
            AgentEvent::TaskComplete { .. } => "task_complete",
            AgentEvent::TaskError { .. } => "task_error",
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            AgentEvent::Step {
                number,
                description,
            } => json!({"number": number, "description": description}),
            AgentEvent::StepError { message } | AgentEvent::TaskError { message } => {
                json!({"message": message})
            }
            AgentEvent::Thinking => json!({}),
            AgentEvent::SignInRequired { url } => json!({"url": url}),
            AgentEvent::Resumed { decision } => json!({"decision": decision}),
            AgentEvent::TaskComplete { summary } => json!({"summary": summary}),
        }
    }

    fn to_sse_event(&self) -> Event {
        Event::default()
            .event(self.name())
            .data(self.payload().to_string())
    }
}

#[derive(Clone)]
struct AppState {
    decision_tx: mpsc::Sender<SignInDecision>,
    event_tx: broadcast::Sender<AgentEvent>,
}

#[derive(Deserialize)]
struct DecisionPayload {
    decision: String,
}

fn parse_decision(text: &str) -> Option<SignInDecision> {
    match text.trim().to_ascii_lowercase().as_str() {
        "continue" => Some(SignInDecision::Continue),
        "cancel" => Some(SignInDecision::Cancel),
        _ => None,
    }
}

/// Handle to a running panel.
pub struct Panel {
    pub events: broadcast::Sender<AgentEvent>,
    decisions: mpsc::Receiver<SignInDecision>,
}

impl Panel {
    /// Gate that asks through this panel, plus a sender for progress events.
    pub fn gate(self) -> (PanelGate, broadcast::Sender<AgentEvent>) {
        let events = self.events.clone();
        (
            PanelGate {
                decisions: Mutex::new(self.decisions),
                events: self.events,
            },
            events,
        )
    }
}

/// Start the panel on the first free port from `first_port`.
pub async fn start_server(first_port: u16) -> Result<Panel> {
    let (decision_tx, decisions) = mpsc::channel::<SignInDecision>(4);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);

    let state = Arc::new(AppState {
        decision_tx,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/decision", post(decision_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state);

    let mut bound = None;
    for port in first_port..first_port.saturating_add(PORT_ATTEMPTS) {
        match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                bound = Some((listener, port));
                break;
            }
            Err(e) => debug!(port, error = %e, "port unavailable"),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow!(
            "could not bind any port in {}..{}",
            first_port,
            first_port.saturating_add(PORT_ATTEMPTS)
        )
    })?;

    info!("operator panel at http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "operator panel stopped");
        }
    });

    Ok(Panel {
        events: event_tx,
        decisions,
    })
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn decision_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DecisionPayload>,
) -> (StatusCode, &'static str) {
    let Some(decision) = parse_decision(&payload.decision) else {
        return (StatusCode::BAD_REQUEST, "expected continue or cancel");
    };
    debug!(?decision, "operator decision received");
    match state.decision_tx.send(decision).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::GONE, "no task is waiting"),
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<AgentEvent, _>| match result {
            Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
            Err(_) => None,
        });
    Sse::new(stream)
}

/// Sign-in gate answered from the web panel. Blocks the calling thread,
/// so it must only be used from blocking code.
pub struct PanelGate {
    decisions: Mutex<mpsc::Receiver<SignInDecision>>,
    events: broadcast::Sender<AgentEvent>,
}

impl OperatorGate for PanelGate {
    fn await_sign_in(&self, url: &str) -> SignInDecision {
        let Ok(mut decisions) = self.decisions.lock() else {
            warn!("decision channel poisoned, cancelling");
            return SignInDecision::Cancel;
        };
        // Answers clicked before this wall started are stale.
        while decisions.try_recv().is_ok() {}

        let _ = self.events.send(AgentEvent::SignInRequired { url: url.into() });
        info!(url, "waiting for operator decision in the panel");
        let decision = decisions.blocking_recv().unwrap_or(SignInDecision::Cancel);
        let _ = self.events.send(AgentEvent::Resumed {
            decision: format!("{decision:?}").to_lowercase(),
        });
        decision
    }
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Cart Agent</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body {
    background: #0a0a0f;
    color: #e0e0e0;
    font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
    height: 100vh;
    display: flex;
    flex-direction: column;
  }
  header {
    padding: 24px 32px;
    border-bottom: 1px solid #1a1a2e;
    display: flex;
    align-items: center;
    gap: 12px;
  }
  header h1 { font-size: 20px; font-weight: 600; color: #fff; }
  header .dot { width: 8px; height: 8px; border-radius: 50%; background: #22c55e; }
  header .dot.waiting { background: #f59e0b; }
  .main {
    flex: 1;
    display: flex;
    flex-direction: column;
    max-width: 800px;
    width: 100%;
    margin: 0 auto;
    padding: 24px 32px;
    gap: 16px;
    overflow: hidden;
  }
  #log { flex: 1; overflow-y: auto; display: flex; flex-direction: column; gap: 8px; }
  .entry { padding: 10px 14px; border-radius: 8px; font-size: 14px; line-height: 1.5; }
  .entry.step { background: #111118; border-left: 3px solid #3b82f6; font-family: monospace; font-size: 13px; }
  .entry.error { background: #1a0a0a; border-left: 3px solid #ef4444; color: #fca5a5; }
  .entry.done { background: #0a1a0a; border-left: 3px solid #22c55e; color: #86efac; }
  .entry.wait { background: #1a1408; border-left: 3px solid #f59e0b; color: #fcd34d; }
  #gate { display: none; gap: 8px; }
  #gate.open { display: flex; }
  button {
    color: #fff;
    border: none;
    border-radius: 8px;
    padding: 12px 24px;
    font-size: 15px;
    font-weight: 600;
    cursor: pointer;
  }
  #continue { background: #6366f1; }
  #cancel { background: #333; }
</style>
</head>
<body>
  <header>
    <div class="dot" id="status-dot"></div>
    <h1>Cart Agent</h1>
  </header>
  <div class="main">
    <div id="log"></div>
    <div id="gate">
      <button id="continue" onclick="decide('continue')">I signed in, continue</button>
      <button id="cancel" onclick="decide('cancel')">Cancel task</button>
    </div>
  </div>
<script>
  const log = document.getElementById('log');
  const gate = document.getElementById('gate');
  const dot = document.getElementById('status-dot');
  const esc = s => String(s).replace(/</g, '&lt;');

  function addEntry(cls, html) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.innerHTML = html;
    log.appendChild(div);
    log.scrollTop = log.scrollHeight;
  }

  function waiting(on) {
    gate.className = on ? 'open' : '';
    dot.className = on ? 'dot waiting' : 'dot';
  }

  async function decide(decision) {
    waiting(false);
    await fetch('/decision', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({decision}),
    });
  }

  const es = new EventSource('/events');
  es.addEventListener('step', e => {
    const d = JSON.parse(e.data);
    addEntry('step', 'Step ' + d.number + ': ' + esc(d.description));
  });
  es.addEventListener('step_error', e => addEntry('error', esc(JSON.parse(e.data).message)));
  es.addEventListener('thinking', () => addEntry('step', 'Thinking...'));
  es.addEventListener('sign_in', e => {
    addEntry('wait', 'Sign-in required at ' + esc(JSON.parse(e.data).url) + '. Sign in in the browser window, then continue.');
    waiting(true);
  });
  es.addEventListener('resumed', e => {
    addEntry('step', 'Operator chose ' + esc(JSON.parse(e.data).decision));
    waiting(false);
  });
  es.addEventListener('task_complete', e => addEntry('done', esc(JSON.parse(e.data).summary)));
  es.addEventListener('task_error', e => addEntry('error', 'Task failed: ' + esc(JSON.parse(e.data).message)));

  addEntry('done', 'Connected. Progress appears here.');
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_parse_case_insensitively() {
        assert_eq!(parse_decision("Continue"), Some(SignInDecision::Continue));
        assert_eq!(parse_decision(" cancel "), Some(SignInDecision::Cancel));
        assert_eq!(parse_decision("maybe"), None);
    }

    #[test]
    fn events_serialize_as_json() {
        let event = AgentEvent::SignInRequired {
            url: "https://www.amazon.com/ap/signin".into(),
        };
        assert_eq!(event.name(), "sign_in");
        assert_eq!(event.payload()["url"], "https://www.amazon.com/ap/signin");
    }

    #[test]
    fn gate_returns_operator_answer() {
        let (tx, rx) = mpsc::channel(4);
        let (events, mut seen) = broadcast::channel(8);
        let gate = PanelGate {
            decisions: Mutex::new(rx),
            events,
        };

        let answer = std::thread::spawn(move || gate.await_sign_in("https://www.amazon.com/ap/signin"));
        // Wait until the gate has announced itself before answering.
        let announced = seen.blocking_recv().unwrap();
        assert!(matches!(announced, AgentEvent::SignInRequired { .. }));
        tx.blocking_send(SignInDecision::Continue).unwrap();

        assert_eq!(answer.join().unwrap(), SignInDecision::Continue);
    }

    #[test]
    fn closed_channel_cancels() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let (events, _) = broadcast::channel(8);
        let gate = PanelGate {
            decisions: Mutex::new(rx),
            events,
        };
        assert_eq!(gate.await_sign_in("https://example.com/login"), SignInDecision::Cancel);
    }
}
