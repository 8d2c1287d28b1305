use axum::response::{Html, IntoResponse};
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Browser client: picks a random client id, connects to `/ws/{id}`, lists
/// every frame received, and reconnects after the socket closes. While the
/// socket is down, Send goes to `POST /submit` instead.
const CLIENT_JS: &str = r#"
const input = document.getElementById('text-input');
const sendBtn = document.getElementById('send-btn');
const results = document.getElementById('results');
const clientId = Date.now().toString(36) + Math.floor(Math.random() * 10000).toString(36);
document.getElementById('ws-id').textContent = clientId;

function appendItem(text) {
  const li = document.createElement('li');
  li.className = 'list-group-item';
  li.textContent = text;
  results.appendChild(li);
  li.scrollIntoView({ behavior: 'smooth', block: 'end' });
}

const scheme = location.protocol === 'https:' ? 'wss' : 'ws';
const wsUrl = `${scheme}://${location.host}/ws/${encodeURIComponent(clientId)}`;
let ws;

function connect() {
  ws = new WebSocket(wsUrl);
  ws.addEventListener('open', () => {
    appendItem('WebSocket connected');
    sendBtn.disabled = false;
  });
  ws.addEventListener('message', (event) => appendItem(event.data));
  ws.addEventListener('close', () => {
    appendItem('WebSocket disconnected');
    setTimeout(() => {
      appendItem('Reconnecting WebSocket...');
      connect();
    }, RECONNECT_DELAY_MS);
  });
  ws.addEventListener('error', (e) => console.warn('WebSocket error', e));
}

async function send(value) {
  if (!value || !value.trim()) return;
  sendBtn.disabled = true;
  try {
    if (ws && ws.readyState === WebSocket.OPEN) {
      ws.send(value);
      appendItem(`You: ${value}`);
    } else {
      const resp = await fetch('/submit', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ text: value }),
      });
      if (!resp.ok) throw new Error('Network response was not ok');
      const data = await resp.json();
      appendItem(data.received ?? value);
    }
    input.value = '';
    input.focus();
  } catch (err) {
    appendItem('Error: ' + err.message);
  } finally {
    sendBtn.disabled = false;
  }
}

sendBtn.addEventListener('click', () => send(input.value));
input.addEventListener('keydown', (e) => {
  if (e.key === 'Enter') {
    e.preventDefault();
    send(input.value);
  }
});
document.getElementById('chat-form').addEventListener('submit', (e) => e.preventDefault());
connect();
"#;

const RECONNECT_DELAY_MS: u64 = 2000;

pub async fn index_page() -> impl IntoResponse {
    Html(render_index().into_string())
}

fn render_index() -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "chatcast" }
                link rel="stylesheet"
                    href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
                    crossorigin="anonymous";
            }
            body class="bg-light" {
                div class="container py-5" {
                    h1 class="mb-4" { "chatcast" }
                    h2 class="h4 mb-4" {
                        "Your client id: "
                        span id="ws-id" {}
                    }
                    div class="card" {
                        div class="card-body" {
                            form id="chat-form" class="row g-3 align-items-end" {
                                div class="col-md-8" {
                                    label for="text-input" class="form-label" { "Message" }
                                    input type="text" class="form-control" id="text-input"
                                        name="text" placeholder="Type and press Enter";
                                }
                                div class="col-md-4 d-grid" {
                                    button type="button" id="send-btn" class="btn btn-primary mt-4" disabled {
                                        "Send"
                                    }
                                }
                                div class="col-12" {
                                    div class="mb-2" { strong { "Messages" } }
                                    ul id="results" class="list-group" {}
                                }
                            }
                        }
                    }
                }
                script {
                    (PreEscaped(format!("const RECONNECT_DELAY_MS = {};", RECONNECT_DELAY_MS)))
                    (PreEscaped(CLIENT_JS))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_wires_websocket_and_submit_fallback() {
        let page = render_index().into_string();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("id=\"ws-id\""));
        assert!(page.contains("/ws/${encodeURIComponent(clientId)}"));
        assert!(page.contains("fetch('/submit'"));
        assert!(page.contains("const RECONNECT_DELAY_MS = 2000;"));
    }

    #[tokio::test]
    async fn index_page_is_html() {
        let resp = index_page().await.into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
    }
}
