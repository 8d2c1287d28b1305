use anyhow::Result;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use super::submit::{display_received, submit_text};
use super::{ClientError, ServerEndpoint};

/// How a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stdin reached EOF; the client is done.
    InputClosed,
    /// The server closed the socket or the transport failed.
    ServerClosed,
}

/// `chatcast connect`: interactive terminal client.
///
/// `reconnect` is the delay before redialing after the socket drops; `None`
/// exits instead. Lines typed while disconnected go to `/submit`.
pub async fn connect_command(
    endpoint: &ServerEndpoint,
    client_id: Option<String>,
    reconnect: Option<Duration>,
) -> Result<()> {
    let client_id = client_id.unwrap_or_else(generate_client_id);
    let ws_url = endpoint.ws_url(&client_id)?;
    let http = reqwest::Client::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut print = |line: String| println!("{}", line);

    print(format!("Your client id: {}", client_id));

    loop {
        match tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .map_err(ClientError::from_tungstenite)
        {
            Ok((ws_stream, _)) => {
                print("WebSocket connected".to_string());
                match run_session(ws_stream, &mut lines, &mut print).await? {
                    SessionOutcome::InputClosed => return Ok(()),
                    SessionOutcome::ServerClosed => print("WebSocket disconnected".to_string()),
                }
            }
            Err(ClientError::Unavailable) => {
                eprintln!("[chatcast: server unavailable]");
            }
            Err(e) => return Err(e.into()),
        }

        let Some(delay) = reconnect else {
            return Ok(());
        };
        let input_open = wait_with_fallback(&http, endpoint, &mut lines, delay, &mut print).await?;
        if !input_open {
            return Ok(());
        }
        print("Reconnecting WebSocket...".to_string());
    }
}

/// Pump stdin lines to the socket and socket frames to `out` until one side
/// finishes.
pub async fn run_session<S, R>(
    ws_stream: S,
    lines: &mut Lines<R>,
    out: &mut impl FnMut(String),
) -> Result<SessionOutcome>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
    R: AsyncBufRead + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if is_blank(&line) {
                            continue;
                        }
                        if let Err(e) = ws_write.send(Message::Text(line.clone().into())).await {
                            debug!("WebSocket write failed: {}", e);
                            return Ok(SessionOutcome::ServerClosed);
                        }
                        out(format!("You: {}", line));
                    }
                    None => {
                        let _ = ws_write.send(Message::Close(None)).await;
                        return Ok(SessionOutcome::InputClosed);
                    }
                }
            }
            frame = ws_read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => out(text.as_str().to_string()),
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionOutcome::ServerClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket read failed: {}", e);
                        return Ok(SessionOutcome::ServerClosed);
                    }
                }
            }
        }
    }
}

/// Sit out the reconnect delay, sending any typed lines through `/submit`.
/// Returns false if stdin closed in the meantime.
async fn wait_with_fallback<R>(
    http: &reqwest::Client,
    endpoint: &ServerEndpoint,
    lines: &mut Lines<R>,
    delay: Duration,
    out: &mut impl FnMut(String),
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(true),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(false);
                };
                if is_blank(&line) {
                    continue;
                }
                match submit_text(http, endpoint, &line).await {
                    Ok(received) => out(display_received(received.as_ref(), &line)),
                    Err(e) => out(format!("Error: {}", e)),
                }
            }
        }
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Millisecond timestamp plus a small random suffix, both base 36.
pub fn generate_client_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let suffix: u64 = rand::random_range(0..10_000);
    format!("{}{}", to_base36(millis), to_base36(suffix))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_000_000), "lfls");
    }

    #[test]
    fn generated_ids_are_base36() {
        let id = generate_client_id();
        assert!(id.len() >= 9);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn blank_lines() {
        assert!(is_blank(""));
        assert!(is_blank("  \t"));
        assert!(!is_blank(" x "));
    }

    #[tokio::test]
    async fn session_round_trip_against_live_server() {
        let (addr, state) = crate::test_helpers::spawn_test_server().await;
        let endpoint = ServerEndpoint::parse(&format!("http://{}", addr)).unwrap();
        let ws_url = endpoint.ws_url("cli").unwrap();
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .unwrap();
        crate::test_helpers::wait_for_sessions(&state, 1).await;

        let (mut stdin_w, stdin_r) = tokio::io::duplex(1024);
        let mut lines = BufReader::new(stdin_r).lines();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        let session = tokio::spawn(async move {
            let mut out = |line: String| {
                let _ = out_tx.send(line);
            };
            run_session(ws_stream, &mut lines, &mut out).await.unwrap()
        });

        stdin_w.write_all(b"   \nhello\n").await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let line = timeout(TEST_TIMEOUT, out_rx.recv())
                .await
                .expect("timed out waiting for output")
                .expect("output closed");
            seen.push(line);
        }
        assert_eq!(
            seen,
            vec!["You: hello", "You wrote: hello", "Client #cli says: hello"]
        );

        // EOF on stdin ends the session and closes the socket
        drop(stdin_w);
        let outcome = timeout(TEST_TIMEOUT, session).await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::InputClosed);
        crate::test_helpers::wait_for_sessions(&state, 0).await;
    }

    #[tokio::test]
    async fn fallback_submits_while_disconnected() {
        let (addr, _state) = crate::test_helpers::spawn_test_server().await;
        let endpoint = ServerEndpoint::parse(&format!("http://{}", addr)).unwrap();

        let input: &[u8] = b"offline\n";
        let mut lines = BufReader::new(input).lines();
        let mut seen = Vec::new();
        let mut out = |line: String| seen.push(line);

        let open = wait_with_fallback(
            &reqwest::Client::new(),
            &endpoint,
            &mut lines,
            Duration::from_secs(5),
            &mut out,
        )
        .await
        .unwrap();

        // Input hit EOF right after the one line
        assert!(!open);
        assert_eq!(seen, vec!["offline"]);
    }
}
