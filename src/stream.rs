use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::StreamConfig;
use crate::telnet::{TelnetError, TelnetStream, DO, DONT};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unable to read {}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to connect to {addr}")]
    Connect { addr: String, source: std::io::Error },
    #[error(transparent)]
    Telnet(#[from] TelnetError),
}

/// Send every line of `gcode` in file order. Each line goes out verbatim,
/// terminator included, and the next one is not written until the
/// controller's acknowledgement token has been observed. `on_sent` runs
/// once per line, after that line's acknowledgement. Returns the number of
/// lines sent.
///
/// A final line with no trailing newline is still sent as-is and still
/// waits for its acknowledgement.
pub async fn stream_lines<S, F>(
    conn: &mut TelnetStream<S>,
    gcode: &str,
    config: &StreamConfig,
    mut on_sent: F,
) -> Result<usize, TelnetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&str),
{
    let mut sent = 0;
    for line in gcode.split_inclusive('\n') {
        conn.write_escaped(line.as_bytes()).await?;
        conn.read_until(&config.ack).await?;
        on_sent(line);
        sent += 1;
    }
    Ok(sent)
}

/// One complete transfer over an established connection: consume the
/// startup prompt, turn the prompt off, stream the file, then turn the
/// prompt back on and leave the console with its exit command.
pub async fn stream_session<S, F>(
    conn: &mut TelnetStream<S>,
    gcode: &str,
    config: &StreamConfig,
    on_sent: F,
) -> Result<usize, TelnetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&str),
{
    conn.read_until(&config.prompt).await?;
    conn.send_negotiation(DONT, config.prompt_option).await?;

    let sent = stream_lines(conn, gcode, config, on_sent).await?;

    conn.send_negotiation(DO, config.prompt_option).await?;
    conn.write_escaped(format!("{}\n", config.exit_command).as_bytes())
        .await?;
    Ok(sent)
}

/// The whole program flow behind the CLI: read the file, announce the
/// transfer, connect, stream, sign off. The file is read in full before
/// the connection is attempted, so a bad path fails without touching the
/// network.
pub async fn run_transfer(
    gcode_file: &Path,
    ipaddr: &str,
    quiet: bool,
    config: &StreamConfig,
) -> Result<usize, StreamError> {
    let gcode = tokio::fs::read_to_string(gcode_file)
        .await
        .map_err(|source| StreamError::ReadFile {
            path: gcode_file.to_path_buf(),
            source,
        })?;

    println!("Streaming {} to {}", gcode_file.display(), ipaddr);

    let addr = format!("{}:{}", ipaddr, config.port);
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| StreamError::Connect {
            addr: addr.clone(),
            source,
        })?;
    let mut conn = TelnetStream::new(stream);

    let sent = stream_session(&mut conn, &gcode, config, |line| {
        if !quiet {
            print!("SND: {}", line);
        }
    })
    .await?;

    println!("Done");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::{IAC, OPT_PROMPT};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Script the controller side up front (prompt plus one ack per line),
    /// run the session, and return everything the streamer put on the
    /// wire together with the acknowledged lines.
    async fn scripted_session(gcode: &str, script: &[u8]) -> (usize, Vec<String>, Vec<u8>) {
        let (client, mut peer) = tokio::io::duplex(4096);
        let mut conn = TelnetStream::new(client);
        peer.write_all(script).await.unwrap();

        let config = StreamConfig::default();
        let mut acked = Vec::new();
        let sent = stream_session(&mut conn, gcode, &config, |line| {
            acked.push(line.to_string());
        })
        .await
        .unwrap();

        drop(conn);
        let mut wire = Vec::new();
        peer.read_to_end(&mut wire).await.unwrap();
        (sent, acked, wire)
    }

    #[tokio::test]
    async fn three_lines_mean_three_writes_in_file_order() {
        let (sent, acked, wire) =
            scripted_session("G28\nG1 X10\nM84\n", b"Smoothie command shell\r\n> ok\nok\nok\n")
                .await;

        assert_eq!(sent, 3);
        assert_eq!(acked, vec!["G28\n", "G1 X10\n", "M84\n"]);

        let mut expected = vec![IAC, DONT, OPT_PROMPT];
        expected.extend_from_slice(b"G28\nG1 X10\nM84\n");
        expected.extend_from_slice(&[IAC, DO, OPT_PROMPT]);
        expected.extend_from_slice(b"exit\n");
        assert_eq!(wire, expected);
    }

    /// Blank lines are lines too: they are written and acknowledged.
    #[tokio::test]
    async fn blank_lines_are_streamed() {
        let (sent, acked, _) = scripted_session("\n\n", b"> ok\nok\n").await;
        assert_eq!(sent, 2);
        assert_eq!(acked, vec!["\n", "\n"]);
    }

    /// A final line without a terminator goes out verbatim.
    #[tokio::test]
    async fn unterminated_final_line_is_sent_verbatim() {
        let (sent, acked, wire) = scripted_session("G28\nM114", b"> ok\nok\n").await;
        assert_eq!(sent, 2);
        assert_eq!(acked, vec!["G28\n", "M114"]);

        let mut expected = vec![IAC, DONT, OPT_PROMPT];
        expected.extend_from_slice(b"G28\nM114");
        expected.extend_from_slice(&[IAC, DO, OPT_PROMPT]);
        expected.extend_from_slice(b"exit\n");
        assert_eq!(wire, expected);
    }

    /// An empty file produces no line writes, only the handshake and the
    /// exit command.
    #[tokio::test]
    async fn empty_file_streams_nothing() {
        let (sent, acked, wire) = scripted_session("", b"> ").await;
        assert_eq!(sent, 0);
        assert!(acked.is_empty());

        let mut expected = vec![IAC, DONT, OPT_PROMPT];
        expected.extend_from_slice(&[IAC, DO, OPT_PROMPT]);
        expected.extend_from_slice(b"exit\n");
        assert_eq!(wire, expected);
    }

    /// The acknowledgement token is whatever the config says it is.
    #[tokio::test]
    async fn ack_token_comes_from_the_config() {
        let (client, mut peer) = tokio::io::duplex(4096);
        let mut conn = TelnetStream::new(client);
        peer.write_all(b"done\n").await.unwrap();

        let config = StreamConfig {
            ack: "done".to_string(),
            ..StreamConfig::default()
        };
        let sent = stream_lines(&mut conn, "G28\n", &config, |_| {})
            .await
            .unwrap();
        assert_eq!(sent, 1);
    }

    /// A peer that hangs up mid-transfer surfaces as an error, not a hang.
    #[tokio::test]
    async fn peer_eof_during_ack_wait_is_an_error() {
        let (client, mut peer) = tokio::io::duplex(4096);
        let mut conn = TelnetStream::new(client);
        peer.write_all(b"> ok\n").await.unwrap();
        // Close the controller's write half; its read half stays open so
        // the streamer's own writes still succeed.
        peer.shutdown().await.unwrap();

        let config = StreamConfig::default();
        let err = stream_session(&mut conn, "G28\nG1 X10\n", &config, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TelnetError::UnexpectedEof { .. }));
        drop(peer);
    }
}
