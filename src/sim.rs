//! Stand-in for the controller's telnet console, used by the integration
//! tests and the companion sim binary. Behaves like the real console as
//! far as the streamer can tell: greeting and prompt on connect, one
//! acknowledgement per line, the prompt toggled by its telnet option, and
//! the exit command closing the session.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::StreamConfig;
use crate::telnet::{Event, Parser, DO, DONT, IAC, WILL, WONT};

pub const GREETING: &str = "Smoothie command shell";

/// Counters from one finished console session.
#[derive(Debug, Default, PartialEq)]
pub struct SessionStats {
    /// Lines that were acknowledged (the exit command not included).
    pub lines: usize,
    /// Whether the session ended via the exit command rather than EOF.
    pub clean_exit: bool,
    /// Prompt state when the session ended.
    pub prompt_on: bool,
}

pub struct Console {
    config: StreamConfig,
}

impl Console {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Run the console over one connection until the exit command or EOF.
    ///
    /// Carriage returns are stripped and lines complete at newline, the
    /// way the firmware console assembles them. `DO`/`DONT` on the prompt
    /// option toggle the prompt without a reply; every other negotiation
    /// attempt is refused.
    pub async fn session<S>(&self, mut stream: S) -> Result<SessionStats, std::io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut parser = Parser::new();
        let mut line: Vec<u8> = Vec::new();
        let mut stats = SessionStats {
            prompt_on: true,
            ..SessionStats::default()
        };

        stream
            .write_all(format!("{}\r\n{}", GREETING, self.config.prompt).as_bytes())
            .await?;
        stream.flush().await?;

        let mut buf = [0u8; 1024];
        'session: loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                match parser.push(byte) {
                    Some(Event::Negotiation { verb, option }) => {
                        if option == self.config.prompt_option && verb == DO {
                            stats.prompt_on = true;
                        } else if option == self.config.prompt_option && verb == DONT {
                            stats.prompt_on = false;
                        } else if verb == WILL || verb == WONT {
                            stream.write_all(&[IAC, DONT, option]).await?;
                        } else {
                            stream.write_all(&[IAC, WONT, option]).await?;
                        }
                    }
                    Some(Event::Data(b'\r')) => {}
                    Some(Event::Data(b'\n')) => {
                        if line == self.config.exit_command.as_bytes() {
                            stats.clean_exit = true;
                            break 'session;
                        }
                        stats.lines += 1;
                        stream
                            .write_all(format!("{}\n", self.config.ack).as_bytes())
                            .await?;
                        if stats.prompt_on {
                            stream.write_all(self.config.prompt.as_bytes()).await?;
                        }
                        line.clear();
                    }
                    Some(Event::Data(byte)) => line.push(byte),
                    None => {}
                }
            }
            stream.flush().await?;
        }
        Ok(stats)
    }

    /// Accept loop: one connection at a time, keep going when one drops.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), std::io::Error> {
        loop {
            let (stream, address) = listener.accept().await?;
            match self.session(stream).await {
                Ok(stats) => {
                    println!("Session from {} finished after {} lines.", address, stats.lines);
                }
                Err(_) => {
                    println!("Connection to {} lost.", address);
                }
            }
        }
    }
}
