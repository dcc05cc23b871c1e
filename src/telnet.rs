use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const IAC: u8 = 255;
pub const WILL: u8 = 251;
pub const WONT: u8 = 252;
pub const DO: u8 = 253;
pub const DONT: u8 = 254;

/// Firmware-private option byte that toggles the console prompt on the
/// controller: `DONT` turns the prompt off, `DO` turns it back on.
pub const OPT_PROMPT: u8 = 0x55;

#[derive(Debug, Error)]
pub enum TelnetError {
    #[error("connection closed while waiting for `{expected}`")]
    UnexpectedEof { expected: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One decoded step of the inbound stream.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// A payload byte with telnet commands stripped out.
    Data(u8),
    /// An `IAC <verb> <option>` sequence; verb is WILL, WONT, DO or DONT.
    Negotiation { verb: u8, option: u8 },
}

enum State {
    Normal,
    Iac,
    Verb(u8),
}

/// Inbound telnet state machine. Feed it raw bytes one at a time; payload
/// comes back as `Data`, negotiation sequences as `Negotiation`, and
/// `IAC IAC` unescapes to a literal 0xff. Other IAC commands are dropped,
/// which is also what the controller firmware does with them.
pub struct Parser {
    state: State,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Normal,
        }
    }

    pub fn push(&mut self, byte: u8) -> Option<Event> {
        match self.state {
            State::Normal => {
                if byte == IAC {
                    self.state = State::Iac;
                    None
                } else {
                    Some(Event::Data(byte))
                }
            }
            State::Iac => match byte {
                IAC => {
                    self.state = State::Normal;
                    Some(Event::Data(IAC))
                }
                WILL | WONT | DO | DONT => {
                    self.state = State::Verb(byte);
                    None
                }
                _ => {
                    self.state = State::Normal;
                    None
                }
            },
            State::Verb(verb) => {
                self.state = State::Normal;
                Some(Event::Negotiation { verb, option: byte })
            }
        }
    }
}

/// Client end of a telnet connection. Separates inbound commands from
/// payload, refuses whatever the peer tries to negotiate, and exposes the
/// read-until-token primitive the transfer is built on.
pub struct TelnetStream<S> {
    stream: S,
    parser: Parser,
    cooked: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TelnetStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            parser: Parser::new(),
            cooked: Vec::new(),
        }
    }

    /// Block until `token` has appeared in the payload stream, however many
    /// reads that takes. Everything up to and including the match is
    /// consumed and returned. There is no timeout; a silent peer blocks
    /// forever.
    pub async fn read_until(&mut self, token: &str) -> Result<Vec<u8>, TelnetError> {
        let needle = token.as_bytes();
        loop {
            if let Some(pos) = find_subslice(&self.cooked, needle) {
                let end = pos + needle.len();
                return Ok(self.cooked.drain(..end).collect());
            }
            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(TelnetError::UnexpectedEof {
                    expected: token.to_string(),
                });
            }
            let mut refusals: Vec<u8> = Vec::new();
            for &byte in &buf[..n] {
                match self.parser.push(byte) {
                    Some(Event::Data(b)) => self.cooked.push(b),
                    Some(Event::Negotiation { verb, option }) => {
                        // Standard client refusal: WILL/WONT gets DONT,
                        // DO/DONT gets WONT.
                        if verb == WILL || verb == WONT {
                            refusals.extend_from_slice(&[IAC, DONT, option]);
                        } else {
                            refusals.extend_from_slice(&[IAC, WONT, option]);
                        }
                    }
                    None => {}
                }
            }
            if !refusals.is_empty() {
                self.stream.write_all(&refusals).await?;
                self.stream.flush().await?;
            }
        }
    }

    /// Write payload bytes, doubling any embedded IAC so the peer reads
    /// them as data.
    pub async fn write_escaped(&mut self, data: &[u8]) -> Result<(), TelnetError> {
        if data.contains(&IAC) {
            let mut escaped = Vec::with_capacity(data.len() + 4);
            for &byte in data {
                escaped.push(byte);
                if byte == IAC {
                    escaped.push(IAC);
                }
            }
            self.stream.write_all(&escaped).await?;
        } else {
            self.stream.write_all(data).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Emit a raw three-byte `IAC <verb> <option>` sequence verbatim.
    pub async fn send_negotiation(&mut self, verb: u8, option: u8) -> Result<(), TelnetError> {
        self.stream.write_all(&[IAC, verb, option]).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
