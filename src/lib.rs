pub mod config;
pub mod sim;
pub mod stream;
pub mod telnet;

pub use config::StreamConfig;
pub use stream::{run_transfer, stream_lines, stream_session, StreamError};
pub use telnet::{TelnetError, TelnetStream};
