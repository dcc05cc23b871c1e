use serde::{Deserialize, Serialize};

use crate::telnet;

/// Wire-level knobs for a controller conversation. The defaults reproduce
/// the stock firmware console; a config file only needs the fields it
/// wants to override.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// TCP port the controller's console listens on.
    pub port: u16,
    /// Prompt the console prints when it is ready for input.
    pub prompt: String,
    /// Token the console emits once a line has been processed.
    pub ack: String,
    /// Telnet option byte that toggles the console prompt.
    pub prompt_option: u8,
    /// Console command that ends the session.
    pub exit_command: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            port: 23,
            prompt: "> ".to_string(),
            ack: "ok".to_string(),
            prompt_option: telnet::OPT_PROMPT,
            exit_command: "exit".to_string(),
        }
    }
}
