//! Session configuration: locating the broker.
//!
//! One environment variable communicates the broker's listener port to
//! every participant of an editor session. The editor learns the port
//! from the broker's startup announcement and exports it to the helper
//! processes it spawns; helpers read it back here. A missing or invalid
//! value is a fatal configuration error, since there is nothing sensible
//! a helper can do without its broker.

use std::env;

use crate::error::{RelayError, Result};

/// Environment variable holding the broker's TCP port.
pub const PORT_ENV: &str = "EDRELAY_PORT";

/// Read and validate the broker port from the environment.
pub fn port_from_env() -> Result<u16> {
    match env::var(PORT_ENV) {
        Ok(value) => value
            .parse()
            .map_err(|_| RelayError::PortInvalid(PORT_ENV, value)),
        Err(env::VarError::NotPresent) => Err(RelayError::PortUnset(PORT_ENV)),
        Err(env::VarError::NotUnicode(value)) => Err(RelayError::PortInvalid(
            PORT_ENV,
            value.to_string_lossy().into_owned(),
        )),
    }
}
