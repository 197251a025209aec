//! Info command implementation.

use crate::report::info_message;

/// Prints the system information message.
pub fn command_info() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", info_message());
    Ok(())
}
