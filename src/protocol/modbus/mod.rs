mod frame;
mod header;
mod pull_get_coils;
mod pull_get_holdings;
mod pull_set_coil;
mod pull_set_coils;
mod pull_set_holdings;

pub use frame::{read_modbus_frame, transact};
pub use header::{parse_modbus_header, RESPONSE_HEADER_LEN};
pub use pull_get_coils::{generate_pull_get_coils_request, parse_pull_get_coils};
pub use pull_get_holdings::{generate_pull_get_holdings_request, parse_pull_get_holdings};
pub use pull_set_coil::generate_pull_set_coil_request;
pub use pull_set_coils::{generate_pull_set_coils_request, parse_pull_set_ack};
pub use pull_set_holdings::generate_pull_set_holdings_request;
