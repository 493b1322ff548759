mod keypair;
mod proof;

pub use keypair::{parse_public_key, verify_signature, AgentKeypair};
pub use proof::{proves_ownership, registration_message, REGISTRATION_DOMAIN};
