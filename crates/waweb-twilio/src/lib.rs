pub mod client;
pub mod error;
pub mod inbound;
pub mod signature;
pub mod split;
pub mod twiml;
pub mod types;

pub use client::{whatsapp_address, Messenger, TwilioClient};
pub use error::TwilioError;
pub use inbound::parse_inbound;
pub use signature::verify_signature;
pub use split::split_chunks;
pub use twiml::twiml_response;
pub use types::{DeliveryReceipt, InboundMessage};
