mod content_client;
mod models;
mod token;

pub use content_client::ContentClient;
pub use content_client::ContentClientError;
pub use content_client::ContentKind;
pub use models::*;
pub use token::AdminApiKey;
