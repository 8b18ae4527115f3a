pub mod app;
pub mod auth;
pub mod cli;
pub mod constants;
pub mod gateway;
pub mod models;
pub mod session;
pub mod upload;
pub mod utils;

pub use app::{load_config, AppState, Config};
pub use gateway::{ApiGateway, HttpGateway};
pub use session::{ConversationSessionManager, SessionSnapshot};
pub use upload::{HttpUploader, UploadService};
pub use utils::{TaxChatError, UserFacingError};
