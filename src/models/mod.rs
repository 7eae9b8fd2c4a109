pub mod scroll_response;
pub mod server_info;

pub use scroll_response::{decode_scroll_response, Document, ScrollResponse};
pub use server_info::ServerInfo;
