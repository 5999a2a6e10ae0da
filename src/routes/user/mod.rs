mod handler;
mod model;

pub use handler::{check_token, create_temporary, logout, refresh_token};
pub use model::{CheckTokenResponse, CreateUserResponse, LogoutResponse, RefreshTokenResponse};
