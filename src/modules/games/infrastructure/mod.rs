pub mod chess_com;
pub mod http_client;

pub use chess_com::ChessComClient;
pub use http_client::{PacedHttpClient, RateLimitInfo};
