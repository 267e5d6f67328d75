mod http_server;

pub use http_server::{app, AppState, ErrorResponse, HttpServer, REPLAY_HEADER};
