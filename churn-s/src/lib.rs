pub mod api_server;
pub mod handler;
pub mod model;
pub mod util;
