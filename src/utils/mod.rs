pub mod http;
pub mod logging;
pub mod text;
pub mod timing;
pub mod unicode;
