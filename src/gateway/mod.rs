pub mod acceptor;
pub mod server;

pub use acceptor::ConnectionAcceptor;
pub use server::{GatewayError, GatewayServer};
