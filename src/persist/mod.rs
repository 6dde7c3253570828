pub mod gateway;

pub use gateway::StateGateway;
