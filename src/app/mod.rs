// Application layer: ports implemented by infrastructure adapters

pub mod ports;
