pub mod distributor_event;
pub mod order;
