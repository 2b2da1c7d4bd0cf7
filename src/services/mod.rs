pub mod checkout;
pub mod distributor_events;
pub mod orders;
