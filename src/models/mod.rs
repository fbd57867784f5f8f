pub mod contract;
pub mod driver;
pub mod event;
pub mod gps;
pub mod hub;
pub mod incident;
pub mod job;
pub mod linehaul;
pub mod parcel;
pub mod request;
