pub mod address;
pub mod customer;
pub mod user;
pub mod view;
