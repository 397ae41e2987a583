pub mod feature;
pub mod filter;
pub mod request;
pub mod response;
