pub mod supply;
pub mod transfers;
