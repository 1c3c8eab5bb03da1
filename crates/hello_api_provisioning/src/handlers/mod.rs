pub mod consistency;
pub mod decommission;
pub mod package;
pub mod provision;
