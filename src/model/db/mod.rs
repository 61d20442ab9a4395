pub mod admin;
pub mod election;
pub mod option;
pub mod question;
pub mod vote;
pub mod voter;
