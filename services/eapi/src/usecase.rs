pub mod authenticate;
pub mod credential;
pub mod rotation;
