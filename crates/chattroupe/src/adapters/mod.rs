//! Adapters for image questions and general chat

pub mod chat;
pub mod image;

pub use self::chat::{ChatReply, GeneralChat};
pub use self::image::{ImageQa, UploadedImage};
