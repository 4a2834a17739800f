pub mod component;
pub mod material;
pub mod quotation;
pub mod settings;
pub mod user;
