pub mod caption_types;
pub mod image_types;
pub mod naming_types;
pub mod summary_types;
