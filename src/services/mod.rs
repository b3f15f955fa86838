pub mod captioner;
pub mod fs_service;
pub mod naming_service;
pub mod pipeline;
pub mod writer_service;
