//! Infrastructure layer: owns scarce browser resources, exposes capabilities.

pub mod page_driver;

pub use page_driver::PageDriver;
