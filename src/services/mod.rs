pub mod course_discovery;
pub mod file_fetcher;
pub mod section_expander;

pub use course_discovery::CourseDiscovery;
pub use file_fetcher::FileFetcher;
pub use section_expander::SectionExpander;
