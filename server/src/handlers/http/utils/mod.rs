pub mod deliver_page;
pub mod headers;
pub mod json_response;

// Re-export commonly used utilities
#[allow(unused_imports)]
pub use deliver_page::*;
#[allow(unused_imports)]
pub use headers::*;
#[allow(unused_imports)]
pub use json_response::*;
