pub mod audit;
pub mod create;
pub mod sessions;
pub mod users;
pub mod utils;

#[allow(unused_imports)]
pub use audit::*;
#[allow(unused_imports)]
pub use create::*;
#[allow(unused_imports)]
pub use sessions::*;
#[allow(unused_imports)]
pub use users::*;
#[allow(unused_imports)]
pub use utils::*;
