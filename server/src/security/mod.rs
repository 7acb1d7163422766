pub mod clock;
pub mod rate_limiter;
pub mod session_gate;

#[allow(unused_imports)]
pub use clock::*;
#[allow(unused_imports)]
pub use rate_limiter::*;
#[allow(unused_imports)]
pub use session_gate::*;
