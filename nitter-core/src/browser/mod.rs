mod automation;
mod error;
mod human;
mod session;

pub use automation::{BrowserLauncher, BrowserSession, LaunchOverrides};
pub use error::{BrowserError, BrowserResult};
pub use human::HumanPacer;
pub use session::MirrorSession;
