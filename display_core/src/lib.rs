pub mod config;
pub mod display;
pub mod error;
pub mod event;
pub mod geometry;
pub mod headless;
pub mod keys;
pub mod logging;
pub mod native;
pub mod registry;
pub mod render;
pub mod sched;
pub mod signals;
pub mod telemetry;
pub mod timer;
pub mod window;

pub use crate::config::{DisplayConfig, WindowConfig};
pub use crate::display::{default_connection, reset_default_connection, set_default_factory, DisplayConnection};
pub use crate::error::{DisplayError, DisplayResult};
pub use crate::event::{Event, RawEvent, WindowId};
pub use crate::geometry::{Geometry, Point, Rect, Size};
pub use crate::headless::HeadlessDisplay;
pub use crate::keys::Key;
pub use crate::render::{Renderable, RenderableWindow, RenderEngine, Renderer};
pub use crate::sched::{Scheduler, TimerService};
pub use crate::window::{CursorHideTimeout, Window, WindowOptions};
