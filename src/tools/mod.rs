//! External collaborators: the bundle generator and the tag injector.
//!
//! | Piece | Role |
//! |---|---|
//! | **Template** | `{name}` placeholder expansion for argument lists (pure, unit testable) |
//! | **Parameters** | What one generator or injector call is about |
//! | **Backend** | [`BundleGenerator`] / [`TagInjector`] traits + [`ToolError`] |
//! | **Command** | [`CommandTool`], the process-spawning implementation of both traits |

pub mod backend;
pub mod command;
pub mod params;
pub mod template;

pub use backend::{BundleGenerator, TagInjector, ToolError};
pub use command::CommandTool;
pub use params::{GenerateParams, InjectParams};
