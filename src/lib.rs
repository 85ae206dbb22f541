pub mod config;
pub mod discovery;
pub mod host;
pub mod mount;
pub mod router;

pub use config::{EffectiveConfig, ModuleOptions};
pub use discovery::{DiscoveredModule, FsModuleSource, ModuleSource};
pub use host::{DevServer, HookRegistry, Registrar};
pub use mount::error::{DiscoveryError, HostError, MountError};
pub use mount::{build, BuildContext, MiddlewareHandler, MountOptions, ProjectRootResolver};
pub use router::{MiddlewareOptions, RouterFactory, StaticAppRouterFactory};
