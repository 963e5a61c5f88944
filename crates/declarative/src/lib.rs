//! # Declarative
//!
//! Plan execution for declarative Konnect configuration.
//!
//! An upstream planner diffs desired configuration against Konnect and
//! emits a [`Plan`]: an ordered list of create/update/delete changes. This
//! crate applies that plan, one change at a time, against whatever remote
//! API the registered handlers talk to.
//!
//! ## Core Concepts
//!
//! - **Change**: one planned operation on a single resource
//! - **ResourceOperations**: per resource type field mapping and CRUD calls
//! - **BaseExecutor**: the shared create/update/delete lifecycle around an adapter
//! - **ReferenceResolver**: turns references into IDs at execution time
//! - **Executor**: walks the execution order and aggregates an [`ExecutionResult`]
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{BaseExecutor, Executor, HandlerRegistry, Plan};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(BaseExecutor::boxed(PortalAdapter::new(api)));
//!
//! let mut plan = Plan::from_path(Path::new("plan.json"))?;
//! let result = Executor::new(false)
//!     .with_registry(registry)
//!     .execute(&mut plan)?;
//!
//! println!("{}", result.message());
//! ```
//!
//! ## Provider Traits
//!
//! The engine has no hard dependency on an HTTP client, a terminal or the
//! decK binary:
//!
//! - [`ResourceOperations`]: talks to the remote API for one resource type
//! - [`ProgressReporter`]: receives progress updates
//! - [`DeckRunner`]: runs the decK subprocess
//! - [`GatewayServiceLookup`]: finds gateway services decK created

pub mod base;
pub mod context;
pub mod deck;
pub mod error;
pub mod executor;
pub mod external;
pub mod fields;
pub mod labels;
pub mod plan;
pub mod protection;
pub mod resolver;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use base::BaseExecutor;
pub use context::{CancelToken, ExecutionContext, ProgressReporter};
pub use deck::{DeckError, DeckRunner, ExecRunner, RunOptions, RunOutput};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{Executor, validate_change_pre_execution};
pub use external::{DECK_RESOURCE_TYPE, ExternalToolConfig, GatewayServiceLookup};
pub use labels::Labels;
pub use plan::{
    ActionType, Change, Fields, ParentInfo, Plan, PlanMetadata, PlanMode, PlanSummary,
    Protection, ReferenceInfo,
};
pub use resolver::{RefTable, ReferenceResolver};
pub use resource::{BoxedHandler, ChangeHandler, HandlerRegistry, ResourceOperations};
pub use types::{
    AppliedChange, ExecutionError, ExecutionResult, ResourceInfo, ValidationResult,
    ValidationStatus,
};
