//! 工具箱：Tool trait、工具池、带超时与审计的执行器、内置工具（echo / get_time）

pub mod echo;
pub mod executor;
pub mod function;
pub mod registry;
pub mod schema;
pub mod time;

pub use echo::EchoTool;
pub use executor::{ToolExecutor, ToolOutcome, ToolOutcomeKind};
pub use function::FnTool;
pub use registry::{Tool, ToolRegistry, ToolSchema};
pub use schema::{parse_args, schema_of};
pub use time::TimeTool;
