mod tool;

pub use tool::{parameters_schema, FunctionDescriptor, ToolChoice, ToolDescriptor};
