//! 能力层：注册表、分发器与四个旅行能力

pub mod accommodations;
pub mod destination_report;
pub mod executor;
pub mod points_of_interest;
pub mod registry;
pub mod result;
pub mod schema;
pub mod weather;

pub use accommodations::AccommodationSearchTool;
pub use destination_report::DestinationReportTool;
pub use executor::CapabilityDispatcher;
pub use points_of_interest::PointsOfInterestTool;
pub use registry::{Capability, CapabilityDescriptor, CapabilityRegistry, ParameterDoc};
pub use result::{Parameters, ToolFailure, ToolResult};
pub use schema::tool_call_schema_json;
pub use weather::WeatherTool;
