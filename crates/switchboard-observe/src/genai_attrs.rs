//! OpenTelemetry GenAI Semantic Convention attribute names and values.
//!
//! `tracing` span field names must be literals, so spans spell these names
//! out (`gen_ai.operation.name = ...`). The constants here are the canonical
//! list, plus the operation values recorded in those fields.

// --- Required attributes ---

/// The name of the operation being performed (e.g., "invoke_agent").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider (e.g., "anthropic").
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";

// --- Recommended attributes ---

/// The model ID requested.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The sampling temperature for the request.
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";

/// The maximum number of output tokens requested.
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";

// --- Agent-specific attributes ---

/// The display name of the agent, team, or router issuing the call.
pub const GEN_AI_AGENT_NAME: &str = "gen_ai.agent.name";

// --- Operation name values ---

/// An agent answering (possibly with tool calls).
pub const OP_INVOKE_AGENT: &str = "invoke_agent";

/// A team supervisor choosing the next worker.
pub const OP_ROUTE_TEAM: &str = "route_team";

/// The flow supervisor choosing the next team or agent.
pub const OP_ROUTE_FLOW: &str = "route_flow";
