//! Planner context and session variables
//!
//! Every rewrite that creates plan nodes or columns allocates ids from
//! here, and every session-dependent decision reads its flag from here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::planner::error::{PlannerError, PlannerResult};

/// Fix-control key gating elimination of left-outer Apply whose inner side is unused
pub const FIX_45822: u64 = 45822;

/// Session variables read by the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionVars {
    /// Last allocated plan column unique id
    pub plan_column_id: i64,

    /// MPP execution is allowed for this session
    pub allow_mpp: bool,

    /// MPP execution is requested for every compatible query
    pub enforce_mpp: bool,

    /// Optimizer fix-control switches, keyed by issue number
    pub optimizer_fix_control: HashMap<u64, String>,
}

impl Default for SessionVars {
    fn default() -> Self {
        Self {
            plan_column_id: 0,
            allow_mpp: true,
            enforce_mpp: false,
            optimizer_fix_control: HashMap::new(),
        }
    }
}

impl SessionVars {
    /// Create session variables with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load session variables from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> PlannerResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlannerError::Context(format!("invalid session variables: {}", e)))
    }

    /// Allow MPP execution
    #[must_use]
    pub fn with_allow_mpp(mut self, allow: bool) -> Self {
        self.allow_mpp = allow;
        self
    }

    /// Enforce MPP execution
    #[must_use]
    pub fn with_enforce_mpp(mut self, enforce: bool) -> Self {
        self.enforce_mpp = enforce;
        self
    }

    /// Set a single fix-control switch
    #[must_use]
    pub fn with_fix_control(mut self, key: u64, value: impl Into<String>) -> Self {
        self.optimizer_fix_control.insert(key, value.into());
        self
    }

    /// Parse a fix-control assignment such as `"45822:OFF, 44262:ON"`
    ///
    /// Replaces the whole map. Entries must be `key:value` with a numeric key.
    pub fn set_optimizer_fix_control(&mut self, value: &str) -> PlannerResult<()> {
        let mut map = HashMap::new();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, val) = entry.split_once(':').ok_or_else(|| {
                PlannerError::Context(format!("invalid fix control entry '{}'", entry))
            })?;
            let key: u64 = key.trim().parse().map_err(|_| {
                PlannerError::Context(format!("invalid fix control key '{}'", key.trim()))
            })?;
            map.insert(key, val.trim().to_string());
        }
        self.optimizer_fix_control = map;
        Ok(())
    }

    /// Read a boolean fix-control switch
    pub fn fix_control_bool(&self, key: u64, default: bool) -> bool {
        match self.optimizer_fix_control.get(&key) {
            Some(v) => match v.to_ascii_uppercase().as_str() {
                "ON" | "TRUE" | "1" => true,
                "OFF" | "FALSE" | "0" => false,
                _ => default,
            },
            None => default,
        }
    }

    /// Check if MPP execution is enforced
    pub fn is_mpp_enforced(&self) -> bool {
        self.allow_mpp && self.enforce_mpp
    }

    /// Allocate a new plan column unique id
    pub fn alloc_plan_column_id(&mut self) -> i64 {
        self.plan_column_id += 1;
        self.plan_column_id
    }
}

/// Planner context shared by all nodes of one plan
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    session_vars: SessionVars,
    plan_id: usize,
}

impl PlanContext {
    /// Create a context over the given session
    pub fn new(session_vars: SessionVars) -> Self {
        Self {
            session_vars,
            plan_id: 0,
        }
    }

    /// Session variables
    pub fn session_vars(&self) -> &SessionVars {
        &self.session_vars
    }

    /// Mutable session variables
    pub fn session_vars_mut(&mut self) -> &mut SessionVars {
        &mut self.session_vars
    }

    /// Allocate a new plan column unique id
    pub fn alloc_plan_column_id(&mut self) -> i64 {
        self.session_vars.alloc_plan_column_id()
    }

    /// Allocate a new plan node id
    pub fn alloc_plan_id(&mut self) -> usize {
        self.plan_id += 1;
        self.plan_id
    }
}
