//! Agent types and their build profiles
//!
//! Every tile is baked for exactly one agent type. The profile carries the
//! capsule dimensions handed to the surface baker and the capability flags
//! used when probing stitch points.

use navtile_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Closed set of agent body types known to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Humanoid,
    Small,
    Large,
    Aquatic,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Humanoid,
        AgentType::Small,
        AgentType::Large,
        AgentType::Aquatic,
    ];

    /// Stable numeric id passed to the navigation backend
    pub fn id(self) -> u32 {
        match self {
            AgentType::Humanoid => 0,
            AgentType::Small => 1,
            AgentType::Large => 2,
            AgentType::Aquatic => 3,
        }
    }

    pub fn from_id(id: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|agent| agent.id() == id)
            .ok_or(Error::UnknownAgentType(id))
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentType::Humanoid => "humanoid",
            AgentType::Small => "small",
            AgentType::Large => "large",
            AgentType::Aquatic => "aquatic",
        };
        f.write_str(name)
    }
}

impl FromStr for AgentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|agent| agent.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown agent type '{s}'")))
    }
}

/// Bit set of navigation area types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaMask(pub u32);

impl AreaMask {
    pub const NONE: AreaMask = AreaMask(0);
    pub const WALKABLE: AreaMask = AreaMask(1 << 0);
    pub const WATER: AreaMask = AreaMask(1 << 1);
    pub const JUMP: AreaMask = AreaMask(1 << 2);
    pub const ALL: AreaMask = AreaMask(u32::MAX);

    #[inline]
    pub fn contains(self, other: AreaMask) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: AreaMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for AreaMask {
    type Output = AreaMask;

    fn bitor(self, rhs: AreaMask) -> AreaMask {
        AreaMask(self.0 | rhs.0)
    }
}

/// Build parameters and capabilities of one agent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Capsule height
    pub height: f32,
    /// Capsule radius
    pub radius: f32,
    /// Maximum step height the agent can climb
    pub max_climb: f32,
    /// Maximum walkable slope in degrees
    pub max_slope: f32,
    pub can_walk: bool,
    pub can_swim: bool,
    /// Walkers that avoid water drop ground contacts that sit below a water surface
    pub avoid_water: bool,
    /// How far below the water surface a swimmer travels
    pub swim_depth_offset: f32,
    /// Areas the agent is allowed to path through
    pub area_mask: AreaMask,
}

impl AgentProfile {
    pub fn validate(&self) -> Result<()> {
        if self.height <= 0.0 {
            return Err(Error::InvalidConfig(
                "Agent height must be positive".to_string(),
            ));
        }
        if self.radius <= 0.0 {
            return Err(Error::InvalidConfig(
                "Agent radius must be positive".to_string(),
            ));
        }
        if self.max_climb < 0.0 {
            return Err(Error::InvalidConfig(
                "Agent max climb cannot be negative".to_string(),
            ));
        }
        if !(0.0..90.0).contains(&self.max_slope) {
            return Err(Error::InvalidConfig(
                "Agent max slope must be in [0, 90) degrees".to_string(),
            ));
        }
        if !self.can_walk && !self.can_swim {
            return Err(Error::InvalidConfig(
                "Agent must be able to walk or swim".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read-only lookup of agent profiles, populated once at startup
#[derive(Debug, Clone, Default)]
pub struct AgentProfileRegistry {
    profiles: HashMap<AgentType, AgentProfile>,
}

impl AgentProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in body sizes
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            AgentType::Humanoid,
            AgentProfile {
                height: 2.0,
                radius: 0.5,
                max_climb: 0.75,
                max_slope: 45.0,
                can_walk: true,
                can_swim: true,
                avoid_water: true,
                swim_depth_offset: 1.2,
                area_mask: AreaMask::WALKABLE | AreaMask::WATER | AreaMask::JUMP,
            },
        );
        registry.register(
            AgentType::Small,
            AgentProfile {
                height: 0.8,
                radius: 0.3,
                max_climb: 0.4,
                max_slope: 50.0,
                can_walk: true,
                can_swim: false,
                avoid_water: true,
                swim_depth_offset: 0.0,
                area_mask: AreaMask::WALKABLE,
            },
        );
        registry.register(
            AgentType::Large,
            AgentProfile {
                height: 4.0,
                radius: 1.5,
                max_climb: 1.5,
                max_slope: 35.0,
                can_walk: true,
                can_swim: true,
                avoid_water: false,
                swim_depth_offset: 2.5,
                area_mask: AreaMask::WALKABLE | AreaMask::WATER,
            },
        );
        registry.register(
            AgentType::Aquatic,
            AgentProfile {
                height: 1.0,
                radius: 0.8,
                max_climb: 0.2,
                max_slope: 20.0,
                can_walk: false,
                can_swim: true,
                avoid_water: false,
                swim_depth_offset: 0.5,
                area_mask: AreaMask::WATER,
            },
        );
        registry
    }

    /// Load a profile table from JSON keyed by agent type name
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: HashMap<AgentType, AgentProfile> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("agent profile table: {e}")))?;

        for (agent, profile) in &profiles {
            profile
                .validate()
                .map_err(|e| Error::InvalidConfig(format!("profile '{agent}': {e}")))?;
        }

        Ok(Self { profiles })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.profiles)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Registers (or replaces) the profile for an agent type
    pub fn register(&mut self, agent: AgentType, profile: AgentProfile) {
        self.profiles.insert(agent, profile);
    }

    pub fn get(&self, agent: AgentType) -> Result<&AgentProfile> {
        self.profiles
            .get(&agent)
            .ok_or(Error::UnknownAgentType(agent.id()))
    }

    /// Looks up a profile by the backend's numeric agent id
    pub fn get_by_id(&self, id: u32) -> Result<&AgentProfile> {
        self.get(AgentType::from_id(id)?)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Registered agent types in id order
    pub fn agent_types(&self) -> Vec<AgentType> {
        let mut agents: Vec<AgentType> = self.profiles.keys().copied().collect();
        agents.sort();
        agents
    }
}
