//! Driver configuration.
//!
//! Defaults follow the usual Newton line-search and Newton minimizer
//! defaults. Every field can be overridden from the runtime options database
//! or loaded from JSON.

use crate::error::{Result, SolverError};
use crate::guard::{DEFAULT_SENTINEL, ObjectiveGuard};
use crate::runtime::RuntimeOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Line search used by the Newton formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSearchType {
    /// Backtracking with a sufficient-decrease test
    #[default]
    Bt,
    /// Full step, no line search
    Basic,
}

impl LineSearchType {
    /// Option-database identifier for this line search.
    pub fn option_name(&self) -> &'static str {
        match self {
            LineSearchType::Bt => "bt",
            LineSearchType::Basic => "basic",
        }
    }

    pub fn from_option_name(name: &str) -> Option<Self> {
        match name {
            "bt" => Some(LineSearchType::Bt),
            "basic" | "none" => Some(LineSearchType::Basic),
            _ => None,
        }
    }
}

/// Which formulation drives the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulationKind {
    #[default]
    Newton,
    Optimization,
}

impl FormulationKind {
    pub fn option_name(&self) -> &'static str {
        match self {
            FormulationKind::Newton => "newton",
            FormulationKind::Optimization => "optimization",
        }
    }

    pub fn from_option_name(name: &str) -> Option<Self> {
        match name {
            "newton" | "snes" => Some(FormulationKind::Newton),
            "optimization" | "tao" => Some(FormulationKind::Optimization),
            _ => None,
        }
    }
}

/// Newton line-search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Relative residual tolerance ‖R‖ ≤ rtol ‖R₀‖
    pub rtol: f64,
    /// Absolute residual tolerance
    pub atol: f64,
    /// Step tolerance ‖Δu‖ ≤ stol ‖u‖
    pub stol: f64,
    pub max_it: usize,
    pub line_search: LineSearchType,
    /// Maximum backtracking steps per iteration
    pub max_line_search: usize,
    /// Use the guarded energy as line-search merit function
    pub use_objective: bool,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-50,
            stol: 1e-8,
            max_it: 50,
            line_search: LineSearchType::Bt,
            max_line_search: 10,
            use_objective: false,
        }
    }
}

impl NewtonConfig {
    /// Defaults overridden by `-snes_*` options.
    pub fn from_options(options: &RuntimeOptions) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = options.get("-snes_rtol")? {
            config.rtol = v;
        }
        if let Some(v) = options.get("-snes_atol")? {
            config.atol = v;
        }
        if let Some(v) = options.get("-snes_stol")? {
            config.stol = v;
        }
        if let Some(v) = options.get("-snes_max_it")? {
            config.max_it = v;
        }
        if let Some(v) = options.get("-snes_linesearch_max_it")? {
            config.max_line_search = v;
        }
        if let Some(name) = options.get::<String>("-snes_linesearch_type")? {
            config.line_search =
                LineSearchType::from_option_name(&name).ok_or_else(|| SolverError::Options {
                    key: "-snes_linesearch_type".into(),
                    message: format!("unknown line search {name:?}"),
                })?;
        }
        if let Some(v) = options.get_bool("-snes_use_objective")? {
            config.use_objective = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_tolerance("rtol", self.rtol)?;
        check_tolerance("atol", self.atol)?;
        check_tolerance("stol", self.stol)?;
        if self.max_it == 0 {
            return Err(SolverError::Config("max_it must be at least 1".into()));
        }
        Ok(())
    }
}

/// Newton minimizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Absolute gradient tolerance ‖g‖ ≤ gatol
    pub gatol: f64,
    /// Relative gradient tolerance ‖g‖ ≤ grtol |f|
    pub grtol: f64,
    /// Gradient reduction tolerance ‖g‖ ≤ gttol ‖g₀‖
    pub gttol: f64,
    pub max_it: usize,
    /// Maximum objective evaluations per line search
    pub ls_max_funcs: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            gatol: 1e-8,
            grtol: 1e-8,
            gttol: 0.0,
            max_it: 50,
            ls_max_funcs: 30,
        }
    }
}

impl OptimizationConfig {
    /// Defaults overridden by `-tao_*` options.
    pub fn from_options(options: &RuntimeOptions) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = options.get("-tao_gatol")? {
            config.gatol = v;
        }
        if let Some(v) = options.get("-tao_grtol")? {
            config.grtol = v;
        }
        if let Some(v) = options.get("-tao_gttol")? {
            config.gttol = v;
        }
        if let Some(v) = options.get("-tao_max_it")? {
            config.max_it = v;
        }
        if let Some(v) = options.get("-tao_ls_max_funcs")? {
            config.ls_max_funcs = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_tolerance("gatol", self.gatol)?;
        check_tolerance("grtol", self.grtol)?;
        check_tolerance("gttol", self.gttol)?;
        if self.max_it == 0 {
            return Err(SolverError::Config("max_it must be at least 1".into()));
        }
        if self.ls_max_funcs == 0 {
            return Err(SolverError::Config("ls_max_funcs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Complete solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub formulation: FormulationKind,
    pub newton: NewtonConfig,
    pub optimization: OptimizationConfig,
    /// Value substituted for non-finite or inverted objectives
    pub sentinel: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            formulation: FormulationKind::Newton,
            newton: NewtonConfig::default(),
            optimization: OptimizationConfig::default(),
            sentinel: DEFAULT_SENTINEL,
        }
    }
}

impl SolverConfig {
    pub fn from_options(options: &RuntimeOptions) -> Result<Self> {
        let mut config = Self {
            newton: NewtonConfig::from_options(options)?,
            optimization: OptimizationConfig::from_options(options)?,
            ..Self::default()
        };
        if let Some(name) = options.get::<String>("-formulation")? {
            config.formulation =
                FormulationKind::from_option_name(&name).ok_or_else(|| SolverError::Options {
                    key: "-formulation".into(),
                    message: format!("unknown formulation {name:?}"),
                })?;
        }
        if let Some(v) = options.get("-objective_sentinel")? {
            config.sentinel = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn guard(&self) -> ObjectiveGuard {
        ObjectiveGuard::new(self.sentinel)
    }

    pub fn validate(&self) -> Result<()> {
        self.newton.validate()?;
        self.optimization.validate()?;
        if !self.sentinel.is_finite() {
            return Err(SolverError::Config("objective sentinel must be finite".into()));
        }
        Ok(())
    }
}

fn check_tolerance(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SolverError::Config(format!(
            "{name} must be a non-negative finite number, got {value}"
        )))
    }
}
