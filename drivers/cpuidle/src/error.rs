//! # Error Handling
//!
//! Error types for building idle-state tables and registering with the OS
//! idle framework.
//!
//! ## Error Categories
//!
//! | Category     | Raised by      | Severity  | Handling                         |
//! |--------------|----------------|-----------|----------------------------------|
//! | Config       | Table builder  | Fatal     | Boot aborts, nothing registered  |
//! | Driver       | Registration   | Non-fatal | Logged, device registration runs |
//! | Device       | Registration   | Fatal     | Remaining CPUs never attempted   |
//! | Lifecycle    | Registration   | Fatal     | init() before install / twice    |
//!
//! The idle entry path has no error type: backend and notifier failures are
//! opaque to the driver and only show up as a short (or zero) residency.

use core::fmt;

use crate::cpu::CpuId;
use crate::state::ModeId;

// =============================================================================
// ERROR KIND
// =============================================================================

/// Classification of driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// Malformed platform state table
    Configuration        = 600,

    /// Driver-level registration rejected by the framework
    DriverRegistration   = 205,

    /// Per-CPU device registration rejected by the framework
    DeviceRegistration   = 206,

    /// Operation issued in the wrong boot phase
    InvalidState         = 2,
}

impl ErrorKind {
    /// Get the error category name
    pub const fn category(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "Configuration",
            ErrorKind::DriverRegistration | ErrorKind::DeviceRegistration => "Registration",
            ErrorKind::InvalidState => "General",
        }
    }

    /// Whether boot must stop on this kind of error
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::DriverRegistration)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

/// Malformed entry in the platform state catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `slot` is not below `MAX_STATES`
    SlotOutOfRange {
        /// CPU named by the `IdleStateSpec`
        cpu: CpuId,
        /// Offending slot index
        slot: usize,
    },

    /// No power-mode parameters exist for `(cpu, mode)`
    UnresolvedMode {
        /// CPU named by the `IdleStateSpec`
        cpu: CpuId,
        /// Slot named by the `IdleStateSpec`
        slot: usize,
        /// Mode that failed to resolve
        mode: ModeId,
    },

    /// Platform reported a negative exit latency
    NegativeLatency {
        /// CPU named by the `IdleStateSpec`
        cpu: CpuId,
        /// Slot named by the `IdleStateSpec`
        slot: usize,
        /// Mode whose parameters are bad
        mode: ModeId,
        /// Raw value (microseconds)
        value: i64,
    },

    /// Platform reported a negative target residency
    NegativeResidency {
        /// CPU named by the `IdleStateSpec`
        cpu: CpuId,
        /// Slot named by the `IdleStateSpec`
        slot: usize,
        /// Mode whose parameters are bad
        mode: ModeId,
        /// Raw value (microseconds)
        value: i64,
    },
}

impl ConfigError {
    /// CPU the error refers to
    pub const fn cpu(&self) -> CpuId {
        match *self {
            ConfigError::SlotOutOfRange { cpu, .. }
            | ConfigError::UnresolvedMode { cpu, .. }
            | ConfigError::NegativeLatency { cpu, .. }
            | ConfigError::NegativeResidency { cpu, .. } => cpu,
        }
    }

    /// Slot the error refers to
    pub const fn slot(&self) -> usize {
        match *self {
            ConfigError::SlotOutOfRange { slot, .. }
            | ConfigError::UnresolvedMode { slot, .. }
            | ConfigError::NegativeLatency { slot, .. }
            | ConfigError::NegativeResidency { slot, .. } => slot,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SlotOutOfRange { cpu, slot } => {
                write!(f, "cpu {}: state slot {} out of range", cpu, slot)
            },
            ConfigError::UnresolvedMode { cpu, slot, mode } => {
                write!(f, "cpu {} slot {}: no parameters for mode {}", cpu, slot, mode)
            },
            ConfigError::NegativeLatency {
                cpu,
                slot,
                mode,
                value,
            } => write!(
                f,
                "cpu {} slot {}: mode {} has negative exit latency {}",
                cpu, slot, mode, value
            ),
            ConfigError::NegativeResidency {
                cpu,
                slot,
                mode,
                value,
            } => write!(
                f,
                "cpu {} slot {}: mode {} has negative target residency {}",
                cpu, slot, mode, value
            ),
        }
    }
}

// =============================================================================
// FRAMEWORK & REGISTRATION ERRORS
// =============================================================================

/// Error code returned by the OS idle framework (negative errno style)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkError(pub i32);

impl FrameworkError {
    /// Raw code
    pub const fn code(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// Driver descriptor rejected. Only ever logged by `init()`.
    Driver(FrameworkError),

    /// Device for `cpu` rejected; later CPUs were not attempted
    Device {
        /// CPU whose device failed
        cpu: CpuId,
        /// Framework error
        source: FrameworkError,
    },

    /// `init()` called before the device arena was installed
    NotBuilt,

    /// `init()` or `install()` called a second time
    AlreadyInitialized,
}

impl RegistrationError {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::Driver(_) => ErrorKind::DriverRegistration,
            RegistrationError::Device { .. } => ErrorKind::DeviceRegistration,
            RegistrationError::NotBuilt | RegistrationError::AlreadyInitialized => {
                ErrorKind::InvalidState
            },
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Driver(e) => {
                write!(f, "failed to register cpuidle driver: {}", e)
            },
            RegistrationError::Device { cpu, source } => write!(
                f,
                "failed to register cpuidle device for cpu {}: {}",
                cpu, source
            ),
            RegistrationError::NotBuilt => write!(f, "idle-state tables not installed"),
            RegistrationError::AlreadyInitialized => write!(f, "cpuidle already initialized"),
        }
    }
}

// =============================================================================
// CRATE ERROR
// =============================================================================

/// Any error the driver can report to boot code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuIdleError {
    /// Table construction failed
    Config(ConfigError),
    /// Registration failed
    Registration(RegistrationError),
}

impl CpuIdleError {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            CpuIdleError::Config(_) => ErrorKind::Configuration,
            CpuIdleError::Registration(e) => e.kind(),
        }
    }

    /// Whether boot must stop
    pub const fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<ConfigError> for CpuIdleError {
    fn from(e: ConfigError) -> Self {
        CpuIdleError::Config(e)
    }
}

impl From<RegistrationError> for CpuIdleError {
    fn from(e: RegistrationError) -> Self {
        CpuIdleError::Registration(e)
    }
}

impl fmt::Display for CpuIdleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuIdleError::Config(e) => write!(f, "[{}] {}", ErrorKind::Configuration.category(), e),
            CpuIdleError::Registration(e) => write!(f, "[{}] {}", e.kind().category(), e),
        }
    }
}

/// Result of table construction
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result of registration
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Crate-level result
pub type CpuIdleResult<T> = Result<T, CpuIdleError>;

// =============================================================================
// TESTS
// =============================================================================
