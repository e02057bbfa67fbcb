//! Volume requests and the records of completed ones.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_common::{StrataError, StrataResult, VolumeSize};

/// Volume operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeOperation {
    /// Listing all volumes.
    List,
    /// Creating a volume.
    Create,
    /// Removing a volume.
    Remove,
    /// Attaching a volume.
    Attach,
    /// Detaching a volume.
    Detach,
}

impl VolumeOperation {
    /// All operations, in hook registration order.
    pub const ALL: [Self; 5] = [
        Self::List,
        Self::Create,
        Self::Remove,
        Self::Attach,
        Self::Detach,
    ];

    /// Name of the hook event requesting this operation.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::List => "volume-list",
            Self::Create => "volume-create",
            Self::Remove => "volume-remove",
            Self::Attach => "volume-attach",
            Self::Detach => "volume-detach",
        }
    }
}

impl fmt::Display for VolumeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Create => write!(f, "create"),
            Self::Remove => write!(f, "remove"),
            Self::Attach => write!(f, "attach"),
            Self::Detach => write!(f, "detach"),
        }
    }
}

/// A single volume manager operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VolumeRequest {
    List,
    Create { path: PathBuf, size: VolumeSize },
    Remove { path: PathBuf },
    Attach { path: PathBuf },
    Detach { path: PathBuf },
}

impl VolumeRequest {
    /// The operation this request performs.
    #[must_use]
    pub const fn operation(&self) -> VolumeOperation {
        match self {
            Self::List => VolumeOperation::List,
            Self::Create { .. } => VolumeOperation::Create,
            Self::Remove { .. } => VolumeOperation::Remove,
            Self::Attach { .. } => VolumeOperation::Attach,
            Self::Detach { .. } => VolumeOperation::Detach,
        }
    }

    /// Build a request from a hook event name and its ordered parameters.
    ///
    /// ```
    /// use strata::volume::VolumeRequest;
    ///
    /// let request = VolumeRequest::from_event("volume-attach", &["/var/log".to_string()])?;
    /// assert_eq!(request, VolumeRequest::Attach { path: "/var/log".into() });
    /// # Ok::<(), strata_common::StrataError>(())
    /// ```
    pub fn from_event(event: &str, params: &[String]) -> StrataResult<Self> {
        let operation = VolumeOperation::ALL
            .into_iter()
            .find(|op| op.event_name() == event)
            .ok_or_else(|| StrataError::UnknownEvent {
                event: event.to_string(),
            })?;

        let arity = |expected: usize| {
            if params.len() == expected {
                Ok(())
            } else {
                Err(StrataError::InvalidEventParams {
                    event: event.to_string(),
                    message: format!("expected {expected} parameters, got {}", params.len()),
                })
            }
        };

        let request = match operation {
            VolumeOperation::List => {
                arity(0)?;
                Self::List
            }
            VolumeOperation::Create => {
                arity(2)?;
                Self::Create {
                    path: PathBuf::from(&params[0]),
                    size: params[1].parse()?,
                }
            }
            VolumeOperation::Remove => {
                arity(1)?;
                Self::Remove {
                    path: PathBuf::from(&params[0]),
                }
            }
            VolumeOperation::Attach => {
                arity(1)?;
                Self::Attach {
                    path: PathBuf::from(&params[0]),
                }
            }
            VolumeOperation::Detach => {
                arity(1)?;
                Self::Detach {
                    path: PathBuf::from(&params[0]),
                }
            }
        };

        Ok(request)
    }
}

/// Record of a completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEvent {
    /// What was done.
    pub operation: VolumeOperation,
    /// The paths involved; every managed path for `list`.
    pub paths: Vec<PathBuf>,
    /// When the request completed.
    pub timestamp: DateTime<Utc>,
}

impl VolumeEvent {
    /// Record a completed operation now.
    #[must_use]
    pub fn new(operation: VolumeOperation, paths: Vec<PathBuf>) -> Self {
        Self {
            operation,
            paths,
            timestamp: Utc::now(),
        }
    }
}
